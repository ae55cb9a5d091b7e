//! Document-store backend
//!
//! `FirestoreClient` talks to the Firestore v1 REST API, scoped to a single
//! database. Documents are exchanged as plain JSON objects; the typed
//! Firestore value encoding is handled here and never leaks to callers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use switchyard_core::DocumentSpec;

use super::check_status;
use crate::error::PoolError;

const LIST_PAGE_SIZE: &str = "300";

/// JSON object stored as a document
pub type DocumentFields = Map<String, Value>;

#[async_trait]
pub trait DocumentClient: Send + Sync {
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentFields>, PoolError>;

    /// Every document in a collection as `(id, fields)`
    async fn list(&self, collection: &str) -> Result<Vec<(String, DocumentFields)>, PoolError>;

    /// Create or fully replace the document at `id`
    async fn set(&self, collection: &str, id: &str, data: &DocumentFields)
        -> Result<(), PoolError>;

    /// Lightweight listing call used as the liveness probe
    async fn list_collections(&self) -> Result<Vec<String>, PoolError>;

    async fn close(&self) -> Result<(), PoolError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct DocumentBackend {
    client: Arc<dyn DocumentClient>,
}

impl DocumentBackend {
    pub fn new(client: Arc<dyn DocumentClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<dyn DocumentClient> {
        Arc::clone(&self.client)
    }

    pub async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentFields>, PoolError> {
        self.client.get(collection, id).await
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<(String, DocumentFields)>, PoolError> {
        self.client.list(collection).await
    }

    pub async fn set(
        &self,
        collection: &str,
        id: &str,
        data: &DocumentFields,
    ) -> Result<(), PoolError> {
        self.client.set(collection, id, data).await
    }

    pub async fn probe(&self) -> Result<(), PoolError> {
        self.client.list_collections().await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), PoolError> {
        self.client.close().await
    }
}

pub struct FirestoreClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
}

impl FirestoreClient {
    pub fn new(spec: DocumentSpec) -> Result<Self, PoolError> {
        let client = reqwest::Client::builder()
            .timeout(spec.request_timeout)
            .user_agent("Switchyard/1.0")
            .build()
            .map_err(|e| PoolError::upstream(format!("failed to build HTTP client: {}", e)))?;

        let base_url = format!(
            "{}/projects/{}/databases/{}/documents",
            spec.endpoint.trim_end_matches('/'),
            spec.project,
            spec.database
        );

        Ok(Self {
            client,
            token: spec.token,
            base_url,
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, id)
    }
}

#[async_trait]
impl DocumentClient for FirestoreClient {
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentFields>, PoolError> {
        let response = self
            .client
            .get(self.document_url(collection, id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: FirestoreDocument = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PoolError::upstream(format!("invalid document: {}", e)))?;

        Ok(Some(decode_fields(document.fields)))
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, DocumentFields)>, PoolError> {
        let url = format!("{}/{}", self.base_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PoolError::upstream(e.to_string()))?;
            let page: ListDocumentsResponse = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| PoolError::upstream(format!("invalid document list: {}", e)))?;

            documents.extend(page.documents.into_iter().map(|doc| {
                let id = document_id(&doc.name).to_string();
                (id, decode_fields(doc.fields))
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: &DocumentFields,
    ) -> Result<(), PoolError> {
        let response = self
            .client
            .patch(self.document_url(collection, id))
            .bearer_auth(&self.token)
            .json(&json!({ "fields": encode_fields(data) }))
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, PoolError> {
        let response = self
            .client
            .post(format!("{}:listCollectionIds", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({ "pageSize": 1 }))
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;
        let body: ListCollectionIdsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PoolError::upstream(format!("invalid collection list: {}", e)))?;
        Ok(body.collection_ids)
    }
}

fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

pub(crate) fn encode_fields(data: &DocumentFields) -> Value {
    Value::Object(
        data.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub(crate) fn decode_fields(fields: Map<String, Value>) -> DocumentFields {
    fields
        .into_iter()
        .map(|(k, v)| (k, decode_value(v)))
        .collect()
}

fn decode_value(value: Value) -> Value {
    let Value::Object(mut typed) = value else {
        return value;
    };
    let Some((kind, inner)) = typed.iter_mut().next().map(|(k, v)| (k.clone(), v.take())) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner
        }
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(inner),
        "doubleValue" => inner
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(inner),
        "arrayValue" => Value::Array(match inner {
            Value::Object(mut array) => match array.remove("values") {
                Some(Value::Array(values)) => values.into_iter().map(decode_value).collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }),
        "mapValue" => Value::Object(match inner {
            Value::Object(mut map) => match map.remove("fields") {
                Some(Value::Object(fields)) => decode_fields(fields),
                _ => Map::new(),
            },
            _ => Map::new(),
        }),
        // geoPointValue is already a plain {latitude, longitude} object
        _ => inner,
    }
}
