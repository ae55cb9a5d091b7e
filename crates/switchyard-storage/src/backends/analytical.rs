//! Analytical warehouse backend
//!
//! `BigQueryClient` speaks the BigQuery v2 REST API through reqwest with a
//! bearer token. Queries run with standard SQL and positional `?`
//! parameters through `jobs.query`. When that call returns before the job
//! finishes, or returns only the first page, the rest is read with
//! `jobs.getQueryResults` until the job is complete and no page token
//! remains. A job still running after `MAX_WAIT_POLLS` follow-ups is an
//! error, as is a result shorter than the reported `totalRows`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use switchyard_core::AnalyticalSpec;
use tracing::debug;

use super::check_status;
use crate::error::PoolError;

/// Server-side wait for `jobs.query` before it returns an incomplete job
const QUERY_WAIT_MS: u64 = 30_000;

/// Follow-up calls allowed while the job is still running
const MAX_WAIT_POLLS: usize = 4;

#[async_trait]
pub trait AnalyticalClient: Send + Sync {
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, PoolError>;

    /// Lightweight metadata call
    async fn probe(&self) -> Result<(), PoolError>;

    async fn close(&self) -> Result<(), PoolError> {
        Ok(())
    }
}

/// Shared analytical client handle
#[derive(Clone)]
pub struct AnalyticalBackend {
    client: Arc<dyn AnalyticalClient>,
}

impl AnalyticalBackend {
    pub fn new(client: Arc<dyn AnalyticalClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<dyn AnalyticalClient> {
        Arc::clone(&self.client)
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, PoolError> {
        self.client.query(sql, params).await
    }

    pub async fn probe(&self) -> Result<(), PoolError> {
        self.client.probe().await
    }

    pub async fn close(&self) -> Result<(), PoolError> {
        self.client.close().await
    }
}

pub struct BigQueryClient {
    client: reqwest::Client,
    spec: AnalyticalSpec,
}

impl BigQueryClient {
    pub fn new(spec: AnalyticalSpec) -> Result<Self, PoolError> {
        let client = reqwest::Client::builder()
            .timeout(spec.request_timeout)
            .user_agent("Switchyard/1.0")
            .build()
            .map_err(|e| PoolError::upstream(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, spec })
    }

    fn project_url(&self) -> String {
        format!(
            "{}/projects/{}",
            self.spec.endpoint.trim_end_matches('/'),
            self.spec.project
        )
    }

    fn request_body(&self, sql: &str, params: &[Value]) -> Value {
        let mut body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.spec.location,
            "timeoutMs": QUERY_WAIT_MS,
        });
        if !params.is_empty() {
            body["parameterMode"] = json!("POSITIONAL");
            body["queryParameters"] = Value::Array(params.iter().map(query_parameter).collect());
        }
        body
    }

    async fn start_query(&self, sql: &str, params: &[Value]) -> Result<QueryResponse, PoolError> {
        let url = format!("{}/queries", self.project_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.spec.token)
            .json(&self.request_body(sql, params))
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;
        read_response(response).await
    }

    async fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, PoolError> {
        let url = format!("{}/queries/{}", self.project_url(), job.job_id);
        let location = job.location.as_deref().unwrap_or(&self.spec.location);
        let wait = QUERY_WAIT_MS.to_string();
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.spec.token)
            .query(&[("location", location), ("timeoutMs", wait.as_str())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<QueryResponse, PoolError> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| PoolError::upstream(format!("invalid query response: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
    /// uint64 encoded as a string
    total_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[async_trait]
impl AnalyticalClient for BigQueryClient {
    async fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, PoolError> {
        let mut page = self.start_query(sql, params).await?;
        let mut fields: Vec<FieldSchema> = Vec::new();
        let mut rows = Vec::new();
        let mut total_rows = None;
        let mut waits = 0;

        loop {
            if page.job_complete {
                if fields.is_empty() {
                    if let Some(schema) = page.schema.take() {
                        fields = schema.fields;
                    }
                }
                if let Some(total) = page.total_rows.as_deref() {
                    total_rows = total.parse::<usize>().ok();
                }
                rows.extend(page.rows.drain(..).map(|row| decode_row(&fields, row)));
            } else {
                waits += 1;
                if waits > MAX_WAIT_POLLS {
                    return Err(PoolError::upstream(format!(
                        "query did not complete within {}ms",
                        QUERY_WAIT_MS * waits as u64
                    )));
                }
            }

            let token = if page.job_complete {
                match page.page_token.take() {
                    Some(token) => Some(token),
                    None => break,
                }
            } else {
                None
            };
            let job = page.job_reference.take().ok_or_else(|| {
                PoolError::upstream("query response is missing its job reference")
            })?;
            page = self.query_results(&job, token.as_deref()).await?;
            if page.job_reference.is_none() {
                page.job_reference = Some(job);
            }
        }

        if let Some(total) = total_rows {
            if rows.len() < total {
                return Err(PoolError::upstream(format!(
                    "query returned {} of {} rows",
                    rows.len(),
                    total
                )));
            }
        }

        debug!("[PoolManager] Analytical query returned {} rows", rows.len());
        Ok(rows)
    }

    async fn probe(&self) -> Result<(), PoolError> {
        let url = format!("{}/datasets", self.project_url());
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.spec.token)
            .query(&[("maxResults", "1")])
            .send()
            .await
            .map_err(|e| PoolError::upstream(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

fn query_parameter(value: &Value) -> Value {
    let (kind, rendered) = match value {
        Value::Null => ("STRING", Value::Null),
        Value::Bool(b) => ("BOOL", Value::String(b.to_string())),
        Value::Number(n) if n.is_i64() || n.is_u64() => ("INT64", Value::String(n.to_string())),
        Value::Number(n) => ("FLOAT64", Value::String(n.to_string())),
        Value::String(s) => ("STRING", Value::String(s.clone())),
        other => ("STRING", Value::String(other.to_string())),
    };
    json!({
        "parameterType": { "type": kind },
        "parameterValue": { "value": rendered },
    })
}

fn decode_row(fields: &[FieldSchema], row: TableRow) -> Map<String, Value> {
    fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| (field.name.clone(), decode_cell(&field.field_type, cell.v)))
        .collect()
}

fn decode_cell(field_type: &str, raw: Value) -> Value {
    let Value::String(text) = raw else {
        return raw;
    };
    match field_type {
        "INTEGER" | "INT64" => text.parse::<i64>().map(Value::from).unwrap_or(Value::String(text)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "BOOLEAN" | "BOOL" if text == "true" => Value::Bool(true),
        "BOOLEAN" | "BOOL" if text == "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}
