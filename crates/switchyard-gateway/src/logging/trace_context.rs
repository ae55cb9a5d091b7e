//! Trace Context - dispatch correlation and structured spans

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info_span, Span};

/// Global dispatch counter for trace ID generation
static DISPATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID for one dispatch
/// Format: 8 hex characters (e.g., "00a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = DISPATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    // Counter in the low bits keeps ids distinct within the same microsecond
    let mixed = (timestamp << 8).wrapping_add(counter);
    format!("{:08x}", mixed & 0xFFFF_FFFF)
}

/// Correlation data for a single `route_integration` call
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    /// Tool name as requested by the caller
    pub tool: String,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(tool: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            tool: tool.to_string(),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

pub struct DispatchSpan;

impl DispatchSpan {
    /// Span carrying the trace id into every child log line
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!("dispatch", trace_id = %ctx.trace_id, tool = %ctx.tool)
    }
}
