//! Dispatch correlation for structured logging
//!
//! Every outbound call gets a short trace id that is sent upstream as
//! `X-Request-ID` and included in every log line for that call.

mod trace_context;

pub use trace_context::{generate_trace_id, DispatchSpan, TraceContext};
