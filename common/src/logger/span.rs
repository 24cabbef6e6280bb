use tracing::{Level, Span};

use super::TraceId;

/// Create a root span for one analysis cycle.
pub fn cycle_span(instrument: &str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "analysis_cycle",
        instrument = instrument,
        trace_id = %trace_id.as_str()
    )
}

/// Create a child span (inherits trace_id automatically)
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "stage", stage = name)
}
