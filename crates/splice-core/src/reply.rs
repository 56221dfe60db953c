//! Reply values and pipeline control.
//!
//! A handler's business return value is lowered into a [`Reply`] before it
//! reaches the result-handler chain, so interceptors work on one shape
//! regardless of what the function returned. Pipeline control is the separate
//! two-valued [`Flow`]; "what the handler produced" and "whether the pipeline
//! continues" are never conflated.

/// The shape of a value a handler produced, as seen by result handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing to write.
    None,
    /// Plain text, written with a `text/plain` content type.
    Text(String),
    /// Raw bytes, written verbatim.
    Bytes(Vec<u8>),
    /// Structured data, serialized and written as `application/json`.
    Json(serde_json::Value),
}

/// Pipeline-control outcome of one adapted handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand the request to the next handler in the route's pipeline.
    Continue,
    /// Stop running this route's pipeline for the current request.
    Halt,
}
