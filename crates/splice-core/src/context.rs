//! Per-request context.
//!
//! One [`RequestContext`] is created per inbound request and passed as a
//! shared `Arc` to every adapted handler, resolver, and result handler of the
//! matched route's pipeline. It carries:
//!
//! - the request line (method, path) and the positional path values the
//!   router extracted, in pattern order;
//! - the response buffer (status, content type, body) that result handlers
//!   and error handlers write into;
//! - the request-scoped dependency cache, so a cacheable resolver runs at
//!   most once per request, discarded with the context;
//! - a [`CancellationToken`] inherited transitively by everything invoked for
//!   this request. The adaptation layer adds no timeout or cancellation
//!   policy of its own.
//!
//! Registration happens single-threaded before serving; at request time the
//! context is the only mutable state, and its interior mutability is confined
//! to the response buffer and the cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::method::Method;

struct Response {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// The live context of one in-flight request.
pub struct RequestContext {
    method: Method,
    path: String,
    path_values: Vec<String>,
    response: Mutex<Response>,
    /// Request-scoped resolver cache, keyed by dependency registration id.
    cache: Mutex<HashMap<u64, Arc<dyn Any + Send + Sync>>>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a context with a fresh cancellation token.
    pub fn new(method: Method, path: impl Into<String>, path_values: Vec<String>) -> Self {
        Self::with_cancellation(method, path, path_values, CancellationToken::new())
    }

    /// Creates a context inheriting the given cancellation token.
    pub fn with_cancellation(
        method: Method,
        path: impl Into<String>,
        path_values: Vec<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            path_values,
            response: Mutex::new(Response::default()),
            cache: Mutex::new(HashMap::new()),
            cancellation,
        }
    }

    /// The request's HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path as matched.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The positional path value at `slot`, in pattern order.
    pub fn path_value(&self, slot: usize) -> Option<&str> {
        self.path_values.get(slot).map(String::as_str)
    }

    /// All positional path values.
    pub fn path_values(&self) -> &[String] {
        &self.path_values
    }

    /// The cancellation token for this request.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // ─── Response buffer ──────────────────────────────────────────────────────

    /// Sets the response status code.
    pub fn set_status(&self, status: u16) {
        self.response.lock().status = status;
    }

    /// The current response status code.
    pub fn status(&self) -> u16 {
        self.response.lock().status
    }

    /// Appends text to the response body, defaulting the content type to
    /// `text/plain` if none was set yet.
    pub fn write_text(&self, text: &str) {
        let mut response = self.response.lock();
        response
            .content_type
            .get_or_insert_with(|| "text/plain; charset=utf-8".to_string());
        response.body.extend_from_slice(text.as_bytes());
    }

    /// Appends raw bytes to the response body, defaulting the content type to
    /// `application/octet-stream` if none was set yet.
    pub fn write_bytes(&self, bytes: &[u8]) {
        let mut response = self.response.lock();
        response
            .content_type
            .get_or_insert_with(|| "application/octet-stream".to_string());
        response.body.extend_from_slice(bytes);
    }

    /// Serializes `value` and appends it to the response body with an
    /// `application/json` content type.
    pub fn write_json<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut response = self.response.lock();
        response.content_type = Some("application/json".to_string());
        response.body.extend_from_slice(&bytes);
        Ok(())
    }

    /// The response content type, if any was set.
    pub fn content_type(&self) -> Option<String> {
        self.response.lock().content_type.clone()
    }

    /// A copy of the response body.
    pub fn body(&self) -> Vec<u8> {
        self.response.lock().body.clone()
    }

    /// The response body decoded as UTF-8 (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.response.lock().body).into_owned()
    }

    // ─── Request-scoped dependency cache ──────────────────────────────────────

    /// Looks up a cached dependency value by its registration id.
    pub fn cache_get(&self, id: u64) -> Option<Arc<dyn Any + Send + Sync>> {
        self.cache.lock().get(&id).cloned()
    }

    /// Stores a resolved dependency value under its registration id.
    pub fn cache_put(&self, id: u64, value: Arc<dyn Any + Send + Sync>) {
        self.cache.lock().insert(id, value);
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("path_values", &self.path_values)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
