//! Routing collaborator.
//!
//! The injection engine does not own a routing tree; it only needs two things
//! from whatever router hosts it:
//!
//! - a registration primitive keyed by (method, path pattern) that accepts a
//!   list of uniform [`PipelineHandler`]s, and
//! - a pattern analyzer reporting how many positional path parameters a
//!   pattern implies ([`count_params`]).
//!
//! [`Router`] is the flat in-memory stand-in for that collaborator, used by
//! tests and demos. It matches segment-by-segment with no precedence rules:
//! the first registered route that fits wins. A real deployment substitutes a
//! proper matching tree behind the same two operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::error::RegistrationError;
use crate::method::Method;
use crate::reply::Flow;

/// The uniform signature every adapted handler is erased to.
pub type PipelineHandler =
    Arc<dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, Flow> + Send + Sync>;

/// Identifier of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(pub u64);

/// Counts the positional path parameters a pattern implies.
///
/// A segment delimited as `{name}` (optionally `{name:kind}`) is one
/// positional parameter; the grammar inside the braces belongs to the real
/// router and is not interpreted here.
pub fn count_params(pattern: &str) -> usize {
    pattern
        .split('/')
        .filter(|s| s.starts_with('{') && s.ends_with('}') && s.len() > 2)
        .count()
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param,
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('{') && s.ends_with('}') && s.len() > 2 {
                Segment::Param
            } else {
                Segment::Literal(s.to_string())
            }
        })
        .collect()
}

fn match_path(segments: &[Segment], path: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() != segments.len() {
        return None;
    }
    let mut values = Vec::new();
    for (segment, part) in segments.iter().zip(&parts) {
        match segment {
            Segment::Literal(lit) if lit == part => {}
            Segment::Literal(_) => return None,
            Segment::Param => values.push((*part).to_string()),
        }
    }
    Some(values)
}

struct Route {
    id: RouteId,
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handlers: Vec<PipelineHandler>,
}

/// Flat in-memory route table.
///
/// Registration happens during the single-threaded setup phase; dispatch is
/// read-only and safe for concurrent use.
#[derive(Default)]
pub struct Router {
    routes: RwLock<Vec<Route>>,
    next_id: AtomicU64,
}

impl Router {
    /// Creates an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler pipeline for (method, pattern).
    ///
    /// Fails with [`RegistrationError::DuplicateRoute`] if the exact method
    /// and pattern pair is already present; other routes are unaffected.
    pub fn register(
        &self,
        method: Method,
        pattern: &str,
        handlers: Vec<PipelineHandler>,
    ) -> Result<RouteId, RegistrationError> {
        let mut routes = self.routes.write();
        if routes
            .iter()
            .any(|r| r.method == method && r.pattern == pattern)
        {
            return Err(RegistrationError::DuplicateRoute {
                method: method.as_str(),
                pattern: pattern.to_string(),
            });
        }
        let id = RouteId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%method, pattern, handlers = handlers.len(), "route registered");
        routes.push(Route {
            id,
            method,
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            handlers,
        });
        Ok(id)
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    /// The patterns registered for `method`, in registration order.
    pub fn patterns_for(&self, method: Method) -> Vec<String> {
        self.routes
            .read()
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.pattern.clone())
            .collect()
    }

    /// Dispatches a request with a fresh cancellation token.
    pub async fn dispatch(&self, method: Method, path: &str) -> Option<Arc<RequestContext>> {
        self.dispatch_with(method, path, CancellationToken::new())
            .await
    }

    /// Dispatches a request, running the matched route's pipeline to
    /// completion or until a handler halts it.
    ///
    /// Returns the request context for inspection, or `None` when no route
    /// matches.
    pub async fn dispatch_with(
        &self,
        method: Method,
        path: &str,
        cancellation: CancellationToken,
    ) -> Option<Arc<RequestContext>> {
        let (route_id, handlers, values) = {
            let routes = self.routes.read();
            routes.iter().find_map(|r| {
                if r.method != method {
                    return None;
                }
                match_path(&r.segments, path).map(|values| (r.id, r.handlers.clone(), values))
            })?
        };

        trace!(%method, path, route = route_id.0, "dispatching");
        let ctx = Arc::new(RequestContext::with_cancellation(
            method,
            path,
            values,
            cancellation,
        ));
        for handler in &handlers {
            if handler(ctx.clone()).await == Flow::Halt {
                trace!(%method, path, "pipeline halted");
                break;
            }
        }
        Some(ctx)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.route_count())
            .finish()
    }
}
