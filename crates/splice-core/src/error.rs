//! Error types for the Splice engine.
//!
//! Failures split into two families with different lifetimes:
//!
//! - [`RegistrationError`] — detected while a route, handler, or resolver is
//!   being registered. Fatal to that specific registration only; it never
//!   reaches request-handling code.
//! - [`HandlerError`] — produced while serving a single request and always
//!   routed to the scope's error handler captured by the adapted handler.
//!
//! [`Stop`] is neither: it is a sentinel error a handler returns to halt the
//! pipeline for the current request without treating it as a failure. The
//! adapter recognises it by downcast and never hands it to the error handler.

use thiserror::Error;

/// Boxed error crossing the handler-adaptation boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sentinel error meaning "halt the pipeline, not a failure".
///
/// Return it from a handler as the error of a `Result` to short-circuit the
/// remaining handlers of the route without invoking the error handler:
///
/// ```rust,ignore
/// async fn gate(ctx: Arc<RequestContext>) -> Result<(), BoxError> {
///     ctx.set_status(204);
///     Err(Stop.into())
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("handler pipeline stopped")]
pub struct Stop;

/// Errors detected at registration time, before serving starts.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// A resolver's transitive registry requirements reach its own type.
    #[error("cyclic dependency while registering '{type_name}': {chain}")]
    CyclicDependency {
        /// The type being registered.
        type_name: &'static str,
        /// The requirement chain that closed the cycle, e.g. `A -> B -> A`.
        chain: String,
    },

    /// A registry-bound parameter has no dependency registered for its type.
    #[error("no dependency registered for parameter {position} of type '{type_name}'")]
    UnresolvedDependency {
        /// The parameter's value type.
        type_name: &'static str,
        /// Zero-based position in the function's parameter list.
        position: usize,
    },

    /// A path-bound parameter has no unclaimed path slot left to consume.
    #[error("parameter {position} of type '{type_name}' cannot be bound: no path value left")]
    UnboundParameter {
        /// The parameter's value type.
        type_name: &'static str,
        /// Zero-based position in the function's parameter list.
        position: usize,
    },

    /// A route for the same method and pattern already exists.
    #[error("route {method} '{pattern}' is already registered")]
    DuplicateRoute {
        /// The HTTP method name.
        method: &'static str,
        /// The path pattern as registered.
        pattern: String,
    },
}

/// Errors produced while serving a single request.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A parameter could not be resolved: a resolver failed, a path value was
    /// missing or unparsable, or a dependency produced an unexpected type.
    #[error("failed to resolve '{dependency}': {source}")]
    Resolution {
        /// The type the failing binding was supposed to produce.
        dependency: &'static str,
        #[source]
        source: BoxError,
    },

    /// The business function itself returned an error.
    #[error("handler execution failed: {source}")]
    Execution {
        #[source]
        source: BoxError,
    },
}

impl HandlerError {
    /// Creates an execution error from any boxable error.
    pub fn execution(err: impl Into<BoxError>) -> Self {
        HandlerError::Execution { source: err.into() }
    }

    /// Creates a resolution error for the named dependency type.
    pub fn resolution(dependency: &'static str, err: impl Into<BoxError>) -> Self {
        HandlerError::Resolution {
            dependency,
            source: err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_survives_boxing() {
        let boxed: BoxError = Stop.into();
        assert!(boxed.downcast_ref::<Stop>().is_some());
    }

    #[test]
    fn registration_error_display_names_the_parameter() {
        let err = RegistrationError::UnresolvedDependency {
            type_name: "db::Pool",
            position: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("db::Pool"));
        assert!(msg.contains('2'));
    }
}
