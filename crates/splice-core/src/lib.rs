//! # Splice Core
//!
//! Foundation types for the Splice handler-injection engine:
//!
//! - [`Method`] — the fixed HTTP verb set route registration works with
//! - [`RequestContext`] — the per-request context handed to every handler,
//!   resolver, and result handler of a pipeline
//! - [`Reply`] / [`Flow`] — the lowered handler return value and the
//!   pipeline-control outcome, kept structurally separate
//! - the error taxonomy ([`RegistrationError`], [`HandlerError`], [`Stop`])
//! - the routing collaborator ([`Router`], [`count_params`]) consumed through
//!   a narrow interface by the engine
//!
//! The engine itself (registry, planner, handler adaptation, scopes) lives in
//! the `splice` crate.

pub mod context;
pub mod error;
pub mod method;
pub mod reply;
pub mod routing;

pub use context::RequestContext;
pub use error::{BoxError, HandlerError, RegistrationError, Stop};
pub use method::{InvalidMethod, Method};
pub use reply::{Flow, Reply};
pub use routing::{PipelineHandler, RouteId, Router, count_params};
