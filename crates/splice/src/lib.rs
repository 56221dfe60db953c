//! # splice
//!
//! A dependency-injection and handler-adaptation engine for request
//! pipelines. Plain async functions become uniform, chainable handlers; their
//! parameters are resolved from a per-scope dependency registry and the
//! request's path values, and their return values are lowered through a
//! wrappable result-handler chain.
//!
//! ## Architecture
//!
//! ```text
//!                 registration time                      request time
//!          ┌──────────────────────────────┐      ┌───────────────────────────┐
//!  fn ────▶│ Planner: one PlanStep per    │      │ resolve steps in order    │
//!          │ parameter (context / path /  │─────▶│ run the function          │
//!          │ dependency snapshot)         │      │ lower the return value    │
//!          └──────────────────────────────┘      └───────────────────────────┘
//!                      │ fails fast on                       │
//!                      │ unknown types, surplus              ▼
//!                      │ path params, cycles        result chain / error
//!                      ▼                            handler, then Flow
//!               RegistrationError                   Continue or Halt
//! ```
//!
//! - [`Registry`] holds dependencies by type: concrete values or async
//!   resolvers whose own parameters are injected recursively. Branching a
//!   registry ([`Registry::branch`], [`Scope::child`]) snapshots it, so
//!   sibling scopes never affect one another.
//! - [`Handler`] is blanket-implemented over async functions; each parameter
//!   implements [`FromRequest`] ([`Dep`], [`Param`], or the raw context) and
//!   the return type implements [`IntoOutcome`].
//! - [`adapt`] freezes a handler's resolution plan and the scope's error
//!   handler and result chain; later scope mutations never rebind it.
//! - [`Scope`] is the registration surface: verb methods, [`Scope::any`] over
//!   all nine standard methods, before/after middleware, and child scopes
//!   sharing one [`Router`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use splice::{Dep, Json, Param, Scope};
//!
//! let mut app = Scope::new();
//! app.register_value(Database::connect()?);
//! app.register(|db: Dep<Database>| async move { Session::open(&db).await })?;
//!
//! app.get("/users/{id}", |s: Dep<Session>, id: Param<u64>| async move {
//!     Ok::<_, BoxError>(Json(s.user(*id).await?))
//! })?;
//!
//! let reply = app.router().dispatch(Method::Get, "/users/42").await;
//! ```

pub mod extract;
pub mod handler;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod scope;

pub use splice_core as core;

pub use splice_core::{
    BoxError, Flow, HandlerError, InvalidMethod, Method, PipelineHandler, RegistrationError,
    Reply, RequestContext, RouteId, Router, Stop,
};

pub use extract::{Dep, FromRequest, Param};
pub use handler::{
    AdaptedHandler, ErrorHandler, Handler, IntoOutcome, Json, Outcome, Snapshot, adapt,
    default_error_handler,
};
pub use plan::{Plan, PlanStep, Planner};
pub use registry::{CachePolicy, Dependency, Registry};
pub use resolver::ResolverFn;
pub use result::{ResultHandler, ResultLayer, default_result_handler};
pub use scope::{IntoPipeline, Scope};
