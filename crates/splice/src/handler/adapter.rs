//! Handler adaptation.
//!
//! [`adapt`] turns a [`Handler`] into an [`AdaptedHandler`]: a type-erased,
//! uniformly-shaped pipeline step. The adapter captures the resolution plan
//! and a [`Snapshot`] of the owning scope's error handler and composed result
//! chain at construction time — replacing either on the scope afterwards
//! never retroactively changes handlers that were already built.
//!
//! Invocation protocol, per request:
//!
//! 1. resolve parameters in declaration order (the first failure aborts and
//!    is routed to the captured error handler);
//! 2. run the business function;
//! 3. map its outcome: a reply runs through the result chain and the
//!    pipeline continues; the stop sentinel halts quietly; an error goes to
//!    the error handler and halts.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::error;

use splice_core::{Flow, HandlerError, PipelineHandler, RegistrationError, RequestContext};

use crate::handler::traits::{Handler, Outcome};
use crate::plan::Planner;
use crate::registry::Registry;
use crate::result::ResultHandler;

/// The per-scope error handler, invoked on any resolution or execution
/// failure of an adapted handler built while it was active.
pub type ErrorHandler =
    Arc<dyn Fn(Arc<RequestContext>, HandlerError) -> BoxFuture<'static, ()> + Send + Sync>;

/// The error handler a scope starts with: log, write a generic server
/// error, halt.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx, err| {
        Box::pin(async move {
            error!(error = %err, path = ctx.path(), "handler failed");
            ctx.set_status(500);
            ctx.write_text("Internal Server Error");
        })
    })
}

/// The scope state an adapted handler captures at construction.
#[derive(Clone)]
pub struct Snapshot {
    pub(crate) error_handler: ErrorHandler,
    pub(crate) result_chain: ResultHandler,
}

impl Snapshot {
    /// Captures an error handler and an already-composed result chain.
    pub fn new(error_handler: ErrorHandler, result_chain: ResultHandler) -> Self {
        Self {
            error_handler,
            result_chain,
        }
    }
}

/// A uniform, chainable request handler produced from an arbitrary function.
///
/// Read-only after construction; cloning shares the underlying closure.
#[derive(Clone)]
pub struct AdaptedHandler {
    run: PipelineHandler,
}

impl AdaptedHandler {
    /// Runs the handler for one request.
    pub fn run(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, Flow> {
        (self.run)(ctx)
    }

    /// The type-erased form the routing table stores.
    pub fn as_pipeline_handler(&self) -> PipelineHandler {
        self.run.clone()
    }
}

/// Builds an [`AdaptedHandler`] for `handler`, planning its parameters
/// against `registry` and a pattern with `path_params` positional values.
pub fn adapt<F, Args>(
    handler: F,
    registry: &Registry,
    path_params: usize,
    snapshot: Snapshot,
) -> Result<AdaptedHandler, RegistrationError>
where
    F: Handler<Args>,
{
    let mut planner = Planner::new(registry, path_params);
    let plan = F::plan(&mut planner)?;

    let run: PipelineHandler = Arc::new(move |ctx: Arc<RequestContext>| {
        let invocation = handler.invoke(ctx.clone(), &plan);
        let snapshot = snapshot.clone();
        Box::pin(async move {
            match invocation.await {
                Outcome::Reply(reply) => match (snapshot.result_chain)(ctx.clone(), reply).await {
                    Ok(()) => Flow::Continue,
                    Err(err) => {
                        (snapshot.error_handler)(ctx, err).await;
                        Flow::Halt
                    }
                },
                Outcome::Halt => Flow::Halt,
                Outcome::Fail(err) => {
                    (snapshot.error_handler)(ctx, err).await;
                    Flow::Halt
                }
            }
        })
    });
    Ok(AdaptedHandler { run })
}
