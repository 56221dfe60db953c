//! Handler adaptation traits.
//!
//! [`Handler`] is blanket-implemented for async functions of 0 to 12
//! parameters. Each parameter implements [`FromRequest`](crate::extract::FromRequest)
//! and the return type implements [`IntoOutcome`], so a plain business
//! function becomes registrable without touching its signature:
//!
//! ```rust,ignore
//! // No parameters, text reply
//! async fn ping() -> &'static str { "pong" }
//!
//! // Injected dependency plus a path value, JSON reply
//! async fn show(db: Dep<Database>, id: Param<u64>) -> Result<Json<User>, BoxError> {
//!     Ok(Json(db.user(*id)?))
//! }
//! ```
//!
//! The function never manages pipeline control. Its return value is lowered
//! to an [`Outcome`]: a reply to run through the result chain (continue), the
//! [`Stop`] sentinel (halt, not a failure), or an error (halt through the
//! error handler).

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use splice_core::{BoxError, Flow, HandlerError, RegistrationError, Reply, RequestContext, Stop};

use crate::extract::FromRequest;
use crate::plan::{Plan, Planner};

// =============================================================================
// Outcome — what one handler invocation produced
// =============================================================================

/// The lowered result of one handler invocation, before the result chain.
#[derive(Debug)]
pub enum Outcome {
    /// A business value to hand to the result-handler chain.
    Reply(Reply),
    /// The stop sentinel: halt the pipeline, bypass the error handler.
    Halt,
    /// A failure to route to the scope's error handler.
    Fail(HandlerError),
}

/// Conversion of a handler's return value into an [`Outcome`].
pub trait IntoOutcome: Send + 'static {
    /// Lowers this value.
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Reply(Reply::None)
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Outcome::Reply(Reply::Text(self))
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome {
        Outcome::Reply(Reply::Text(self.to_string()))
    }
}

impl IntoOutcome for Vec<u8> {
    fn into_outcome(self) -> Outcome {
        Outcome::Reply(Reply::Bytes(self))
    }
}

impl IntoOutcome for Reply {
    fn into_outcome(self) -> Outcome {
        Outcome::Reply(self)
    }
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

/// Explicit pipeline control for handlers with nothing to reply.
impl IntoOutcome for Flow {
    fn into_outcome(self) -> Outcome {
        match self {
            Flow::Continue => Outcome::Reply(Reply::None),
            Flow::Halt => Outcome::Halt,
        }
    }
}

/// `None` means "nothing to reply", not a failure.
impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        match self {
            Some(value) => value.into_outcome(),
            None => Outcome::Reply(Reply::None),
        }
    }
}

/// `Err` carrying the [`Stop`] sentinel halts without the error handler;
/// any other error is an execution failure.
impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError> + Send + 'static,
{
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(err) => {
                let err: BoxError = err.into();
                if err.downcast_ref::<Stop>().is_some() {
                    Outcome::Halt
                } else {
                    Outcome::Fail(HandlerError::Execution { source: err })
                }
            }
        }
    }
}

/// Marks a value for structured serialization.
///
/// The default result handler serializes it and writes `application/json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> IntoOutcome for Json<T>
where
    T: Serialize + Send + 'static,
{
    fn into_outcome(self) -> Outcome {
        match serde_json::to_value(&self.0) {
            Ok(value) => Outcome::Reply(Reply::Json(value)),
            Err(err) => Outcome::Fail(HandlerError::execution(err)),
        }
    }
}

// =============================================================================
// Handler trait
// =============================================================================

/// An async function adaptable into a uniform request handler.
///
/// `Args` is the parameter tuple, carried as a type parameter so distinct
/// signatures get distinct blanket implementations.
pub trait Handler<Args>: Clone + Send + Sync + 'static {
    /// Builds the resolution plan for this function's parameters.
    fn plan(planner: &mut Planner<'_>) -> Result<Plan, RegistrationError>;

    /// Resolves parameters per the plan, runs the function, lowers its
    /// return value.
    fn invoke(&self, ctx: Arc<RequestContext>, plan: &Plan) -> BoxFuture<'static, Outcome>;
}

macro_rules! impl_handler {
    ( $( $ty:ident => $idx:tt ),* ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoOutcome,
            $( $ty: FromRequest, )*
        {
            fn plan(planner: &mut Planner<'_>) -> Result<Plan, RegistrationError> {
                Ok(Plan::new(vec![ $( $ty::bind(planner)?, )* ]))
            }

            fn invoke(&self, ctx: Arc<RequestContext>, plan: &Plan) -> BoxFuture<'static, Outcome> {
                let f = self.clone();
                let steps = plan.shared_steps();
                Box::pin(async move {
                    $(
                        let $ty = match $ty::from_request(&ctx, &steps[$idx]).await {
                            Ok(value) => value,
                            Err(err) => return Outcome::Fail(err),
                        };
                    )*
                    f($($ty,)*).await.into_outcome()
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(A1 => 0);
impl_handler!(A1 => 0, A2 => 1);
impl_handler!(A1 => 0, A2 => 1, A3 => 2);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7);
impl_handler!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7, A9 => 8);
impl_handler!(
    A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7, A9 => 8, A10 => 9
);
impl_handler!(
    A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7, A9 => 8, A10 => 9,
    A11 => 10
);
impl_handler!(
    A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7, A9 => 8, A10 => 9,
    A11 => 10, A12 => 11
);
