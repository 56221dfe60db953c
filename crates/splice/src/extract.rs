//! Parameter extractors.
//!
//! [`FromRequest`] is the seam between a plain function parameter and the
//! resolution machinery. Each extractor contributes twice:
//!
//! - at registration, [`FromRequest::bind`] classifies the parameter into a
//!   [`PlanStep`] (context, path value, or registry lookup), surfacing
//!   unbindable parameters before serving starts;
//! - at request time, [`FromRequest::from_request`] replays its step against
//!   the live context.
//!
//! The three extractors mirror the three binding kinds:
//!
//! - `Arc<RequestContext>` — the live per-request context;
//! - [`Param<T>`] — the next unclaimed positional path value, parsed with
//!   `FromStr`;
//! - [`Dep<T>`] — the registered dependency producing `T`.

use std::any::TypeId;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use splice_core::{HandlerError, RegistrationError, RequestContext};

use crate::plan::{PlanStep, Planner};

/// A type that can be supplied as a handler or resolver parameter.
#[async_trait]
pub trait FromRequest: Sized + Send + 'static {
    /// Classifies this parameter into a binding instruction.
    fn bind(planner: &mut Planner<'_>) -> Result<PlanStep, RegistrationError>;

    /// Produces the value for one request by replaying the bound step.
    async fn from_request(
        ctx: &Arc<RequestContext>,
        step: &PlanStep,
    ) -> Result<Self, HandlerError>;
}

/// A plan built for one extractor always replays through the same extractor;
/// a mismatch means the plan was constructed by foreign code.
fn step_mismatch(type_name: &'static str) -> HandlerError {
    HandlerError::resolution(type_name, "binding plan does not match parameter kind")
}

#[async_trait]
impl FromRequest for Arc<RequestContext> {
    fn bind(planner: &mut Planner<'_>) -> Result<PlanStep, RegistrationError> {
        Ok(planner.bind_context())
    }

    async fn from_request(
        ctx: &Arc<RequestContext>,
        _step: &PlanStep,
    ) -> Result<Self, HandlerError> {
        Ok(ctx.clone())
    }
}

// =============================================================================
// Param<T> — positional path value
// =============================================================================

/// A positional path value, parsed from the next unclaimed path slot.
///
/// Path-bound parameters consume slots in function-declaration order:
///
/// ```rust,ignore
/// // GET /users/{user}/posts/{post}
/// async fn show(user: Param<u64>, post: Param<u64>) -> String { ... }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param<T>(pub T);

impl<T> Param<T> {
    /// Consumes the wrapper, returning the parsed value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Param<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[async_trait]
impl<T> FromRequest for Param<T>
where
    T: FromStr + Send + 'static,
    T::Err: fmt::Display,
{
    fn bind(planner: &mut Planner<'_>) -> Result<PlanStep, RegistrationError> {
        planner.bind_path_value(std::any::type_name::<T>())
    }

    async fn from_request(
        ctx: &Arc<RequestContext>,
        step: &PlanStep,
    ) -> Result<Self, HandlerError> {
        let type_name = std::any::type_name::<T>();
        let PlanStep::PathValue { slot } = step else {
            return Err(step_mismatch(type_name));
        };
        let raw = ctx.path_value(*slot).ok_or_else(|| {
            HandlerError::resolution(type_name, format!("no path value at slot {slot}"))
        })?;
        raw.parse::<T>().map(Param).map_err(|err| {
            HandlerError::resolution(type_name, format!("invalid path value '{raw}': {err}"))
        })
    }
}

// =============================================================================
// Dep<T> — registry-bound dependency
// =============================================================================

/// A dependency resolved through the scope's registry.
///
/// Holds the resolved value behind an `Arc`; instances are shared across
/// requests, resolver values across the bindings of one request (unless the
/// dependency was registered transient).
pub struct Dep<T>(Arc<T>);

impl<T> Dep<T> {
    /// The shared resolved value.
    pub fn into_arc(self) -> Arc<T> {
        self.0
    }
}

impl<T> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Dep(self.0.clone())
    }
}

impl<T> Deref for Dep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dep").field(&self.0).finish()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> FromRequest for Dep<T> {
    fn bind(planner: &mut Planner<'_>) -> Result<PlanStep, RegistrationError> {
        planner.bind_dependency(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    async fn from_request(
        ctx: &Arc<RequestContext>,
        step: &PlanStep,
    ) -> Result<Self, HandlerError> {
        let type_name = std::any::type_name::<T>();
        let PlanStep::Dependency(dependency) = step else {
            return Err(step_mismatch(type_name));
        };
        let value = dependency.resolve(ctx).await?;
        value.downcast::<T>().map(Dep).map_err(|_| {
            HandlerError::resolution(type_name, "dependency produced a value of another type")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use splice_core::Method;

    fn ctx_with(values: Vec<&str>) -> Arc<RequestContext> {
        Arc::new(RequestContext::new(
            Method::Get,
            "/t",
            values.into_iter().map(String::from).collect(),
        ))
    }

    #[tokio::test]
    async fn param_parses_the_claimed_slot() {
        let registry = Registry::new();
        let mut planner = Planner::new(&registry, 2);
        let first = Param::<u64>::bind(&mut planner).unwrap();
        let second = Param::<String>::bind(&mut planner).unwrap();

        let ctx = ctx_with(vec!["42", "alice"]);
        let id = Param::<u64>::from_request(&ctx, &first).await.unwrap();
        let name = Param::<String>::from_request(&ctx, &second).await.unwrap();
        assert_eq!(*id, 42);
        assert_eq!(*name, "alice");
    }

    #[tokio::test]
    async fn param_parse_failure_is_a_resolution_error() {
        let registry = Registry::new();
        let mut planner = Planner::new(&registry, 1);
        let step = Param::<u64>::bind(&mut planner).unwrap();

        let ctx = ctx_with(vec!["not-a-number"]);
        let err = Param::<u64>::from_request(&ctx, &step).await.unwrap_err();
        assert!(matches!(err, HandlerError::Resolution { .. }));
    }

    #[tokio::test]
    async fn dep_shares_the_registered_instance() {
        #[derive(Debug, PartialEq)]
        struct Greeting(&'static str);

        let mut registry = Registry::new();
        registry.register_value(Greeting("hi"));
        let mut planner = Planner::new(&registry, 0);
        let step = Dep::<Greeting>::bind(&mut planner).unwrap();

        let ctx = ctx_with(vec![]);
        let a = Dep::<Greeting>::from_request(&ctx, &step).await.unwrap();
        let b = Dep::<Greeting>::from_request(&ctx, &step).await.unwrap();
        assert_eq!(*a, Greeting("hi"));
        assert!(Arc::ptr_eq(&a.into_arc(), &b.into_arc()));
    }
}
