//! Resolver functions.
//!
//! A resolver is an async function producing a dependency value. Its own
//! parameters are extractors resolved recursively through the same registry
//! (the request context or other registered dependencies — never path
//! values, which belong to a route, not to the registry). The output is a
//! `Result<T, E>`: `T` becomes the registered value type, a returned error is
//! a resolution failure routed to the scope's error handler. Infallible
//! resolvers return `Result<T, Infallible>`.
//!
//! [`ResolverFn`] is blanket-implemented for functions of 0 to 8 parameters,
//! with the parameter list carried as the `Args` tuple the way the handler
//! trait does it.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use splice_core::{BoxError, HandlerError, RegistrationError, RequestContext};

use crate::extract::FromRequest;
use crate::plan::{PlanStep, Planner};

/// An async function registrable as a dependency resolver.
pub trait ResolverFn<Args>: Clone + Send + Sync + 'static {
    /// The dependency value type this resolver produces.
    type Value: Send + Sync + 'static;

    /// Binds the resolver's parameters against the registry being registered
    /// into; fails if one cannot be bound.
    fn bind(planner: &mut Planner<'_>) -> Result<Vec<PlanStep>, RegistrationError>;

    /// Runs the resolver for one request, replaying the bound steps.
    fn resolve(
        &self,
        ctx: Arc<RequestContext>,
        steps: Arc<[PlanStep]>,
    ) -> BoxFuture<'static, Result<Self::Value, HandlerError>>;
}

macro_rules! impl_resolver {
    ( $( $ty:ident => $idx:tt ),* ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, T, E, $($ty,)*> ResolverFn<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Result<T, E>> + Send + 'static,
            T: Send + Sync + 'static,
            E: Into<BoxError> + 'static,
            $( $ty: FromRequest, )*
        {
            type Value = T;

            fn bind(planner: &mut Planner<'_>) -> Result<Vec<PlanStep>, RegistrationError> {
                Ok(vec![ $( $ty::bind(planner)?, )* ])
            }

            fn resolve(
                &self,
                ctx: Arc<RequestContext>,
                steps: Arc<[PlanStep]>,
            ) -> BoxFuture<'static, Result<T, HandlerError>> {
                let f = self.clone();
                Box::pin(async move {
                    $( let $ty = $ty::from_request(&ctx, &steps[$idx]).await?; )*
                    f($($ty,)*).await.map_err(|err| {
                        HandlerError::resolution(std::any::type_name::<T>(), err)
                    })
                })
            }
        }
    };
}

impl_resolver!();
impl_resolver!(A1 => 0);
impl_resolver!(A1 => 0, A2 => 1);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2, A4 => 3);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6);
impl_resolver!(A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Dep;
    use crate::registry::Registry;
    use splice_core::Method;
    use std::convert::Infallible;

    #[derive(Debug, Clone, PartialEq)]
    struct Base(u32);

    #[derive(Debug, PartialEq)]
    struct Derived(u32);

    #[tokio::test]
    async fn resolver_parameters_resolve_recursively() {
        let mut registry = Registry::new();
        registry.register_value(Base(20));
        registry
            .register(|base: Dep<Base>| async move { Ok::<_, Infallible>(Derived(base.0 + 1)) })
            .unwrap();

        let ctx = Arc::new(RequestContext::new(Method::Get, "/", vec![]));
        let dep = registry
            .get(std::any::TypeId::of::<Derived>())
            .unwrap()
            .clone();
        let value = dep.resolve(&ctx).await.unwrap();
        assert_eq!(*value.downcast::<Derived>().unwrap(), Derived(21));
    }

    #[tokio::test]
    async fn resolver_error_becomes_a_resolution_error() {
        let mut registry = Registry::new();
        registry
            .register(|| async { Err::<Derived, _>("backend offline") })
            .unwrap();

        let ctx = Arc::new(RequestContext::new(Method::Get, "/", vec![]));
        let dep = registry
            .get(std::any::TypeId::of::<Derived>())
            .unwrap()
            .clone();
        let err = dep.resolve(&ctx).await.unwrap_err();
        assert!(matches!(err, HandlerError::Resolution { .. }));
        assert!(err.to_string().contains("backend offline"));
    }

    #[tokio::test]
    async fn context_bound_resolver_sees_the_live_request() {
        #[derive(Debug)]
        struct PathTag(String);

        let mut registry = Registry::new();
        registry
            .register(|ctx: Arc<RequestContext>| async move {
                Ok::<_, Infallible>(PathTag(ctx.path().to_string()))
            })
            .unwrap();

        let ctx = Arc::new(RequestContext::new(Method::Get, "/tagged", vec![]));
        let dep = registry
            .get(std::any::TypeId::of::<PathTag>())
            .unwrap()
            .clone();
        let value = dep.resolve(&ctx).await.unwrap();
        assert_eq!(value.downcast::<PathTag>().unwrap().0, "/tagged");
    }
}
