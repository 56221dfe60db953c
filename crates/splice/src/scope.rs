//! Route scopes.
//!
//! A [`Scope`] is a route grouping with its own dependency registry, error
//! handler, result-handler layers, and before/after middleware. It is the
//! registration surface call sites talk to:
//!
//! ```rust,ignore
//! let mut api = Scope::new();
//! api.register_value(Database::connect()?);
//! api.on_error(|ctx, err| async move { /* ... */ });
//!
//! api.get("/users/{id}", |db: Dep<Database>, id: Param<u64>| async move {
//!     Ok::<_, BoxError>(Json(db.user(*id)?))
//! })?;
//!
//! let mut admin = api.child("/admin");
//! admin.register_value(AuditLog::new());
//! admin.post("/reset", reset_handler)?;
//! ```
//!
//! [`Scope::child`] snapshots the parent's dependency set: both sides keep
//! registering independently afterwards. Error-handler and result-layer
//! state is captured per adapted handler at registration time, so replacing
//! either never rebinds routes that already exist.

use std::sync::Arc;

use tracing::debug;

use splice_core::{
    Method, PipelineHandler, RegistrationError, RouteId, Router, count_params,
};

use crate::handler::{
    AdaptedHandler, ErrorHandler, Handler, Snapshot, adapt, default_error_handler,
};
use crate::registry::{CachePolicy, Registry};
use crate::resolver::ResolverFn;
use crate::result::{ResultHandler, ResultLayer, compose};

/// One or more handler functions registrable as a route's main chain.
///
/// Implemented for any [`Handler`] and for tuples of up to four handlers;
/// each function gets an independent resolution plan over the same path
/// parameters.
pub trait IntoPipeline<Args> {
    /// Adapts every function against the registry and scope snapshot.
    fn into_pipeline(
        self,
        registry: &Registry,
        path_params: usize,
        snapshot: &Snapshot,
    ) -> Result<Vec<AdaptedHandler>, RegistrationError>;
}

impl<F, Args> IntoPipeline<(Args,)> for F
where
    F: Handler<Args>,
{
    fn into_pipeline(
        self,
        registry: &Registry,
        path_params: usize,
        snapshot: &Snapshot,
    ) -> Result<Vec<AdaptedHandler>, RegistrationError> {
        Ok(vec![adapt(self, registry, path_params, snapshot.clone())?])
    }
}

macro_rules! impl_into_pipeline {
    ( $( ($f:ident, $a:ident) ),+ ) => {
        #[allow(non_snake_case)]
        impl<$($f, $a,)+> IntoPipeline<($($a,)+)> for ($($f,)+)
        where
            $( $f: Handler<$a>, )+
        {
            fn into_pipeline(
                self,
                registry: &Registry,
                path_params: usize,
                snapshot: &Snapshot,
            ) -> Result<Vec<AdaptedHandler>, RegistrationError> {
                let ($($f,)+) = self;
                Ok(vec![
                    $( adapt($f, registry, path_params, snapshot.clone())?, )+
                ])
            }
        }
    };
}

impl_into_pipeline!((F1, A1), (F2, A2));
impl_into_pipeline!((F1, A1), (F2, A2), (F3, A3));
impl_into_pipeline!((F1, A1), (F2, A2), (F3, A3), (F4, A4));

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{prefix}/{path}")
    }
}

/// A route grouping with its own dependencies, error handler, result layers,
/// and middleware.
pub struct Scope {
    prefix: String,
    registry: Registry,
    error_handler: ErrorHandler,
    result_layers: Vec<ResultLayer>,
    before: Vec<AdaptedHandler>,
    after: Vec<AdaptedHandler>,
    router: Arc<Router>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a root scope with its own route table.
    pub fn new() -> Self {
        Self::with_router(Arc::new(Router::new()))
    }

    /// Creates a root scope registering into an existing route table.
    pub fn with_router(router: Arc<Router>) -> Self {
        Self {
            prefix: String::new(),
            registry: Registry::new(),
            error_handler: default_error_handler(),
            result_layers: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            router,
        }
    }

    /// The route table this scope registers into.
    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// This scope's dependency registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The scope's path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // ─── Dependency registration ──────────────────────────────────────────────

    /// Registers a concrete dependency instance.
    pub fn register_value<T: Send + Sync + 'static>(&mut self, value: T) {
        self.registry.register_value(value);
    }

    /// Registers a dependency resolver, cached per request.
    pub fn register<F, Args>(&mut self, resolver: F) -> Result<(), RegistrationError>
    where
        F: ResolverFn<Args>,
    {
        self.registry.register(resolver)
    }

    /// Registers a dependency resolver that re-runs on every binding.
    pub fn register_transient<F, Args>(&mut self, resolver: F) -> Result<(), RegistrationError>
    where
        F: ResolverFn<Args>,
    {
        self.registry
            .register_with(resolver, CachePolicy::Transient)
    }

    // ─── Error and result handling ────────────────────────────────────────────

    /// Replaces the scope's error handler.
    ///
    /// Only handlers adapted after this call see the replacement.
    pub fn on_error<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Arc<splice_core::RequestContext>, splice_core::HandlerError) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.error_handler = Arc::new(move |ctx, err| Box::pin(handler(ctx, err)));
    }

    /// Adds a result layer wrapping the current chain; the newest layer runs
    /// first. Only handlers adapted after this call see it.
    pub fn use_result_handler<F>(&mut self, layer: F)
    where
        F: Fn(ResultHandler) -> ResultHandler + Send + Sync + 'static,
    {
        self.result_layers.push(Arc::new(layer));
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.error_handler.clone(), compose(&self.result_layers))
    }

    // ─── Middleware ───────────────────────────────────────────────────────────

    /// Adapts `handler` to run before the main chain of every route
    /// registered on this scope (and inherited children) afterwards.
    pub fn wrap<F, Args>(&mut self, handler: F) -> Result<(), RegistrationError>
    where
        F: Handler<Args>,
    {
        let adapted = adapt(handler, &self.registry, 0, self.snapshot())?;
        self.before.push(adapted);
        Ok(())
    }

    /// Adapts `handler` to run after the main chain, provided the pipeline
    /// was not halted earlier.
    pub fn finish<F, Args>(&mut self, handler: F) -> Result<(), RegistrationError>
    where
        F: Handler<Args>,
    {
        let adapted = adapt(handler, &self.registry, 0, self.snapshot())?;
        self.after.push(adapted);
        Ok(())
    }

    // ─── Scoping ──────────────────────────────────────────────────────────────

    /// Creates a child scope under `prefix`.
    ///
    /// The child starts with a snapshot of this scope's dependencies, error
    /// handler, result layers, and middleware; registrations on either side
    /// stay independent afterwards. Routes go to the shared table.
    pub fn child(&self, prefix: &str) -> Scope {
        Scope {
            prefix: join_paths(&self.prefix, prefix),
            registry: self.registry.branch(),
            error_handler: self.error_handler.clone(),
            result_layers: self.result_layers.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            router: self.router.clone(),
        }
    }

    // ─── Route registration ───────────────────────────────────────────────────

    /// Adapts `handlers` and registers the pipeline for (method, path).
    pub fn handle<P, Args>(
        &self,
        method: Method,
        path: &str,
        handlers: P,
    ) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        let full = join_paths(&self.prefix, path);
        let path_params = count_params(&full);
        let mains = handlers.into_pipeline(&self.registry, path_params, &self.snapshot())?;
        let pipeline = self.assemble(&mains);
        debug!(%method, path = %full, handlers = pipeline.len(), "binding route");
        self.router.register(method, &full, pipeline)
    }

    /// Registers the same adapted handler chain for every standard method.
    ///
    /// Adapters are built once and shared; registration is attempted per
    /// method, and one method's failure does not stop the rest.
    pub fn any<P, Args>(
        &self,
        path: &str,
        handlers: P,
    ) -> Result<Vec<(Method, Result<RouteId, RegistrationError>)>, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        let full = join_paths(&self.prefix, path);
        let path_params = count_params(&full);
        let mains = handlers.into_pipeline(&self.registry, path_params, &self.snapshot())?;
        let pipeline = self.assemble(&mains);
        Ok(Method::ALL
            .iter()
            .map(|&method| {
                (
                    method,
                    self.router.register(method, &full, pipeline.clone()),
                )
            })
            .collect())
    }

    fn assemble(&self, mains: &[AdaptedHandler]) -> Vec<PipelineHandler> {
        self.before
            .iter()
            .chain(mains)
            .chain(self.after.iter())
            .map(AdaptedHandler::as_pipeline_handler)
            .collect()
    }

    /// Registers a GET route.
    pub fn get<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Get, path, handlers)
    }

    /// Registers a POST route.
    pub fn post<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Post, path, handlers)
    }

    /// Registers a PUT route.
    pub fn put<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Put, path, handlers)
    }

    /// Registers a DELETE route.
    pub fn delete<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Delete, path, handlers)
    }

    /// Registers a HEAD route.
    pub fn head<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Head, path, handlers)
    }

    /// Registers a PATCH route.
    pub fn patch<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Patch, path, handlers)
    }

    /// Registers an OPTIONS route.
    pub fn options<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Options, path, handlers)
    }

    /// Registers a CONNECT route.
    pub fn connect<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Connect, path, handlers)
    }

    /// Registers a TRACE route.
    pub fn trace<P, Args>(&self, path: &str, handlers: P) -> Result<RouteId, RegistrationError>
    where
        P: IntoPipeline<Args>,
    {
        self.handle(Method::Trace, path, handlers)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("prefix", &self.prefix)
            .field("dependencies", &self.registry.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish_non_exhaustive()
    }
}
