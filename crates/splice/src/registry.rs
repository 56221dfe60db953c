//! Per-scope dependency registry.
//!
//! A [`Registry`] stores one [`Dependency`] per value type, keyed by
//! [`TypeId`]. A dependency is either a concrete instance (shared as-is on
//! every resolution) or a resolver — an async function whose own parameters
//! are resolved recursively through the same registry.
//!
//! Everything that can go wrong statically goes wrong at registration time:
//! a resolver parameter with no registered dependency fails with
//! [`RegistrationError::UnresolvedDependency`], and a resolver whose
//! transitive requirements reach its own type fails with
//! [`RegistrationError::CyclicDependency`]. Request time only sees resolver
//! execution failures.
//!
//! [`Registry::branch`] gives a child scope a shallow copy of all current
//! entries; later registrations on parent or child are mutually invisible.
//! Entries are `Arc`-shared, so branching is cheap and resolution plans built
//! against a registry keep working regardless of later re-registrations.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use tracing::debug;

use splice_core::{HandlerError, RegistrationError, RequestContext};

use crate::plan::{PlanStep, Planner};
use crate::resolver::ResolverFn;

/// Type-erased dependency value, downcast by the extractor that requested it.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

type ResolveFn =
    Arc<dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, Result<AnyValue, HandlerError>> + Send + Sync>;

/// Registration ids are process-global so a re-registered type never aliases
/// the request-cache slot of the entry it replaced.
static NEXT_DEPENDENCY_ID: AtomicU64 = AtomicU64::new(0);

/// When a resolver's value is reused within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Resolve at most once per request; further bindings share the value.
    PerRequest,
    /// Re-run the resolver on every binding that needs the value.
    Transient,
}

enum Provider {
    Instance(AnyValue),
    Resolver(ResolveFn),
}

/// One registered dependency: a value type plus the way to produce it.
pub struct Dependency {
    id: u64,
    type_id: TypeId,
    type_name: &'static str,
    cache: CachePolicy,
    requires: Vec<(TypeId, &'static str)>,
    provider: Provider,
}

impl Dependency {
    /// Unique id of this registration, distinct across re-registrations.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The value type this dependency produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The reuse policy set at registration.
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn requires(&self) -> &[(TypeId, &'static str)] {
        &self.requires
    }

    /// Produces the value for one request, honouring the cache policy.
    pub(crate) fn resolve(
        self: &Arc<Self>,
        ctx: &Arc<RequestContext>,
    ) -> BoxFuture<'static, Result<AnyValue, HandlerError>> {
        match &self.provider {
            Provider::Instance(value) => {
                let value = value.clone();
                Box::pin(async move { Ok(value) })
            }
            Provider::Resolver(run) => {
                let dep = Arc::clone(self);
                let ctx = Arc::clone(ctx);
                let run = run.clone();
                Box::pin(async move {
                    if dep.cache == CachePolicy::PerRequest {
                        if let Some(value) = ctx.cache_get(dep.id) {
                            return Ok(value);
                        }
                    }
                    let value = run(ctx.clone()).await?;
                    if dep.cache == CachePolicy::PerRequest {
                        ctx.cache_put(dep.id, value.clone());
                    }
                    Ok(value)
                })
            }
        }
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("type_name", &self.type_name)
            .field("cache", &self.cache)
            .field(
                "kind",
                &match self.provider {
                    Provider::Instance(_) => "instance",
                    Provider::Resolver(_) => "resolver",
                },
            )
            .finish_non_exhaustive()
    }
}

/// The dependency set of one scope.
///
/// Mutation happens only during the single-threaded setup phase; afterwards
/// the registry is only read (through plans holding `Arc<Dependency>`
/// snapshots), so no synchronisation is needed.
#[derive(Default, Clone)]
pub struct Registry {
    /// Insertion order, kept for diagnostics; resolution goes through `index`.
    entries: Vec<Arc<Dependency>>,
    index: HashMap<TypeId, usize>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a concrete instance, returned as-is on every resolution.
    ///
    /// The last registration for a type wins.
    pub fn register_value<T: Send + Sync + 'static>(&mut self, value: T) {
        let type_name = std::any::type_name::<T>();
        debug!(dependency = type_name, "instance registered");
        self.insert(Dependency {
            id: NEXT_DEPENDENCY_ID.fetch_add(1, Ordering::Relaxed),
            type_id: TypeId::of::<T>(),
            type_name,
            cache: CachePolicy::PerRequest,
            requires: Vec::new(),
            provider: Provider::Instance(Arc::new(value)),
        });
    }

    /// Registers a resolver whose value is cached per request.
    pub fn register<F, Args>(&mut self, resolver: F) -> Result<(), RegistrationError>
    where
        F: ResolverFn<Args>,
    {
        self.register_with(resolver, CachePolicy::PerRequest)
    }

    /// Registers a resolver that re-runs on every binding.
    pub fn register_transient<F, Args>(&mut self, resolver: F) -> Result<(), RegistrationError>
    where
        F: ResolverFn<Args>,
    {
        self.register_with(resolver, CachePolicy::Transient)
    }

    /// Registers a resolver with an explicit cache policy.
    ///
    /// The resolver's parameters are bound against the current registry right
    /// now; missing dependencies and requirement cycles fail here, never at
    /// request time.
    pub fn register_with<F, Args>(
        &mut self,
        resolver: F,
        cache: CachePolicy,
    ) -> Result<(), RegistrationError>
    where
        F: ResolverFn<Args>,
    {
        let steps = {
            let mut planner = Planner::for_resolver(&*self);
            F::bind(&mut planner)?
        };
        let requires: Vec<(TypeId, &'static str)> = steps
            .iter()
            .filter_map(|step| match step {
                PlanStep::Dependency(dep) => Some((Dependency::type_id(dep), dep.type_name())),
                _ => None,
            })
            .collect();

        let type_id = TypeId::of::<F::Value>();
        let type_name = std::any::type_name::<F::Value>();
        self.check_cycles(type_id, type_name, &requires)?;

        let steps: Arc<[PlanStep]> = steps.into();
        let run: ResolveFn = Arc::new(move |ctx| {
            let fut = resolver.resolve(ctx, steps.clone());
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyValue) })
        });

        debug!(dependency = type_name, cache = ?cache, "resolver registered");
        self.insert(Dependency {
            id: NEXT_DEPENDENCY_ID.fetch_add(1, Ordering::Relaxed),
            type_id,
            type_name,
            cache,
            requires,
            provider: Provider::Resolver(run),
        });
        Ok(())
    }

    /// Creates a child registry holding a shallow copy of all current
    /// entries. Later registrations on either side stay invisible to the
    /// other.
    pub fn branch(&self) -> Registry {
        self.clone()
    }

    /// Looks up the dependency registered for `type_id`.
    pub fn get(&self, type_id: TypeId) -> Option<&Arc<Dependency>> {
        self.index.get(&type_id).map(|&i| &self.entries[i])
    }

    /// Whether a dependency producing `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered dependencies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order, for diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Dependency>> {
        self.entries.iter()
    }

    fn insert(&mut self, dependency: Dependency) {
        let dependency = Arc::new(dependency);
        match self.index.get(&dependency.type_id) {
            // Last registration wins, keeping the original iteration position.
            Some(&i) => self.entries[i] = dependency,
            None => {
                self.index.insert(dependency.type_id, self.entries.len());
                self.entries.push(dependency);
            }
        }
    }

    fn check_cycles(
        &self,
        root: TypeId,
        root_name: &'static str,
        requires: &[(TypeId, &'static str)],
    ) -> Result<(), RegistrationError> {
        for &(type_id, name) in requires {
            if type_id == root {
                return Err(RegistrationError::CyclicDependency {
                    type_name: root_name,
                    chain: format!("{root_name} -> {root_name}"),
                });
            }
            let mut chain = vec![root_name, name];
            let mut visited = HashSet::new();
            if self.reaches(type_id, root, &mut chain, &mut visited) {
                return Err(RegistrationError::CyclicDependency {
                    type_name: root_name,
                    chain: chain.join(" -> "),
                });
            }
        }
        Ok(())
    }

    /// Walks `node`'s transitive requirements over the current entries;
    /// `true` if they reach `target`, with `chain` holding the closing path.
    fn reaches(
        &self,
        node: TypeId,
        target: TypeId,
        chain: &mut Vec<&'static str>,
        visited: &mut HashSet<TypeId>,
    ) -> bool {
        if !visited.insert(node) {
            return false;
        }
        let Some(dep) = self.get(node) else {
            return false;
        };
        for &(type_id, name) in dep.requires() {
            if type_id == target {
                let root = chain[0];
                chain.push(root);
                return true;
            }
            chain.push(name);
            if self.reaches(type_id, target, chain, visited) {
                return true;
            }
            chain.pop();
        }
        false
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "entries",
                &self.entries.iter().map(|d| d.type_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Dep;
    use splice_core::Method;
    use std::convert::Infallible;

    #[derive(Debug, PartialEq)]
    struct Config(&'static str);

    #[derive(Debug)]
    struct Conn {
        url: String,
    }

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::new(Method::Get, "/", vec![]))
    }

    #[test]
    fn last_registration_wins_and_keeps_position() {
        let mut registry = Registry::new();
        registry.register_value(Config("a"));
        registry.register_value(1_u32);
        registry.register_value(Config("b"));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.iter().map(|d| d.type_name()).collect();
        assert_eq!(names[0], std::any::type_name::<Config>());
    }

    #[test]
    fn branch_is_mutually_invisible() {
        let mut parent = Registry::new();
        parent.register_value(Config("shared"));

        let mut child = parent.branch();
        child.register_value(7_u64);
        parent.register_value("parent only");

        assert!(child.contains::<Config>());
        assert!(child.contains::<u64>());
        assert!(!child.contains::<&'static str>());
        assert!(!parent.contains::<u64>());
    }

    #[test]
    fn resolver_with_missing_dependency_fails_at_registration() {
        let mut registry = Registry::new();
        let err = registry
            .register(|cfg: Dep<Config>| async move {
                Ok::<_, Infallible>(Conn {
                    url: cfg.0.to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnresolvedDependency { position: 0, .. }
        ));
    }

    #[test]
    fn self_cycle_is_rejected() {
        let mut registry = Registry::new();
        registry
            .register(|| async { Ok::<_, Infallible>(Config("seed")) })
            .unwrap();
        let err = registry
            .register(|cfg: Dep<Config>| async move { Ok::<_, Infallible>(Config(cfg.0)) })
            .unwrap_err();
        assert!(matches!(err, RegistrationError::CyclicDependency { .. }));
    }

    #[test]
    fn two_step_cycle_is_rejected_with_chain() {
        #[derive(Debug)]
        struct A;
        #[derive(Debug)]
        struct B;

        let mut registry = Registry::new();
        registry.register(|| async { Ok::<_, Infallible>(A) }).unwrap();
        registry
            .register(|_a: Dep<A>| async { Ok::<_, Infallible>(B) })
            .unwrap();
        let err = registry
            .register(|_b: Dep<B>| async { Ok::<_, Infallible>(A) })
            .unwrap_err();
        match err {
            RegistrationError::CyclicDependency { chain, .. } => {
                assert!(chain.matches("A").count() >= 2, "chain was {chain}");
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn instance_resolves_to_the_same_value() {
        let mut registry = Registry::new();
        registry.register_value(Config("fixed"));
        let dep = registry.get(TypeId::of::<Config>()).unwrap().clone();

        let ctx = ctx();
        let first = dep.resolve(&ctx).await.unwrap();
        let second = dep.resolve(&ctx).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
