//! Resolution planning.
//!
//! At registration time a [`Planner`] walks a function's parameters left to
//! right and classifies each into one of three binding kinds, producing an
//! immutable [`Plan`]. Registry bindings capture the `Arc<Dependency>` entry
//! itself, so a plan keeps resolving against the registry state it was built
//! from — later re-registrations on the scope never retroactively change an
//! existing plan. No type inspection happens per request; the adapter just
//! replays the plan.

use std::any::TypeId;
use std::sync::Arc;

use splice_core::RegistrationError;

use crate::registry::{Dependency, Registry};

/// One parameter's binding instruction.
#[derive(Debug, Clone)]
pub enum PlanStep {
    /// Bind the live per-request context.
    Context,
    /// Consume the positional path value at `slot`.
    PathValue {
        /// Zero-based index into the route's path values, claim order.
        slot: usize,
    },
    /// Resolve through the registry entry captured at registration.
    Dependency(Arc<Dependency>),
}

/// The ordered binding instructions for one function, one per parameter.
///
/// Built once at registration, immutable afterwards; registering the same
/// function elsewhere produces an independent plan.
#[derive(Debug, Clone)]
pub struct Plan {
    steps: Arc<[PlanStep]>,
}

impl Plan {
    pub(crate) fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// The binding instructions in parameter order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the function takes no parameters.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn shared_steps(&self) -> Arc<[PlanStep]> {
        self.steps.clone()
    }
}

/// Builds a [`Plan`] against one registry and one route pattern.
pub struct Planner<'r> {
    registry: &'r Registry,
    path_params: usize,
    next_slot: usize,
    position: usize,
}

impl<'r> Planner<'r> {
    /// Starts planning for a handler on a pattern with `path_params`
    /// positional parameters.
    pub fn new(registry: &'r Registry, path_params: usize) -> Self {
        Self {
            registry,
            path_params,
            next_slot: 0,
            position: 0,
        }
    }

    /// Resolver parameters never see path values.
    pub(crate) fn for_resolver(registry: &'r Registry) -> Self {
        Self::new(registry, 0)
    }

    /// Binds the current parameter to the request context.
    pub fn bind_context(&mut self) -> PlanStep {
        self.position += 1;
        PlanStep::Context
    }

    /// Binds the current parameter to the next unclaimed path slot.
    pub fn bind_path_value(
        &mut self,
        type_name: &'static str,
    ) -> Result<PlanStep, RegistrationError> {
        if self.next_slot >= self.path_params {
            return Err(RegistrationError::UnboundParameter {
                type_name,
                position: self.position,
            });
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.position += 1;
        Ok(PlanStep::PathValue { slot })
    }

    /// Binds the current parameter to the registry entry for `type_id`.
    pub fn bind_dependency(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<PlanStep, RegistrationError> {
        match self.registry.get(type_id) {
            Some(dependency) => {
                self.position += 1;
                Ok(PlanStep::Dependency(dependency.clone()))
            }
            None => Err(RegistrationError::UnresolvedDependency {
                type_name,
                position: self.position,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_slots_are_claimed_in_order() {
        let registry = Registry::new();
        let mut planner = Planner::new(&registry, 2);

        planner.bind_context();
        let first = planner.bind_path_value("u64").unwrap();
        let second = planner.bind_path_value("alloc::string::String").unwrap();
        assert!(matches!(first, PlanStep::PathValue { slot: 0 }));
        assert!(matches!(second, PlanStep::PathValue { slot: 1 }));

        let err = planner.bind_path_value("u32").unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnboundParameter { position: 3, .. }
        ));
    }

    #[test]
    fn dependency_binding_captures_the_current_entry() {
        let mut registry = Registry::new();
        registry.register_value(5_u16);

        let plan = {
            let mut planner = Planner::new(&registry, 0);
            Plan::new(vec![planner
                .bind_dependency(TypeId::of::<u16>(), "u16")
                .unwrap()])
        };

        // Re-registering afterwards must not affect the captured entry.
        let captured = match &plan.steps()[0] {
            PlanStep::Dependency(dep) => dep.id(),
            other => panic!("unexpected step {other:?}"),
        };
        registry.register_value(6_u16);
        let current = registry.get(TypeId::of::<u16>()).unwrap().id();
        assert_ne!(captured, current);
    }
}
