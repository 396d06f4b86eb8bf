//! Plan - Collection of Effects
//!
//! A Plan is an ordered list of Effects to be executed.
//! No side effects occur until the Plan is applied.

use crate::effect::Effect;

/// Plan containing Effects to be executed
#[derive(Debug, Clone)]
pub struct Plan<D, O> {
    effects: Vec<Effect<D, O>>,
}

impl<D, O> Default for Plan<D, O> {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
        }
    }
}

impl<D, O> Plan<D, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect<D, O>) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect<D, O>] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Delete { .. } => summary.delete += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceId};

    #[test]
    fn summary_counts_each_kind() {
        let mut plan: Plan<u32, u32> = Plan::new();
        assert!(plan.is_empty());

        plan.add(Effect::Create(Resource::new("pipeline", "a", 1)));
        plan.add(Effect::Create(Resource::new("pipeline", "b", 2)));
        plan.add(Effect::Delete {
            id: ResourceId::new("pipeline", "c"),
            identifier: "c-slug".to_string(),
        });

        let summary = plan.summary();
        assert_eq!(
            summary,
            PlanSummary {
                create: 2,
                update: 0,
                delete: 1
            }
        );
        assert_eq!(
            summary.to_string(),
            "Plan: 2 to create, 0 to update, 1 to delete"
        );
    }
}
