//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current state"
//! fetched from the Provider, and generates a list of required Effects (Plan).

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State};

/// Desired attributes that can be compared against observed ones
pub trait Reconcile<Observed> {
    /// Names of the attributes whose observed value differs from the desired one
    fn changed_attributes(&self, current: &Observed) -> Vec<String>;
}

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff<D, O> {
    /// Resource does not exist -> needs creation
    Create(Resource<D>),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State<O>,
        to: Resource<D>,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl<D, O> Diff<D, O> {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff<D, O>(desired: &Resource<D>, current: &State<O>) -> Diff<D, O>
where
    D: Reconcile<O> + Clone,
    O: Clone,
{
    let Some(observed) = current.attributes.as_ref() else {
        return Diff::Create(desired.clone());
    };

    let changed = desired.attributes.changed_attributes(observed);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Existing resources in `current_states` that are no longer declared are
/// planned for deletion, ordered by resource id.
pub fn create_plan<D, O>(
    desired: &[Resource<D>],
    current_states: &HashMap<ResourceId, State<O>>,
) -> Plan<D, O>
where
    D: Reconcile<O> + Clone,
    O: Clone,
{
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &current) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    let declared: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let mut orphans: Vec<(&ResourceId, &str)> = current_states
        .iter()
        .filter(|(id, state)| !declared.contains(id) && state.exists())
        .filter_map(|(id, state)| state.identifier.as_deref().map(|ident| (id, ident)))
        .collect();
    orphans.sort();

    for (id, identifier) in orphans {
        plan.add(Effect::Delete {
            id: id.clone(),
            identifier: identifier.to_string(),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Bucket {
        region: String,
    }

    impl Reconcile<Bucket> for Bucket {
        fn changed_attributes(&self, current: &Bucket) -> Vec<String> {
            if self.region == current.region {
                vec![]
            } else {
                vec!["region".to_string()]
            }
        }
    }

    fn bucket(region: &str) -> Bucket {
        Bucket {
            region: region.to_string(),
        }
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("bucket", "test", bucket("eu"));
        let current = State::not_found(ResourceId::new("bucket", "test"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("bucket", "test", bucket("eu"));
        let current = State::existing(ResourceId::new("bucket", "test"), bucket("eu"));

        let result = diff(&desired, &current);
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("bucket", "test", bucket("us"));
        let current = State::existing(ResourceId::new("bucket", "test"), bucket("eu"));

        match diff(&desired, &current) {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(changed_attributes, vec!["region".to_string()]);
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("bucket", "new-bucket", bucket("eu")),
            Resource::new("bucket", "existing-bucket", bucket("us")),
        ];

        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("bucket", "existing-bucket"),
            State::existing(ResourceId::new("bucket", "existing-bucket"), bucket("eu"))
                .with_identifier("existing"),
        );

        let plan = create_plan(&resources, &current_states);

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
    }

    #[test]
    fn create_plan_deletes_undeclared_resources() {
        let resources = vec![Resource::new("bucket", "kept", bucket("eu"))];

        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("bucket", "kept"),
            State::existing(ResourceId::new("bucket", "kept"), bucket("eu")).with_identifier("kept"),
        );
        current_states.insert(
            ResourceId::new("bucket", "removed"),
            State::existing(ResourceId::new("bucket", "removed"), bucket("eu"))
                .with_identifier("removed-slug"),
        );
        current_states.insert(
            ResourceId::new("bucket", "already-gone"),
            State::not_found(ResourceId::new("bucket", "already-gone")),
        );

        let plan = create_plan(&resources, &current_states);

        assert_eq!(plan.effects().len(), 1);
        match &plan.effects()[0] {
            Effect::Delete { id, identifier } => {
                assert_eq!(id.name, "removed");
                assert_eq!(identifier, "removed-slug");
            }
            other => panic!("Expected Delete, got {:?}", other),
        }
    }
}
