//! The role → resource → action permission table. One instance seeds both
//! the local evaluator and the remote provisioning schema, which is what
//! keeps the two evaluation paths semantically equivalent.

use std::collections::{BTreeMap, BTreeSet};

use entity::{Action, ResourceType, Role};

/// Either every action, or an explicit set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSet {
    Any,
    Only(BTreeSet<Action>),
}

impl ActionSet {
    pub fn of(actions: &[Action]) -> Self {
        ActionSet::Only(actions.iter().copied().collect())
    }

    pub fn permits(&self, action: Action) -> bool {
        match self {
            ActionSet::Any => true,
            ActionSet::Only(actions) => actions.contains(&action),
        }
    }

    /// Concrete actions, expanding `Any` over the given catalog.
    fn expand(&self, catalog: &'static [Action]) -> Vec<Action> {
        match self {
            ActionSet::Any => catalog.to_vec(),
            ActionSet::Only(actions) => actions.iter().copied().collect(),
        }
    }
}

/// Grants held by one role. `any_resource` is the wildcard entry covering
/// every resource type.
#[derive(Clone, Debug, Default)]
pub struct RoleGrants {
    pub any_resource: Option<ActionSet>,
    pub resources: BTreeMap<ResourceType, ActionSet>,
}

impl RoleGrants {
    fn wildcard() -> Self {
        Self {
            any_resource: Some(ActionSet::Any),
            resources: BTreeMap::new(),
        }
    }

    fn with(mut self, resource: ResourceType, actions: &[Action]) -> Self {
        self.resources.insert(resource, ActionSet::of(actions));
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct PolicyTable {
    grants: BTreeMap<Role, RoleGrants>,
}

impl PolicyTable {
    /// The hospital permission model. Admin holds the wildcard; every other
    /// role gets an explicit per-resource action list.
    pub fn hospital_defaults() -> Self {
        use Action::*;
        use ResourceType::*;

        let mut grants = BTreeMap::new();
        grants.insert(Role::Admin, RoleGrants::wildcard());
        grants.insert(
            Role::Doctor,
            RoleGrants::default()
                .with(Patient, &[View, Create, Edit])
                .with(MedicalRecord, &[View, Create, Edit])
                .with(Prescription, &[View, Create, Approve])
                .with(Billing, &[View])
                .with(LabResult, &[View, Create, Approve])
                .with(Appointment, &[View, Create, Edit, Approve])
                .with(Schedule, &[View]),
        );
        grants.insert(
            Role::Nurse,
            RoleGrants::default()
                .with(Patient, &[View])
                .with(MedicalRecord, &[View, Create])
                .with(Prescription, &[View, Administer])
                .with(LabResult, &[View])
                .with(Appointment, &[View, Create])
                .with(Schedule, &[View]),
        );
        grants.insert(
            Role::Patient,
            RoleGrants::default()
                .with(Patient, &[View])
                .with(MedicalRecord, &[View])
                .with(Prescription, &[View])
                .with(Billing, &[View])
                .with(Appointment, &[View, Create]),
        );
        grants.insert(
            Role::LabTechnician,
            RoleGrants::default()
                .with(Patient, &[View])
                .with(MedicalRecord, &[View])
                .with(LabResult, &[View, Create, Edit]),
        );
        grants.insert(
            Role::Receptionist,
            RoleGrants::default()
                .with(Patient, &[View, Create])
                .with(Appointment, &[View, Create, Edit])
                .with(Schedule, &[View]),
        );
        grants.insert(
            Role::BillingStaff,
            RoleGrants::default()
                .with(Patient, &[View])
                .with(Billing, &[View, Create, Edit, Approve]),
        );
        Self { grants }
    }

    pub fn grants(&self, role: Role) -> Option<&RoleGrants> {
        self.grants.get(&role)
    }

    /// Actions the role may perform on the resource, with wildcards expanded
    /// over the provisioning catalog.
    pub fn actions_for(&self, role: Role, resource: ResourceType) -> Vec<Action> {
        let Some(grants) = self.grants.get(&role) else {
            return Vec::new();
        };
        let mut actions = BTreeSet::new();
        if let Some(any) = &grants.any_resource {
            actions.extend(any.expand(resource_actions(resource)));
        }
        if let Some(set) = grants.resources.get(&resource) {
            actions.extend(set.expand(resource_actions(resource)));
        }
        actions.into_iter().collect()
    }

    /// Flatten to (role, resource, action) triples for provisioning.
    pub fn flattened(&self) -> Vec<(Role, ResourceType, Action)> {
        let mut triples = Vec::new();
        for role in self.grants.keys().copied() {
            for resource in ResourceType::ALL {
                for action in self.actions_for(role, resource) {
                    triples.push((role, resource, action));
                }
            }
        }
        triples
    }
}

/// The actions the engine knows for each resource type.
pub fn resource_actions(resource: ResourceType) -> &'static [Action] {
    use Action::*;
    match resource {
        ResourceType::Patient => &[View, Create, Edit, Delete],
        ResourceType::MedicalRecord => &[View, Create, Edit, Delete],
        ResourceType::Prescription => &[View, Create, Edit, Delete, Approve, Administer],
        ResourceType::Billing => &[View, Create, Edit, Delete, Approve],
        ResourceType::System => &[View, Manage, Administer],
        ResourceType::LabResult => &[View, Create, Edit, Delete, Approve],
        ResourceType::Appointment => &[View, Create, Edit, Delete, Approve],
        ResourceType::Schedule => &[View, Create, Edit, Delete, Approve],
    }
}
