//! In-process mirror of the remote permission model, used once the engine is
//! unreachable. Renders its policy from the same table and rule set the
//! provisioning schema is generated from.

use entity::{Action, Actor, DecisionReason, ResourceRef, ResourceType};

use crate::AuthzError;
use crate::abac::AbacRuleSet;
use crate::table::PolicyTable;

#[derive(Clone, Debug, Default)]
pub struct LocalEvaluator {
    table: PolicyTable,
    rules: AbacRuleSet,
}

impl LocalEvaluator {
    pub fn new(table: PolicyTable, rules: AbacRuleSet) -> Self {
        Self { table, rules }
    }

    pub fn hospital_defaults() -> Self {
        Self::new(
            PolicyTable::hospital_defaults(),
            AbacRuleSet::hospital_defaults(),
        )
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn rules(&self) -> &AbacRuleSet {
        &self.rules
    }

    /// Role-based check against the actor's primary role. Absence of the
    /// role, or of the resource under the role, is a deny.
    pub fn check_basic(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
    ) -> (bool, DecisionReason) {
        let Some(role) = actor.primary_role() else {
            return (false, DecisionReason::NoRoles);
        };
        let Some(grants) = self.table.grants(role) else {
            return (false, DecisionReason::ResourceNotPermitted);
        };
        if let Some(any) = &grants.any_resource {
            if any.permits(action) {
                return (true, DecisionReason::WildcardPermission);
            }
        }
        match grants.resources.get(&resource) {
            None => (false, DecisionReason::ResourceNotPermitted),
            Some(actions) if actions.permits(action) => (true, DecisionReason::RolePermission),
            Some(_) => (false, DecisionReason::ActionNotPermitted),
        }
    }

    /// Instance check: the role grant and every matching attribute rule must
    /// both hold, each failure carrying its own reason.
    pub fn check_resource(
        &self,
        actor: &Actor,
        action: Action,
        resource: &ResourceRef,
    ) -> Result<(bool, DecisionReason), AuthzError> {
        let (allowed, reason) = self.check_basic(actor, action, resource.resource_type);
        if !allowed {
            return Ok((false, reason));
        }
        match self
            .rules
            .evaluate(actor, action, resource.resource_type, &resource.attributes)?
        {
            Some(rule) => Ok((
                false,
                DecisionReason::AbacRejected {
                    rule: rule.key.to_string(),
                },
            )),
            None => Ok((true, DecisionReason::ConditionsPassed)),
        }
    }
}
