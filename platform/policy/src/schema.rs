//! Wire shapes for schema provisioning. A `SchemaDefinition` is rendered
//! from the shared policy table so the local evaluator and the remote engine
//! cannot drift apart.

use serde::Serialize;
use serde_json::Value;

/// Everything the engine must know about: resource types with their actions,
/// roles, flattened role permissions, and attribute policy rules.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SchemaDefinition {
    pub resources: Vec<ResourceDef>,
    pub roles: Vec<RoleDef>,
    pub grants: Vec<PermissionGrant>,
    pub rules: Vec<PolicyRuleDef>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionDef {
    pub key: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceDef {
    pub key: String,
    pub name: String,
    pub description: String,
    pub actions: Vec<ActionDef>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoleDef {
    pub key: String,
    pub name: String,
    pub description: String,
}

/// One (role, resource, action) permission assignment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PermissionGrant {
    pub role: String,
    pub resource: String,
    pub action: String,
}

/// One named attribute policy with its per-action bindings.
#[derive(Clone, Debug, Serialize)]
pub struct PolicyRuleDef {
    pub key: String,
    pub description: String,
    pub rules: Vec<RuleBinding>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RuleBinding {
    pub user_set: UserSet,
    pub permission_set: PermissionSet,
    pub condition: RuleCondition,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserSet {
    pub role: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PermissionSet {
    pub resource: String,
    pub action: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RuleCondition {
    pub context: EqualsCondition,
}

/// The engine's equality condition. Operand values are either attribute
/// selectors (`{"user": "id"}`, `{"resource": "patientId"}`) or literals.
#[derive(Clone, Debug, Serialize)]
pub struct EqualsCondition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub left: Value,
    pub right: Value,
}

impl EqualsCondition {
    pub fn new(left: Value, right: Value) -> Self {
        Self {
            kind: "equals",
            left,
            right,
        }
    }
}
