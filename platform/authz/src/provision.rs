//! Renders the shared policy table and attribute rule set into the schema
//! installed on the remote engine. Keeping this a pure projection of the
//! local model is the local/remote consistency invariant.

use entity::{ResourceType, Role};
use platform_policy::{
    ActionDef, EqualsCondition, PermissionGrant, PermissionSet, PolicyRuleDef, ResourceDef,
    RoleDef, RuleBinding, RuleCondition, SchemaDefinition, UserSet,
};
use serde_json::{Value, json};

use crate::abac::{AbacRuleSet, Condition, Operand};
use crate::table::{PolicyTable, resource_actions};

pub fn build_schema(table: &PolicyTable, rules: &AbacRuleSet) -> SchemaDefinition {
    SchemaDefinition {
        resources: resource_defs(),
        roles: role_defs(),
        grants: grant_defs(table),
        rules: rule_defs(table, rules),
    }
}

fn resource_defs() -> Vec<ResourceDef> {
    ResourceType::ALL
        .into_iter()
        .map(|resource| ResourceDef {
            key: resource.as_str().into(),
            name: resource.display_name().into(),
            description: resource.description().into(),
            actions: resource_actions(resource)
                .iter()
                .map(|action| ActionDef {
                    key: action.as_str().into(),
                    name: action.display_name().into(),
                    description: format!("{} {}", action.display_name(), resource.display_name()),
                })
                .collect(),
        })
        .collect()
}

fn role_defs() -> Vec<RoleDef> {
    Role::ALL
        .into_iter()
        .map(|role| RoleDef {
            key: role.as_str().into(),
            name: role.display_name().into(),
            description: role.description().into(),
        })
        .collect()
}

fn grant_defs(table: &PolicyTable) -> Vec<PermissionGrant> {
    table
        .flattened()
        .into_iter()
        .map(|(role, resource, action)| PermissionGrant {
            role: role.as_str().into(),
            resource: resource.as_str().into(),
            action: action.as_str().into(),
        })
        .collect()
}

/// An any-action rule expands to one engine binding per action the role
/// actually holds on the resource.
fn rule_defs(table: &PolicyTable, rules: &AbacRuleSet) -> Vec<PolicyRuleDef> {
    rules
        .rules()
        .iter()
        .map(|rule| {
            let actions = match rule.action {
                Some(action) => vec![action],
                None => table.actions_for(rule.role, rule.resource),
            };
            PolicyRuleDef {
                key: rule.key.into(),
                description: rule.description.into(),
                rules: actions
                    .into_iter()
                    .map(|action| RuleBinding {
                        user_set: UserSet {
                            role: rule.role.as_str().into(),
                        },
                        permission_set: PermissionSet {
                            resource: rule.resource.as_str().into(),
                            action: action.as_str().into(),
                        },
                        condition: RuleCondition {
                            context: EqualsCondition::new(
                                operand_value(left_of(&rule.condition)),
                                operand_value(right_of(&rule.condition)),
                            ),
                        },
                    })
                    .collect(),
            }
        })
        .collect()
}

fn left_of(condition: &Condition) -> &Operand {
    let Condition::Equals { left, .. } = condition;
    left
}

fn right_of(condition: &Condition) -> &Operand {
    let Condition::Equals { right, .. } = condition;
    right
}

fn operand_value(operand: &Operand) -> Value {
    match operand {
        Operand::ActorId => json!({"user": "id"}),
        Operand::ActorDepartment => json!({"user": "department"}),
        Operand::ResourceAttr(key) => json!({"resource": key}),
        Operand::Literal(value) => value.clone(),
    }
}
