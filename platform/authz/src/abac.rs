//! Declarative attribute rules. One rule set drives both the in-process
//! evaluator and the policy rules installed on the remote engine, so the two
//! sides cannot drift.

use entity::{Action, Actor, Attributes, ResourceType, Role};
use serde_json::Value;

use crate::AuthzError;

/// One side of an attribute comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    ActorId,
    ActorDepartment,
    ResourceAttr(&'static str),
    Literal(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Equals { left: Operand, right: Operand },
}

/// A declarative attribute rule. `action: None` applies the rule to every
/// action the role can perform on the resource.
#[derive(Clone, Debug)]
pub struct AbacRule {
    pub key: &'static str,
    pub description: &'static str,
    pub role: Role,
    pub action: Option<Action>,
    pub resource: ResourceType,
    pub condition: Condition,
}

#[derive(Clone, Debug, Default)]
pub struct AbacRuleSet {
    rules: Vec<AbacRule>,
}

impl AbacRuleSet {
    /// The hospital attribute model: patients see only their own records,
    /// only emergency nurses edit patients, doctors approve prescriptions
    /// within their own specialty.
    pub fn hospital_defaults() -> Self {
        let rules = vec![
            AbacRule {
                key: "patient_own_record",
                description: "Patients can only access their own patient record",
                role: Role::Patient,
                action: None,
                resource: ResourceType::Patient,
                condition: Condition::Equals {
                    left: Operand::ResourceAttr("id"),
                    right: Operand::ActorId,
                },
            },
            AbacRule {
                key: "patient_own_medical_records",
                description: "Patients can only access their own medical records",
                role: Role::Patient,
                action: None,
                resource: ResourceType::MedicalRecord,
                condition: Condition::Equals {
                    left: Operand::ResourceAttr("patientId"),
                    right: Operand::ActorId,
                },
            },
            AbacRule {
                key: "patient_own_prescriptions",
                description: "Patients can only access their own prescriptions",
                role: Role::Patient,
                action: None,
                resource: ResourceType::Prescription,
                condition: Condition::Equals {
                    left: Operand::ResourceAttr("patientId"),
                    right: Operand::ActorId,
                },
            },
            AbacRule {
                key: "patient_own_billing",
                description: "Patients can only access their own billing",
                role: Role::Patient,
                action: None,
                resource: ResourceType::Billing,
                condition: Condition::Equals {
                    left: Operand::ResourceAttr("patientId"),
                    right: Operand::ActorId,
                },
            },
            AbacRule {
                key: "emergency_nurse_edit",
                description: "Only emergency nurses can edit patient data",
                role: Role::Nurse,
                action: Some(Action::Edit),
                resource: ResourceType::Patient,
                condition: Condition::Equals {
                    left: Operand::ActorDepartment,
                    right: Operand::Literal(Value::String("Emergency".into())),
                },
            },
            AbacRule {
                key: "doctor_specialty_approvals",
                description: "Doctors can only approve prescriptions in their specialty",
                role: Role::Doctor,
                action: Some(Action::Approve),
                resource: ResourceType::Prescription,
                condition: Condition::Equals {
                    left: Operand::ActorDepartment,
                    right: Operand::ResourceAttr("department"),
                },
            },
        ];
        Self { rules }
    }

    pub fn rules(&self) -> &[AbacRule] {
        &self.rules
    }

    /// Apply every rule matching the actor's primary role, the action, and
    /// the resource type. Rules are independent predicates; all of them must
    /// hold. Returns the first violated rule, if any.
    pub fn evaluate(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
        attributes: &Attributes,
    ) -> Result<Option<&AbacRule>, AuthzError> {
        let Some(role) = actor.primary_role() else {
            return Ok(None);
        };
        let mut violated = None;
        for rule in &self.rules {
            if rule.role != role || rule.resource != resource {
                continue;
            }
            if rule.action.is_some_and(|gated| gated != action) {
                continue;
            }
            if !condition_holds(&rule.condition, actor, attributes)? && violated.is_none() {
                violated = Some(rule);
            }
        }
        Ok(violated)
    }
}

fn condition_holds(
    condition: &Condition,
    actor: &Actor,
    attributes: &Attributes,
) -> Result<bool, AuthzError> {
    let Condition::Equals { left, right } = condition;
    Ok(resolve(left, actor, attributes)? == resolve(right, actor, attributes)?)
}

fn resolve(operand: &Operand, actor: &Actor, attributes: &Attributes) -> Result<Value, AuthzError> {
    let value = match operand {
        Operand::ActorId => Value::String(actor.id.clone()),
        Operand::ActorDepartment => actor
            .department
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Operand::ResourceAttr(key) => {
            let value = attributes.get(*key).cloned().unwrap_or(Value::Null);
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return Err(AuthzError::Evaluation(format!(
                    "resource attribute `{key}` is not a scalar"
                )));
            }
            value
        }
        Operand::Literal(value) => value.clone(),
    };
    Ok(value)
}
