use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::Action;

/// Why a check resolved the way it did. Exactly one reason per decision;
/// deny is the default for any branch that is not explicitly allowed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The remote engine answered the check.
    RemoteDecision,
    /// The remote engine returned a structured error; treated as a deny.
    RemoteRejected { message: String },
    /// Allowed by a role's wildcard entry (all resources).
    WildcardPermission,
    /// Allowed by an explicit role grant on the resource type.
    RolePermission,
    /// Allowed after both the role grant and attribute conditions held.
    ConditionsPassed,
    /// The actor carries no roles.
    NoRoles,
    /// The actor's primary role has no entry for this resource type.
    ResourceNotPermitted,
    /// The resource entry exists but does not cover this action.
    ActionNotPermitted,
    /// An attribute condition rejected the resource instance.
    AbacRejected { rule: String },
    /// Evaluation itself failed; denied fail-closed.
    EvaluationFailed { message: String },
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionReason::RemoteDecision => f.write_str("remote policy decision"),
            DecisionReason::RemoteRejected { message } => {
                write!(f, "remote engine rejected the check: {message}")
            }
            DecisionReason::WildcardPermission => f.write_str("wildcard permission"),
            DecisionReason::RolePermission => f.write_str("role-based permission"),
            DecisionReason::ConditionsPassed => f.write_str("passed role and attribute checks"),
            DecisionReason::NoRoles => f.write_str("actor has no roles"),
            DecisionReason::ResourceNotPermitted => {
                f.write_str("no permissions for this resource")
            }
            DecisionReason::ActionNotPermitted => f.write_str("no permission for this action"),
            DecisionReason::AbacRejected { rule } => {
                write!(f, "failed attribute condition `{rule}`")
            }
            DecisionReason::EvaluationFailed { message } => {
                write!(f, "evaluation failed: {message}")
            }
        }
    }
}

/// One logged authorization outcome. Immutable once appended to the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: Action,
    pub resource: String,
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn new(
        actor: &str,
        action: Action,
        resource: &str,
        allowed: bool,
        reason: DecisionReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            actor: actor.to_string(),
            action,
            resource: resource.to_string(),
            allowed,
            reason,
        }
    }
}
