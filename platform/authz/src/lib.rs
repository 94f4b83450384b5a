//! Authorization core for the MedSecure service.
//!
//! The facade delegates checks to the remote policy engine while it is
//! reachable and switches permanently to the in-process evaluator the first
//! time it is not. Both paths render their policy from the same table and
//! attribute rule set, and every decision lands in the bounded audit log.

pub mod abac;
pub mod audit;
pub mod facade;
pub mod guard;
pub mod local;
pub mod provision;
pub mod table;

pub use abac::{AbacRule, AbacRuleSet, Condition, Operand};
pub use audit::DecisionLog;
pub use facade::{Authz, EvalMode};
pub use guard::{GuardInput, GuardState, PermissionGuard};
pub use local::LocalEvaluator;
pub use table::{ActionSet, PolicyTable, RoleGrants};

use thiserror::Error;

/// Faults raised inside policy evaluation itself. All of them resolve to a
/// deny at the facade surface; only opted-in callers see the message.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("attribute evaluation failed: {0}")]
    Evaluation(String),
}
