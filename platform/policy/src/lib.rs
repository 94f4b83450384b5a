//! Client for the remote policy engine (Permit-style REST API): permission
//! checks, actor synchronization, readiness probing, and idempotent schema
//! provisioning.

mod client;
mod error;
mod schema;

pub use client::{PolicyClient, PolicySettings};
pub use error::PolicyError;
pub use schema::{
    ActionDef, EqualsCondition, PermissionGrant, PermissionSet, PolicyRuleDef, ResourceDef,
    RoleDef, RuleBinding, RuleCondition, SchemaDefinition, UserSet,
};

use entity::{Action, Actor, ResourceRef, ResourceType};

/// Seam between the authorization facade and the engine client, so scenario
/// tests can substitute scripted or failing engines.
#[allow(async_fn_in_trait)]
pub trait RemotePolicy: Send + Sync {
    async fn check_basic(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
        tenant: &str,
    ) -> Result<bool, PolicyError>;

    async fn check_resource(
        &self,
        actor: &Actor,
        action: Action,
        resource: &ResourceRef,
        tenant: &str,
    ) -> Result<bool, PolicyError>;

    async fn sync_actor(&self, actor: &Actor) -> Result<(), PolicyError>;

    async fn probe_ready(&self) -> Result<bool, PolicyError>;

    async fn provision_schema(&self, schema: &SchemaDefinition) -> Result<(), PolicyError>;
}
