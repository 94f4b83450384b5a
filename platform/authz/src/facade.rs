//! The authorization facade: one owned service instance that prefers the
//! remote engine and switches permanently to local evaluation the first time
//! the engine is unreachable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use entity::{Action, Actor, Decision, DecisionReason, ResourceRef, ResourceType};
use platform_policy::{PolicyError, RemotePolicy};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::AuthzError;
use crate::audit::DecisionLog;
use crate::local::LocalEvaluator;
use crate::provision;

/// Which evaluation path answers checks. `Local` is terminal: once the
/// engine has failed, the process stays on local evaluation until restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    Remote,
    Local,
}

pub struct Authz<C> {
    remote: C,
    local: LocalEvaluator,
    log: Arc<DecisionLog>,
    mode: watch::Sender<EvalMode>,
    bootstrapped: AtomicBool,
}

impl<C: RemotePolicy> Authz<C> {
    pub fn new(remote: C, local: LocalEvaluator, log: Arc<DecisionLog>) -> Self {
        let (mode, _) = watch::channel(EvalMode::Remote);
        Self {
            remote,
            local,
            log,
            mode,
            bootstrapped: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> EvalMode {
        *self.mode.borrow()
    }

    /// Reactive view of the evaluation mode, for surfaces that need to react
    /// to the one-way Remote → Local transition.
    pub fn watch_mode(&self) -> watch::Receiver<EvalMode> {
        self.mode.subscribe()
    }

    pub fn decision_log(&self) -> &DecisionLog {
        &self.log
    }

    fn fall_back(&self, cause: &str) {
        let flipped = self.mode.send_if_modified(|mode| {
            if *mode == EvalMode::Remote {
                *mode = EvalMode::Local;
                true
            } else {
                false
            }
        });
        if flipped {
            warn!(
                cause,
                "policy engine unreachable; switching to local evaluation for the rest of the process"
            );
        }
    }

    /// Bootstrap: provision the engine schema once. Unreachable engine means
    /// local mode; a structured rejection propagates so startup can abort.
    /// Idempotent after the first successful call.
    pub async fn initialize(&self) -> Result<EvalMode, PolicyError> {
        if self.bootstrapped.load(Ordering::Acquire) {
            return Ok(self.mode());
        }
        let schema = provision::build_schema(self.local.table(), self.local.rules());
        match self.remote.provision_schema(&schema).await {
            Ok(()) => {
                debug!("remote policy schema provisioned");
            }
            Err(err) if err.is_unavailable() => {
                self.fall_back("bootstrap");
            }
            Err(err) => return Err(err),
        }
        self.bootstrapped.store(true, Ordering::Release);
        Ok(self.mode())
    }

    /// Liveness: probes the engine in remote mode; a transport failure flips
    /// to local, whose readiness is trivially true.
    pub async fn ready(&self) -> bool {
        match self.mode() {
            EvalMode::Local => true,
            EvalMode::Remote => match self.remote.probe_ready().await {
                Ok(ready) => ready,
                Err(err) if err.is_unavailable() => {
                    self.fall_back("readiness probe");
                    true
                }
                Err(err) => {
                    warn!(error = %err, "engine readiness probe rejected");
                    false
                }
            },
        }
    }

    /// Role-based check. Never raises toward the caller; see `try_check`.
    pub async fn check(&self, actor: &Actor, action: Action, resource: ResourceType) -> bool {
        self.try_check(actor, action, resource).await.unwrap_or(false)
    }

    pub async fn try_check(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
    ) -> Result<bool, AuthzError> {
        if self.mode() == EvalMode::Remote {
            match self
                .remote
                .check_basic(actor, action, resource, &actor.tenant)
                .await
            {
                Ok(allow) => {
                    self.record(actor, action, resource.as_str(), allow, DecisionReason::RemoteDecision);
                    return Ok(allow);
                }
                Err(err) if err.is_unavailable() => self.fall_back("check"),
                Err(err) => {
                    self.record(
                        actor,
                        action,
                        resource.as_str(),
                        false,
                        DecisionReason::RemoteRejected {
                            message: err.to_string(),
                        },
                    );
                    return Ok(false);
                }
            }
        }
        let (allow, reason) = self.local.check_basic(actor, action, resource);
        self.record(actor, action, resource.as_str(), allow, reason);
        Ok(allow)
    }

    /// Instance check. Never raises toward the caller; see
    /// `try_check_resource`.
    pub async fn check_resource(
        &self,
        actor: &Actor,
        action: Action,
        resource: &ResourceRef,
    ) -> bool {
        self.try_check_resource(actor, action, resource)
            .await
            .unwrap_or(false)
    }

    pub async fn try_check_resource(
        &self,
        actor: &Actor,
        action: Action,
        resource: &ResourceRef,
    ) -> Result<bool, AuthzError> {
        let resource_key = resource.resource_type.as_str();
        if self.mode() == EvalMode::Remote {
            match self
                .remote
                .check_resource(actor, action, resource, &actor.tenant)
                .await
            {
                Ok(allow) => {
                    self.record(actor, action, resource_key, allow, DecisionReason::RemoteDecision);
                    return Ok(allow);
                }
                Err(err) if err.is_unavailable() => self.fall_back("resource check"),
                Err(err) => {
                    self.record(
                        actor,
                        action,
                        resource_key,
                        false,
                        DecisionReason::RemoteRejected {
                            message: err.to_string(),
                        },
                    );
                    return Ok(false);
                }
            }
        }
        match self.local.check_resource(actor, action, resource) {
            Ok((allow, reason)) => {
                self.record(actor, action, resource_key, allow, reason);
                Ok(allow)
            }
            Err(err) => {
                self.record(
                    actor,
                    action,
                    resource_key,
                    false,
                    DecisionReason::EvaluationFailed {
                        message: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    /// Pushes the actor's identity and role assignments to the engine. Not a
    /// security decision: failures are returned to the caller but should be
    /// treated as non-fatal upstream.
    pub async fn sync_actor(&self, actor: &Actor) -> Result<(), PolicyError> {
        if self.mode() == EvalMode::Local {
            return Ok(());
        }
        match self.remote.sync_actor(actor).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_unavailable() => {
                self.fall_back("actor sync");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn record(
        &self,
        actor: &Actor,
        action: Action,
        resource: &str,
        allowed: bool,
        reason: DecisionReason,
    ) {
        debug!(
            user = %actor.id,
            %action,
            resource,
            allowed,
            %reason,
            "authorization decision"
        );
        self.log
            .record(Decision::new(&actor.id, action, resource, allowed, reason));
    }
}
