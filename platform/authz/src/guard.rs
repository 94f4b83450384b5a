//! Declarative permission gate for presentation code: resolve an
//! asynchronous check into an observable allowed/denied/loading/error state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use entity::{Action, Actor, Attributes, ResourceRef, ResourceType};
use platform_policy::RemotePolicy;
use tokio::sync::watch;

use crate::facade::Authz;

/// What the gate is currently showing.
#[derive(Clone, Debug, PartialEq)]
pub enum GuardState {
    Checking,
    Allowed,
    Denied,
    Error(String),
}

impl GuardState {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardState::Allowed)
    }
}

/// One evaluation request. A present attribute bag turns the check into an
/// instance check against `resource` enriched with those attributes.
#[derive(Clone, Debug)]
pub struct GuardInput {
    pub action: Action,
    pub resource: ResourceType,
    pub attributes: Option<Attributes>,
    /// Publish the intermediate `Checking` state while the check runs.
    pub show_loading: bool,
    /// Surface evaluation failures as `Error` instead of a silent deny.
    pub error_on_failure: bool,
}

impl GuardInput {
    pub fn new(action: Action, resource: ResourceType) -> Self {
        Self {
            action,
            resource,
            attributes: None,
            show_loading: true,
            error_on_failure: false,
        }
    }

    pub fn with_instance(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn without_loading(mut self) -> Self {
        self.show_loading = false;
        self
    }

    pub fn surface_errors(mut self) -> Self {
        self.error_on_failure = true;
        self
    }
}

/// Re-entrant asynchronous gate. Evaluations are independent; when inputs
/// change mid-flight, the stale completion is discarded so the published
/// state always reflects the most recent call.
pub struct PermissionGuard<C> {
    authz: Arc<Authz<C>>,
    state: watch::Sender<GuardState>,
    generation: AtomicU64,
}

impl<C: RemotePolicy> PermissionGuard<C> {
    pub fn new(authz: Arc<Authz<C>>) -> Self {
        let (state, _) = watch::channel(GuardState::Checking);
        Self {
            authz,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    /// Run one evaluation. Returns the state this evaluation resolved to;
    /// the observable state is only updated when no newer evaluation has
    /// started in the meantime.
    pub async fn evaluate(&self, actor: Option<&Actor>, input: &GuardInput) -> GuardState {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        // Nobody signed in: nothing to authorize, deny without a check.
        let Some(actor) = actor else {
            return self.publish(generation, GuardState::Denied);
        };

        if input.show_loading {
            self.publish(generation, GuardState::Checking);
        }

        let outcome = match &input.attributes {
            Some(attributes) => {
                let resource = ResourceRef {
                    resource_type: input.resource,
                    attributes: attributes.clone(),
                };
                self.authz
                    .try_check_resource(actor, input.action, &resource)
                    .await
            }
            None => self.authz.try_check(actor, input.action, input.resource).await,
        };

        let state = match outcome {
            Ok(true) => GuardState::Allowed,
            Ok(false) => GuardState::Denied,
            Err(err) if input.error_on_failure => GuardState::Error(err.to_string()),
            Err(_) => GuardState::Denied,
        };
        self.publish(generation, state)
    }

    fn publish(&self, generation: u64, state: GuardState) -> GuardState {
        if self.generation.load(Ordering::Acquire) == generation {
            self.state.send_replace(state.clone());
        }
        state
    }
}
