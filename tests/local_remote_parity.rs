//! The parity invariant: for the same (actor, action, resource) inputs, the
//! remote engine (here the stub, answering from the shared table) and the
//! local fallback produce identical allow/deny outcomes.

use std::sync::Arc;
use std::time::Duration;

use entity::{Action, ResourceType, Role};
use medsecure_tests::{actor_with, dead_engine_url, spawn_stub_engine};
use platform_authz::{Authz, DecisionLog, EvalMode, LocalEvaluator};
use platform_policy::{PolicyClient, PolicySettings};

fn authz_for(base_url: &str) -> Authz<PolicyClient> {
    let settings = PolicySettings::new(base_url, "test-token", "medsecure", "dev")
        .with_timeout(Duration::from_millis(500));
    Authz::new(
        PolicyClient::new(settings).expect("client"),
        LocalEvaluator::hospital_defaults(),
        Arc::new(DecisionLog::default()),
    )
}

const CASES: &[(Role, Action, ResourceType, bool)] = &[
    (Role::Doctor, Action::View, ResourceType::Patient, true),
    (Role::Doctor, Action::Delete, ResourceType::Patient, false),
    (Role::Nurse, Action::View, ResourceType::Billing, false),
    (Role::Patient, Action::Edit, ResourceType::Patient, false),
    (
        Role::Receptionist,
        Action::View,
        ResourceType::MedicalRecord,
        false,
    ),
    (
        Role::LabTechnician,
        Action::Approve,
        ResourceType::LabResult,
        false,
    ),
    (Role::BillingStaff, Action::Approve, ResourceType::Billing, true),
    (Role::Admin, Action::Manage, ResourceType::System, true),
];

#[tokio::test]
async fn basic_checks_agree_in_both_modes() {
    let engine = spawn_stub_engine().await;
    let remote = authz_for(&engine.base_url);
    remote.initialize().await.expect("remote bootstrap");
    assert_eq!(remote.mode(), EvalMode::Remote);

    let local = authz_for(&dead_engine_url());
    local.initialize().await.expect("local bootstrap");
    assert_eq!(local.mode(), EvalMode::Local);

    for &(role, action, resource, expected) in CASES {
        let actor = actor_with(role, "parity-actor", Some("Cardiology"));
        let via_remote = remote.check(&actor, action, resource).await;
        let via_local = local.check(&actor, action, resource).await;
        assert_eq!(
            via_remote, expected,
            "remote verdict for {role} {action} {resource}"
        );
        assert_eq!(
            via_local, expected,
            "local verdict for {role} {action} {resource}"
        );
    }
    assert_eq!(remote.mode(), EvalMode::Remote);
}

#[tokio::test]
async fn roleless_actors_are_denied_in_both_modes() {
    let engine = spawn_stub_engine().await;
    let remote = authz_for(&engine.base_url);
    let local = authz_for(&dead_engine_url());
    local.initialize().await.expect("local bootstrap");

    let mut ghost = actor_with(Role::Patient, "ghost", None);
    ghost.roles.clear();

    assert!(!remote.check(&ghost, Action::View, ResourceType::Patient).await);
    assert!(!local.check(&ghost, Action::View, ResourceType::Patient).await);
}
