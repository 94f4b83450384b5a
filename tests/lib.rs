//! Shared helpers for the integration tests: an in-process stub of the
//! remote policy engine. Its checks are answered by the same shared
//! evaluator the local fallback uses, which is exactly the local/remote
//! consistency the provisioning schema promises.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use entity::{Action, Actor, Attributes, ResourceRef, ResourceType, Role};
use platform_authz::LocalEvaluator;
use serde::Deserialize;
use serde_json::{Value, json};

/// Traffic counters, for idempotence assertions.
#[derive(Default)]
pub struct EngineHits {
    pub checks: AtomicUsize,
    pub creates: AtomicUsize,
}

impl EngineHits {
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

struct StubState {
    evaluator: LocalEvaluator,
    hits: Arc<EngineHits>,
    provisioned: Mutex<HashSet<String>>,
}

pub struct StubEngine {
    pub base_url: String,
    pub hits: Arc<EngineHits>,
}

/// Bind an ephemeral port, then drop the listener: a URL nothing answers
/// on, so every call is a transport failure.
pub fn dead_engine_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub async fn spawn_stub_engine() -> StubEngine {
    let hits = Arc::new(EngineHits::default());
    let state = Arc::new(StubState {
        evaluator: LocalEvaluator::hospital_defaults(),
        hits: hits.clone(),
        provisioned: Mutex::new(HashSet::new()),
    });

    let router = Router::new()
        .route("/policy/check", post(check_handler))
        .route("/projects", post(create_project))
        .route("/{project}", get(probe_project))
        .route("/{project}/environments", post(create_environment))
        .route("/{project}/env/{env}", get(probe_environment))
        .route("/{project}/env/{env}/config", get(config_handler))
        .route("/{project}/env/{env}/resources", post(create_resource))
        .route("/{project}/env/{env}/resources/{key}", get(probe_resource))
        .route("/{project}/env/{env}/roles", post(create_role))
        .route("/{project}/env/{env}/roles/{key}", get(probe_role))
        .route("/{project}/env/{env}/role_assignments", post(create_grant))
        .route("/{project}/env/{env}/policy_rules", post(create_rule))
        .route("/{project}/env/{env}/users", post(create_user))
        .route(
            "/{project}/env/{env}/user_role_assignments",
            post(create_grant),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub engine");
    let addr = listener.local_addr().expect("stub engine addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub engine");
    });

    StubEngine {
        base_url: format!("http://{addr}"),
        hits,
    }
}

#[derive(Deserialize)]
struct CheckBody {
    user: String,
    action: String,
    resource: String,
    #[serde(default)]
    tenant: String,
    #[serde(default)]
    context: CheckContext,
}

#[derive(Deserialize, Default)]
struct CheckContext {
    #[serde(default)]
    user: UserContext,
    #[serde(default)]
    resource: Option<Attributes>,
}

#[derive(Deserialize, Default)]
struct UserContext {
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

async fn check_handler(
    State(state): State<Arc<StubState>>,
    Json(body): Json<CheckBody>,
) -> Json<Value> {
    state.hits.checks.fetch_add(1, Ordering::SeqCst);

    let (Some(action), Some(resource_type)) = (
        Action::from_str(&body.action),
        ResourceType::from_str(&body.resource),
    ) else {
        return Json(json!({"allow": false}));
    };
    let actor = Actor {
        id: body.user,
        display_name: String::new(),
        email: String::new(),
        roles: body
            .context
            .user
            .roles
            .iter()
            .filter_map(|role| Role::from_str(role))
            .collect(),
        department: body.context.user.department,
        tenant: body.tenant,
    };

    let allow = match body.context.resource {
        Some(attributes) => {
            let resource = ResourceRef {
                resource_type,
                attributes,
            };
            state
                .evaluator
                .check_resource(&actor, action, &resource)
                .map(|(allow, _)| allow)
                .unwrap_or(false)
        }
        None => state.evaluator.check_basic(&actor, action, resource_type).0,
    };
    Json(json!({"allow": allow}))
}

async fn config_handler() -> Json<Value> {
    Json(json!({"ready": true}))
}

fn probe(state: &StubState, key: String) -> StatusCode {
    let provisioned = state.provisioned.lock().unwrap();
    if provisioned.contains(&key) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

fn create(state: &StubState, key: String) -> (StatusCode, Json<Value>) {
    state.hits.creates.fetch_add(1, Ordering::SeqCst);
    let mut provisioned = state.provisioned.lock().unwrap();
    if provisioned.contains(&key) {
        (StatusCode::CONFLICT, Json(json!({"message": "exists"})))
    } else {
        provisioned.insert(key);
        (StatusCode::CREATED, Json(json!({"ok": true})))
    }
}

fn body_key(body: &Value) -> String {
    body.get("key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn probe_project(
    State(state): State<Arc<StubState>>,
    Path(project): Path<String>,
) -> StatusCode {
    probe(&state, format!("project/{project}"))
}

async fn create_project(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("project/{}", body_key(&body)))
}

async fn probe_environment(
    State(state): State<Arc<StubState>>,
    Path((_, env)): Path<(String, String)>,
) -> StatusCode {
    probe(&state, format!("env/{env}"))
}

async fn create_environment(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("env/{}", body_key(&body)))
}

async fn probe_resource(
    State(state): State<Arc<StubState>>,
    Path((_, _, key)): Path<(String, String, String)>,
) -> StatusCode {
    probe(&state, format!("resource/{key}"))
}

async fn create_resource(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("resource/{}", body_key(&body)))
}

async fn probe_role(
    State(state): State<Arc<StubState>>,
    Path((_, _, key)): Path<(String, String, String)>,
) -> StatusCode {
    probe(&state, format!("role/{key}"))
}

async fn create_role(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("role/{}", body_key(&body)))
}

async fn create_user(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("user/{}", body_key(&body)))
}

async fn create_grant(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("grant/{body}"))
}

async fn create_rule(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    create(&state, format!("rule/{}", body_key(&body)))
}

/// Actor fixtures shared by the scenario tests.
pub fn actor_with(role: Role, id: &str, department: Option<&str>) -> Actor {
    Actor {
        id: id.into(),
        display_name: "Test Actor".into(),
        email: format!("{id}@medsecure.example"),
        roles: vec![role],
        department: department.map(Into::into),
        tenant: "hospital_central".into(),
    }
}
