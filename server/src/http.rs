use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use entity::{Action, Actor, Decision, ResourceRef, ResourceType};
use platform_authz::{Authz, EvalMode};
use platform_policy::PolicyClient;
use serde::{Deserialize, Serialize};
use time::Duration as TimeDuration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::AppConfig, directory::UserDirectory};

/// Fixed key the serialized actor record lives under between requests.
const SESSION_COOKIE: &str = "__Host-ms_session";

#[derive(Clone)]
pub struct AppState {
    pub authz: Arc<Authz<PolicyClient>>,
    pub directory: Arc<UserDirectory>,
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "medsecure server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/session", get(session_handler))
        .route("/authz/check", post(check_handler))
        .route("/authz/check_resource", post(check_resource_handler))
        .route("/audit", get(audit_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct CheckBody {
    action: Action,
    resource: ResourceType,
}

#[derive(Deserialize)]
struct ResourceCheckBody {
    action: Action,
    resource: ResourceRef,
}

#[derive(Serialize)]
struct CheckReply {
    allow: bool,
}

async fn login_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(request): Json<LoginRequest>,
) -> HttpResult<(PrivateCookieJar, Json<Actor>)> {
    let actor = state
        .directory
        .authenticate(&request.email, &request.password)
        .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "invalid email or password"))?;

    // Identity sync is not a security decision; a failure must not block the
    // login itself.
    if let Err(err) = state.authz.sync_actor(&actor).await {
        warn!(user = %actor.id, error = %err, "actor sync failed, continuing");
    }

    let serialized = serde_json::to_string(&actor)
        .map_err(|err| HttpError::internal(err.into()))?;
    let cookie = Cookie::build((SESSION_COOKIE, serialized))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::days(1))
        .build();
    Ok((jar.add(cookie), Json(actor)))
}

async fn logout_handler(jar: PrivateCookieJar) -> (PrivateCookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (jar, StatusCode::NO_CONTENT)
}

async fn session_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<Json<Actor>> {
    let actor = session_actor(&jar)
        .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "no active session"))?;
    if let Err(err) = state.authz.sync_actor(&actor).await {
        warn!(user = %actor.id, error = %err, "actor sync failed, continuing");
    }
    Ok(Json(actor))
}

async fn check_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<CheckBody>,
) -> Json<CheckReply> {
    // No actor means there is nothing to authorize: deny without a check.
    let Some(actor) = session_actor(&jar) else {
        return Json(CheckReply { allow: false });
    };
    let allow = state.authz.check(&actor, body.action, body.resource).await;
    Json(CheckReply { allow })
}

async fn check_resource_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<ResourceCheckBody>,
) -> Json<CheckReply> {
    let Some(actor) = session_actor(&jar) else {
        return Json(CheckReply { allow: false });
    };
    let allow = state
        .authz
        .check_resource(&actor, body.action, &body.resource)
        .await;
    Json(CheckReply { allow })
}

async fn audit_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<Json<Vec<Decision>>> {
    let actor = session_actor(&jar)
        .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "no active session"))?;
    if !state
        .authz
        .check(&actor, Action::View, ResourceType::System)
        .await
    {
        return Err(HttpError::new(
            StatusCode::FORBIDDEN,
            "not authorized for the audit log",
        ));
    }
    Ok(Json(state.authz.decision_log().snapshot()))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        mode: state.authz.mode(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    mode: EvalMode,
    version: &'static str,
}

fn session_actor(jar: &PrivateCookieJar) -> Option<Actor> {
    let cookie = jar.get(SESSION_COOKIE)?;
    serde_json::from_str(cookie.value()).ok()
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use platform_authz::{DecisionLog, LocalEvaluator};
    use platform_policy::PolicySettings;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::util::ServiceExt;

    /// A free port nothing listens on, so every engine call is a transport
    /// failure and the facade exercises its local fallback.
    fn dead_engine_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn test_state() -> AppState {
        let settings = PolicySettings::new(dead_engine_url(), "test-token", "medsecure", "dev")
            .with_timeout(Duration::from_millis(500));
        let client = PolicyClient::new(settings).unwrap();
        let authz = Arc::new(Authz::new(
            client,
            LocalEvaluator::hospital_defaults(),
            Arc::new(DecisionLog::default()),
        ));
        let config = AppConfig {
            policy_api_url: "unused".into(),
            policy_api_token: "unused".into(),
            policy_project: "medsecure".into(),
            policy_environment: "dev".into(),
            proxy_enabled: false,
            proxy_url: "unused".into(),
            policy_timeout: Duration::from_millis(500),
            default_tenant: "hospital_central".into(),
            audit_capacity: 100,
            cookie_key: Key::generate(),
            cors_allowed_origins: vec!["http://localhost:5173".into()],
        };
        AppState {
            authz,
            directory: Arc::new(UserDirectory::with_sample_users("hospital_central")),
            cookie_key: config.cookie_key.clone(),
            config: Arc::new(config),
        }
    }

    async fn login(router: &Router, email: &str, password: &str) -> String {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"email": email, "password": password}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn login_then_check_resolves_locally() {
        let router = build_router(test_state());
        let cookie = login(&router, "dr.smith@medsecure.example", "doctor123").await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authz/check")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, cookie)
                    .body(Body::from(
                        json!({"action": "view", "resource": "patient"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"allow": true}));
    }

    #[tokio::test]
    async fn missing_session_denies_without_checking() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authz/check")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"action": "view", "resource": "patient"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"allow": false}));
    }

    #[tokio::test]
    async fn resource_check_applies_attribute_rules() {
        let router = build_router(test_state());
        let cookie = login(&router, "patient.doe@medsecure.example", "patient123").await;

        let own = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authz/check_resource")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, cookie.clone())
                    .body(Body::from(
                        json!({
                            "action": "view",
                            "resource": {"type": "billing", "patientId": "pt-001"}
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(own).await, json!({"allow": true}));

        let foreign = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authz/check_resource")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, cookie)
                    .body(Body::from(
                        json!({
                            "action": "view",
                            "resource": {"type": "billing", "patientId": "pt-002"}
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(foreign).await, json!({"allow": false}));
    }

    #[tokio::test]
    async fn audit_log_is_admin_only() {
        let router = build_router(test_state());

        let doctor_cookie = login(&router, "dr.smith@medsecure.example", "doctor123").await;
        let denied = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/audit")
                    .header(header::COOKIE, doctor_cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let admin_cookie = login(&router, "admin@medsecure.example", "admin123").await;
        let allowed = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/audit")
                    .header(header::COOKIE, admin_cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        let entries = body_json(allowed).await;
        assert!(entries.as_array().is_some_and(|list| !list.is_empty()));
    }

    #[tokio::test]
    async fn health_reports_mode_transition() {
        let state = test_state();
        let authz = state.authz.clone();
        let router = build_router(state);

        let before = body_json(
            router
                .clone()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(before["mode"], json!("remote"));

        // Logging in syncs against the dead engine, which downgrades the
        // facade; the follow-up check keeps answering locally.
        let cookie = login(&router, "dr.smith@medsecure.example", "doctor123").await;
        router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authz/check")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, cookie)
                    .body(Body::from(
                        json!({"action": "view", "resource": "patient"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(authz.mode(), EvalMode::Local);

        let after = body_json(
            router
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(after["mode"], json!("local"));
    }
}
