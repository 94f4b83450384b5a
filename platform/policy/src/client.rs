use std::time::Duration;

use entity::{Action, Actor, Attributes, ResourceRef, ResourceType};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::RemotePolicy;
use crate::error::PolicyError;
use crate::schema::SchemaDefinition;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TENANT: &str = "default";

/// Connection settings for the engine, or for the relay proxy fronting it.
#[derive(Clone, Debug)]
pub struct PolicySettings {
    pub base_url: String,
    pub api_token: String,
    pub project: String,
    pub environment: String,
    /// Bounds every remote call, and with it how long a guard can stay in
    /// its loading state.
    pub timeout: Duration,
}

impl PolicySettings {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        project: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            project: project.into(),
            environment: environment.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the remote policy engine.
#[derive(Clone, Debug)]
pub struct PolicyClient {
    http: reqwest::Client,
    settings: PolicySettings,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    user: &'a str,
    action: &'a str,
    resource: &'a str,
    tenant: &'a str,
    context: CheckContext<'a>,
}

#[derive(Debug, Serialize)]
struct CheckContext<'a> {
    user: UserContext<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<&'a Attributes>,
}

#[derive(Debug, Serialize)]
struct UserContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<&'a str>,
    roles: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allow: bool,
}

#[derive(Debug, Serialize)]
struct UserUpsert<'a> {
    key: &'a str,
    name: &'a str,
    email: &'a str,
    attributes: UserAttributes<'a>,
}

#[derive(Debug, Serialize)]
struct UserAttributes<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<&'a str>,
    tenant: &'a str,
}

#[derive(Debug, Serialize)]
struct RoleAssignment<'a> {
    user: &'a str,
    role: &'a str,
    tenant: &'a str,
}

#[derive(Debug, Serialize)]
struct KeyedCreate<'a> {
    key: &'a str,
    name: &'a str,
    description: &'a str,
}

impl PolicyClient {
    pub fn new(settings: PolicySettings) -> Result<Self, PolicyError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| PolicyError::Unavailable(err.to_string()))?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn env_url(&self, path: &str) -> String {
        self.url(&format!(
            "/{}/env/{}{path}",
            self.settings.project, self.settings.environment
        ))
    }

    async fn get(&self, url: String) -> Result<Response, PolicyError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await?)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: String,
        body: &T,
    ) -> Result<Response, PolicyError> {
        Ok(self
            .http
            .post(url)
            .bearer_auth(&self.settings.api_token)
            .json(body)
            .send()
            .await?)
    }

    /// Classify a non-2xx response: a structured payload is a rejection, an
    /// empty or unparseable body means the engine cannot be trusted.
    async fn error_from(response: Response) -> PolicyError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => {
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or(body);
                PolicyError::Rejected { status, message }
            }
            Err(_) => PolicyError::Unavailable(format!(
                "engine returned {status} without a structured payload"
            )),
        }
    }

    async fn check(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
        attributes: Option<&Attributes>,
        tenant: &str,
    ) -> Result<bool, PolicyError> {
        let request = CheckRequest {
            user: &actor.id,
            action: action.as_str(),
            resource: resource.as_str(),
            tenant,
            context: CheckContext {
                user: UserContext {
                    department: actor.department.as_deref(),
                    roles: actor.roles.iter().map(|role| role.as_str()).collect(),
                },
                resource: attributes,
            },
        };
        let response = self.post(self.url("/policy/check"), &request).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let payload: CheckResponse = response.json().await?;
        debug!(
            user = %actor.id,
            %action,
            %resource,
            allow = payload.allow,
            "remote policy check"
        );
        Ok(payload.allow)
    }

    /// GET-then-POST create-if-absent. A 404 probe means absent; a conflict
    /// on create means someone else got there first, which is fine. A
    /// structured rejection is logged and skipped so one bad item cannot
    /// abort the whole bootstrap; transport failures propagate.
    async fn ensure_item<T: Serialize>(
        &self,
        probe_url: String,
        create_url: String,
        body: &T,
        label: &str,
    ) -> Result<(), PolicyError> {
        let response = self.get(probe_url).await?;
        if response.status().is_success() {
            debug!(item = label, "already provisioned");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            match Self::error_from(response).await {
                err @ PolicyError::Unavailable(_) => return Err(err),
                err => {
                    warn!(item = label, error = %err, "provisioning probe rejected, skipping");
                    return Ok(());
                }
            }
        }
        self.post_tolerant(create_url, body, label).await
    }

    /// POST that treats success and conflict as provisioned, logs and skips
    /// structured rejections, and propagates transport failures.
    async fn post_tolerant<T: Serialize>(
        &self,
        url: String,
        body: &T,
        label: &str,
    ) -> Result<(), PolicyError> {
        let response = self.post(url, body).await?;
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            debug!(item = label, "provisioned");
            return Ok(());
        }
        match Self::error_from(response).await {
            err @ PolicyError::Unavailable(_) => Err(err),
            err => {
                warn!(item = label, error = %err, "provisioning rejected, skipping");
                Ok(())
            }
        }
    }
}

impl RemotePolicy for PolicyClient {
    async fn check_basic(
        &self,
        actor: &Actor,
        action: Action,
        resource: ResourceType,
        tenant: &str,
    ) -> Result<bool, PolicyError> {
        self.check(actor, action, resource, None, tenant).await
    }

    async fn check_resource(
        &self,
        actor: &Actor,
        action: Action,
        resource: &ResourceRef,
        tenant: &str,
    ) -> Result<bool, PolicyError> {
        self.check(
            actor,
            action,
            resource.resource_type,
            Some(&resource.attributes),
            tenant,
        )
        .await
    }

    /// Upserts the actor, then assigns each role within the actor's tenant.
    /// Role assignments fail independently: one rejection is logged and the
    /// remaining roles are still assigned.
    async fn sync_actor(&self, actor: &Actor) -> Result<(), PolicyError> {
        let upsert = UserUpsert {
            key: &actor.id,
            name: &actor.display_name,
            email: &actor.email,
            attributes: UserAttributes {
                department: actor.department.as_deref(),
                tenant: &actor.tenant,
            },
        };
        let response = self.post(self.env_url("/users"), &upsert).await?;
        if !response.status().is_success() && response.status() != StatusCode::CONFLICT {
            return Err(Self::error_from(response).await);
        }

        let tenant = if actor.tenant.is_empty() {
            DEFAULT_TENANT
        } else {
            &actor.tenant
        };
        for role in &actor.roles {
            let assignment = RoleAssignment {
                user: &actor.id,
                role: role.as_str(),
                tenant,
            };
            match self
                .post(self.env_url("/user_role_assignments"), &assignment)
                .await
            {
                Ok(response)
                    if response.status().is_success()
                        || response.status() == StatusCode::CONFLICT => {}
                Ok(response) => {
                    let err = Self::error_from(response).await;
                    warn!(user = %actor.id, %role, error = %err, "role assignment skipped");
                }
                Err(err) => {
                    warn!(user = %actor.id, %role, error = %err, "role assignment skipped");
                }
            }
        }
        Ok(())
    }

    /// Lightweight read against the engine's configuration endpoint.
    async fn probe_ready(&self) -> Result<bool, PolicyError> {
        let response = self.get(self.env_url("/config")).await?;
        if response.status().is_success() {
            Ok(true)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Idempotently installs the project, environment, resource types,
    /// roles, permission grants, and attribute rules.
    async fn provision_schema(&self, schema: &SchemaDefinition) -> Result<(), PolicyError> {
        let project = KeyedCreate {
            key: &self.settings.project,
            name: "MedSecure Healthcare System",
            description: "Hospital management system with strong authorization controls",
        };
        self.ensure_item(
            self.url(&format!("/{}", self.settings.project)),
            self.url("/projects"),
            &project,
            "project",
        )
        .await?;

        let environment = KeyedCreate {
            key: &self.settings.environment,
            name: "Environment",
            description: "Policy environment",
        };
        self.ensure_item(
            self.url(&format!(
                "/{}/env/{}",
                self.settings.project, self.settings.environment
            )),
            self.url(&format!("/{}/environments", self.settings.project)),
            &environment,
            "environment",
        )
        .await?;

        for resource in &schema.resources {
            self.ensure_item(
                self.env_url(&format!("/resources/{}", resource.key)),
                self.env_url("/resources"),
                resource,
                &format!("resource {}", resource.key),
            )
            .await?;
        }

        for role in &schema.roles {
            self.ensure_item(
                self.env_url(&format!("/roles/{}", role.key)),
                self.env_url("/roles"),
                role,
                &format!("role {}", role.key),
            )
            .await?;
        }

        for grant in &schema.grants {
            self.post_tolerant(
                self.env_url("/role_assignments"),
                grant,
                &format!("grant {}:{}:{}", grant.role, grant.resource, grant.action),
            )
            .await?;
        }

        for rule in &schema.rules {
            self.post_tolerant(
                self.env_url("/policy_rules"),
                rule,
                &format!("policy rule {}", rule.key),
            )
            .await?;
        }

        Ok(())
    }
}
