use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_policy::PolicySettings;

/// Process configuration, environment-supplied at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub policy_api_url: String,
    pub policy_api_token: String,
    pub policy_project: String,
    pub policy_environment: String,
    pub proxy_enabled: bool,
    pub proxy_url: String,
    pub policy_timeout: Duration,
    pub default_tenant: String,
    pub audit_capacity: usize,
    pub cookie_key: Key,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let policy_api_url =
            std::env::var("POLICY_API_URL").unwrap_or_else(|_| "https://api.permit.io/v2".into());
        let policy_api_token =
            std::env::var("POLICY_API_TOKEN").context("POLICY_API_TOKEN missing")?;
        let policy_project =
            std::env::var("POLICY_PROJECT").unwrap_or_else(|_| "medsecure".into());
        let policy_environment =
            std::env::var("POLICY_ENVIRONMENT").unwrap_or_else(|_| "dev".into());

        let proxy_enabled = std::env::var("POLICY_PROXY_ENABLED")
            .ok()
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let proxy_url = std::env::var("POLICY_PROXY_URL")
            .unwrap_or_else(|_| "http://localhost:3001/api/policy".into());

        let policy_timeout = std::env::var("POLICY_TIMEOUT_SECS")
            .ok()
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|_| anyhow!("POLICY_TIMEOUT_SECS must be an integer"))?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let default_tenant =
            std::env::var("DEFAULT_TENANT").unwrap_or_else(|_| "default".into());

        let audit_capacity = std::env::var("AUDIT_LOG_CAPACITY")
            .ok()
            .map(|raw| raw.parse::<usize>())
            .transpose()
            .map_err(|_| anyhow!("AUDIT_LOG_CAPACITY must be an integer"))?
            .unwrap_or(platform_authz::audit::DEFAULT_CAPACITY);

        let cookie_secret =
            std::env::var("COOKIE_SECRET_BASE64").context("COOKIE_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(cookie_secret.trim())
            .context("invalid COOKIE_SECRET_BASE64")?;
        if secret_bytes.len() < 32 {
            return Err(anyhow!(
                "COOKIE_SECRET_BASE64 must decode to at least 32 bytes"
            ));
        }
        let cookie_key = Key::derive_from(&secret_bytes);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            policy_api_url,
            policy_api_token,
            policy_project,
            policy_environment,
            proxy_enabled,
            proxy_url,
            policy_timeout,
            default_tenant,
            audit_capacity,
            cookie_key,
            cors_allowed_origins,
        })
    }

    /// Base URL the client actually talks to: the relay proxy when enabled
    /// (the bearer token is injected server-side there), the engine
    /// otherwise.
    pub fn effective_policy_url(&self) -> &str {
        if self.proxy_enabled {
            &self.proxy_url
        } else {
            &self.policy_api_url
        }
    }

    pub fn policy_settings(&self) -> PolicySettings {
        PolicySettings::new(
            self.effective_policy_url(),
            &self.policy_api_token,
            &self.policy_project,
            &self.policy_environment,
        )
        .with_timeout(self.policy_timeout)
    }
}
