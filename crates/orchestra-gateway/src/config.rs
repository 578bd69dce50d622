//! Layered gateway configuration: defaults → YAML file → environment →
//! CLI flags (§10 "Configuration"), following the same
//! `load(path, cli)` layering pattern used elsewhere in this codebase
//! for service configuration, backed by the `config` crate for the
//! env/file merge.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Cli;

/// Environment variables the core recognizes (§6 "Environment recognized
/// by the core").
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_ROUTING_STRATEGY: &str = "LLM_ROUTING_STRATEGY";
pub const ENV_PROVIDER_WEIGHTS: &str = "PROVIDER_WEIGHTS";
pub const ENV_DEFAULT_PROVIDER: &str = "DEFAULT_LLM_PROVIDER";
pub const ENV_SERVICE_SECRET: &str = "INTERNAL_SERVICE_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to a directory of workflow definition YAML files, loaded at
    /// startup and registered by `metadata.name`.
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: String,

    /// Path to a YAML file of statically-defined policies, used when
    /// `DATABASE_URL` is unset (§6).
    #[serde(default = "default_policies_file")]
    pub policies_file: String,

    /// Background policy reload interval (§4.1 "Reload").
    #[serde(default = "default_reload_interval_secs")]
    pub policy_reload_interval_secs: u64,

    /// Routing strategy, overridden by `LLM_ROUTING_STRATEGY`.
    #[serde(default = "default_routing_strategy")]
    pub routing_strategy: String,

    /// `name:pct` provider weight list, overridden by `PROVIDER_WEIGHTS`.
    #[serde(default)]
    pub provider_weights: Option<String>,

    /// Failover default provider, overridden by `DEFAULT_LLM_PROVIDER`.
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Backend URL an `HttpResponseProvider` forwards generative calls
    /// to, when no in-process provider is configured.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            workflows_dir: default_workflows_dir(),
            policies_file: default_policies_file(),
            policy_reload_interval_secs: default_reload_interval_secs(),
            routing_strategy: default_routing_strategy(),
            provider_weights: None,
            default_provider: None,
            backend_url: default_backend_url(),
        }
    }
}

impl GatewaySettings {
    /// Load defaults, then a YAML file (if present), then environment
    /// variables, then CLI overrides — in that precedence order.
    pub fn load(path: &str, cli: &Cli) -> anyhow::Result<Self> {
        let defaults = GatewaySettings::default();
        let mut builder = config::Config::builder()
            .set_default("listen", defaults.listen.clone())?
            .set_default("port", defaults.port as i64)?
            .set_default("workflows_dir", defaults.workflows_dir.clone())?
            .set_default("policies_file", defaults.policies_file.clone())?
            .set_default("policy_reload_interval_secs", defaults.policy_reload_interval_secs as i64)?
            .set_default("routing_strategy", defaults.routing_strategy.clone())?
            .set_default("backend_url", defaults.backend_url.clone())?;

        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ORCHESTRA")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: GatewaySettings = builder.build()?.try_deserialize()?;

        if let Ok(strategy) = std::env::var(ENV_ROUTING_STRATEGY) {
            settings.routing_strategy = strategy;
        }
        if let Ok(weights) = std::env::var(ENV_PROVIDER_WEIGHTS) {
            settings.provider_weights = Some(weights);
        }
        if let Ok(default_provider) = std::env::var(ENV_DEFAULT_PROVIDER) {
            settings.default_provider = Some(default_provider);
        }

        if let Some(listen) = &cli.listen {
            settings.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            settings.port = port;
        }
        if let Some(backend) = &cli.backend {
            settings.backend_url = backend.clone();
        }
        if let Some(workflows_dir) = &cli.workflows {
            settings.workflows_dir = workflows_dir.clone();
        }

        Ok(settings)
    }

    /// `PROVIDER_WEIGHTS`-style `name:pct` list, normalized to sum 1.0.
    pub fn parsed_provider_weights(&self) -> Option<Vec<(String, f64)>> {
        let raw = self.provider_weights.as_ref()?;
        let mut parsed = Vec::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, pct) = entry.split_once(':')?;
            let pct: f64 = pct.trim().parse().ok()?;
            parsed.push((name.trim().to_string(), pct));
        }
        let total: f64 = parsed.iter().map(|(_, w)| w).sum();
        if total > 0.0 {
            for (_, w) in parsed.iter_mut() {
                *w /= total;
            }
        }
        Some(parsed)
    }
}

/// One-shot warning when `INTERNAL_SERVICE_SECRET` is absent or too
/// short (§6). Service-to-service auth is optional but degraded without
/// a sufficiently long secret.
pub fn check_service_secret() -> Option<String> {
    match std::env::var(ENV_SERVICE_SECRET) {
        Ok(secret) if secret.len() >= 32 => None,
        Ok(_) => Some(format!(
            "{ENV_SERVICE_SECRET} is set but shorter than 32 characters; service-to-service auth is weakened"
        )),
        Err(_) => Some(format!(
            "{ENV_SERVICE_SECRET} is not set; service-to-service auth is disabled"
        )),
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workflows_dir() -> String {
    "./workflows".to_string()
}

fn default_policies_file() -> String {
    "./policies.yaml".to_string()
}

fn default_reload_interval_secs() -> u64 {
    30
}

fn default_routing_strategy() -> String {
    "weighted".to_string()
}

fn default_backend_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_weights_normalize_to_one() {
        let settings = GatewaySettings {
            provider_weights: Some("a:60,b:40".to_string()),
            ..Default::default()
        };
        let parsed = settings.parsed_provider_weights().unwrap();
        let total: f64 = parsed.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 0.01);
    }

    #[test]
    fn missing_service_secret_warns() {
        std::env::remove_var(ENV_SERVICE_SECRET);
        assert!(check_service_secret().is_some());
    }
}
