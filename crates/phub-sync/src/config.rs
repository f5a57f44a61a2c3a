//! Environment + `platforms.yaml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use phub_adapters::{AdapterEndpoints, AdapterRegistry};
use phub_core::PlatformId;
use phub_storage::{BackoffPolicy, HttpClientConfig};
use serde::Deserialize;
use tracing::warn;

pub const PLATFORMS_FILE: &str = "platforms.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// `None` keeps questions in process memory only.
    pub database_url: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub http_max_retries: usize,
    pub scheduler_enabled: bool,
    pub sweep_cron: String,
    pub workspace_root: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            database_url: non_empty("DATABASE_URL"),
            browserless_url: non_empty("BROWSERLESS_URL"),
            browserless_token: non_empty("BROWSERLESS_TOKEN"),
            user_agent: non_empty("PHUB_USER_AGENT").unwrap_or_else(|| "phub-bot/0.1".to_string()),
            http_timeout_secs: non_empty("PHUB_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            http_max_retries: non_empty("PHUB_HTTP_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            scheduler_enabled: non_empty("PHUB_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            sweep_cron: non_empty("PHUB_SWEEP_CRON").unwrap_or_else(|| "0 0 2 * * *".to_string()),
            workspace_root: non_empty("PHUB_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.http_timeout(),
            user_agent: Some(self.user_agent.clone()),
            backoff: BackoffPolicy {
                max_retries: self.http_max_retries,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlatformRegistryFile {
    pub platforms: Vec<PlatformConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub platform_id: PlatformId,
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl PlatformRegistryFile {
    /// `Ok(None)` when the workspace has no `platforms.yaml`.
    pub fn load(workspace_root: &Path) -> Result<Option<Self>> {
        let path = workspace_root.join(PLATFORMS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(parsed))
    }
}

/// Adapters for every built-in platform plus the ordered sweep list.
pub fn build_registry(file: Option<&PlatformRegistryFile>) -> (AdapterRegistry, Vec<PlatformId>) {
    let mut endpoints = AdapterEndpoints::default();
    if let Some(file) = file {
        for platform in &file.platforms {
            let Some(endpoint) = platform.endpoint.clone() else {
                continue;
            };
            match platform.platform_id.as_str() {
                "leetcode" => endpoints.leetcode_graphql = endpoint,
                "codeforces" => endpoints.codeforces_api = endpoint,
                "gfg" => endpoints.gfg_listing = endpoint,
                other => warn!(platform = other, "endpoint override for unknown platform ignored"),
            }
        }
    }

    let registry = AdapterRegistry::with_defaults(&endpoints);
    let sweep = match file {
        None => registry.platform_ids(),
        Some(file) => file
            .platforms
            .iter()
            .filter(|p| p.enabled)
            .filter_map(|p| {
                if registry.get(&p.platform_id).is_some() {
                    Some(p.platform_id.clone())
                } else {
                    warn!(platform = %p.platform_id, "enabled platform has no adapter; skipping");
                    None
                }
            })
            .collect(),
    };
    (registry, sweep)
}
