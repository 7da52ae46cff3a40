use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::cache::CachePolicy;
use crate::models::target::{Environment, Region, Target};
use crate::sources::github::{DEFAULT_API_URL, Repository};
use crate::sources::leancloud::RegionEndpoint;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("malformed target entry {0:?}, expected region/appId/group/env[/alias]")]
    MalformedTarget(String),
    #[error("unknown region {0:?}")]
    UnknownRegion(String),
    #[error("unknown environment {0:?}, expected stg or prod")]
    UnknownEnvironment(String),
    #[error("no access token configured for region {0}")]
    MissingToken(Region),
    #[error("no GitHub repository configured (GH_REPO)")]
    MissingRepository,
    #[error("malformed repository {0:?}, expected owner/name")]
    MalformedRepository(String),
    #[error("no targets configured (ENGINE_ENVS)")]
    NoTargets,
}

/// Top-level config loaded from `dashboard.toml`, overlaid with environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    #[serde(default)]
    /// Keyed by region name, e.g. `cn-n1`.
    pub regions: HashMap<String, RegionConfig>,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Per-target deadline for one aggregation pass. Unset means wait forever.
    pub resolve_timeout_secs: Option<u64>,
    /// Upper bound on any single upstream HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            targets: Vec::new(),
            regions: HashMap::new(),
            github: GitHubConfig::default(),
            cache: CacheConfig::default(),
            resolve_timeout_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Either the compact `region/appId/group/env[/alias]` form or a table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TargetEntry {
    Compact(String),
    Table {
        region: String,
        app_id: String,
        group: String,
        environment: String,
        alias: Option<String>,
    },
}

impl TargetEntry {
    pub fn parse(&self) -> Result<Target, ConfigError> {
        match self {
            TargetEntry::Compact(raw) => parse_compact_target(raw),
            TargetEntry::Table {
                region,
                app_id,
                group,
                environment,
                alias,
            } => Ok(Target::new(
                region.parse()?,
                app_id.as_str(),
                group.as_str(),
                environment.parse()?,
                alias.clone(),
            )),
        }
    }
}

fn parse_compact_target(raw: &str) -> Result<Target, ConfigError> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    let (region, app_id, group, env, alias) = match parts.as_slice() {
        [region, app_id, group, env] => (region, app_id, group, env, None),
        // The alias may itself contain slashes.
        [region, app_id, group, env, alias @ ..] => {
            (region, app_id, group, env, Some(alias.join("/")))
        }
        _ => return Err(ConfigError::MalformedTarget(raw.to_string())),
    };
    if app_id.is_empty() || group.is_empty() {
        return Err(ConfigError::MalformedTarget(raw.to_string()));
    }
    Ok(Target::new(
        region.parse::<Region>()?,
        *app_id,
        *group,
        env.parse::<Environment>()?,
        alias.filter(|a| !a.is_empty()),
    ))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegionConfig {
    /// Console API base, e.g. `https://cn-n1-console-api.leancloud.cn`.
    pub api_url: Option<String>,
    /// Web console base used to link each target.
    pub console_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// `owner/name`
    pub repo: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            token: None,
            api_url: default_github_api_url(),
        }
    }
}

fn default_github_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_deployments_ttl_secs")]
    pub deployments_ttl_secs: u64,
    #[serde(default = "default_commits_capacity")]
    pub commits_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            deployments_ttl_secs: default_deployments_ttl_secs(),
            commits_capacity: default_commits_capacity(),
        }
    }
}

fn default_deployments_ttl_secs() -> u64 {
    10
}

fn default_commits_capacity() -> usize {
    1000
}

impl CacheConfig {
    pub fn deployments_policy(&self) -> CachePolicy {
        CachePolicy::Ttl(Duration::from_secs(self.deployments_ttl_secs))
    }

    pub fn commits_policy(&self) -> CachePolicy {
        CachePolicy::Lru {
            capacity: self.commits_capacity,
        }
    }
}

impl DashboardConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: DashboardConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay the deployment's environment variables. `var` is `std::env::var` in
    /// production and a map lookup in tests.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(envs) = lookup("ENGINE_ENVS") {
            self.targets = envs
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| TargetEntry::Compact(entry.to_string()))
                .collect();
        }
        if let Some(listen) = lookup("DASHBOARD_LISTEN") {
            self.listen = listen;
        }

        let shared_token = lookup("LC_ACCESS_TOKEN");
        for region in Region::ALL {
            let token = lookup(&format!("LC_ACCESS_TOKEN_{}", region.env_suffix()))
                .or_else(|| shared_token.clone());
            if let Some(token) = token {
                let entry = self.regions.entry(region.to_string()).or_default();
                if entry.token.is_none() {
                    entry.token = Some(token);
                }
            }
        }

        if let Some(token) = lookup("GHP_ACCESS_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repo) = lookup("GH_REPO") {
            self.github.repo = Some(repo);
        }
    }

    pub fn parse_targets(&self) -> Result<Vec<Target>, ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        self.targets.iter().map(TargetEntry::parse).collect()
    }

    /// Endpoints for every region the targets use. A target in a region without
    /// a token is a startup error, never a per-request one.
    pub fn region_endpoints(
        &self,
        targets: &[Target],
    ) -> Result<HashMap<Region, RegionEndpoint>, ConfigError> {
        let mut endpoints = HashMap::new();
        for target in targets {
            if endpoints.contains_key(&target.region) {
                continue;
            }
            let region = target.region;
            let config = self.regions.get(region.as_str()).cloned().unwrap_or_default();
            let token = config.token.ok_or(ConfigError::MissingToken(region))?;
            endpoints.insert(
                region,
                RegionEndpoint {
                    api_url: config
                        .api_url
                        .unwrap_or_else(|| format!("https://{}", region.default_api_host())),
                    console_url: config
                        .console_url
                        .unwrap_or_else(|| format!("https://{}", region.default_console_host())),
                    token,
                },
            );
        }
        Ok(endpoints)
    }

    pub fn repository(&self) -> Result<Repository, ConfigError> {
        let raw = self
            .github
            .repo
            .as_deref()
            .ok_or(ConfigError::MissingRepository)?;
        match raw.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Repository {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ConfigError::MalformedRepository(raw.to_string())),
        }
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_engine_envs() {
        let mut config = DashboardConfig::default();
        config.apply_env(env(&[(
            "ENGINE_ENVS",
            "cn-n1/abcdefghijkl/web/prod, us-w1/xyz/api/stg/API staging/us",
        )]));

        let targets = config.parse_targets().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].region, Region::CnN1);
        assert_eq!(targets[0].environment, Environment::Production);
        assert_eq!(targets[0].alias, "cn-n1/abcdefgh/web/prod");
        assert_eq!(targets[1].group_name, "api");
        assert_eq!(targets[1].alias, "API staging/us");
    }

    #[test]
    fn test_malformed_targets() {
        for raw in ["cn-n1/app/web", "cn-n1//web/prod", "eu-c1/app/web/prod", "cn-n1/app/web/dev"] {
            let entry = TargetEntry::Compact(raw.to_string());
            assert!(entry.parse().is_err(), "{raw} should be rejected");
        }
        assert!(matches!(
            DashboardConfig::default().parse_targets(),
            Err(ConfigError::NoTargets)
        ));
    }

    #[test]
    fn test_region_tokens_from_env() {
        let mut config = DashboardConfig::default();
        config.apply_env(env(&[
            ("ENGINE_ENVS", "cn-n1/app/web/prod,us-w1/app/web/prod"),
            ("LC_ACCESS_TOKEN", "shared"),
            ("LC_ACCESS_TOKEN_US_W1", "us-only"),
        ]));
        let targets = config.parse_targets().unwrap();
        let endpoints = config.region_endpoints(&targets).unwrap();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[&Region::CnN1].token, "shared");
        assert_eq!(endpoints[&Region::UsW1].token, "us-only");
        assert_eq!(
            endpoints[&Region::CnN1].api_url,
            "https://cn-n1-console-api.leancloud.cn"
        );
        assert_eq!(endpoints[&Region::UsW1].console_url, "https://console.leancloud.app");
    }

    #[test]
    fn test_missing_region_token_is_fatal() {
        let mut config = DashboardConfig::default();
        config.apply_env(env(&[("ENGINE_ENVS", "cn-e1/app/web/prod")]));
        let targets = config.parse_targets().unwrap();
        assert!(matches!(
            config.region_endpoints(&targets),
            Err(ConfigError::MissingToken(Region::CnE1))
        ));
    }

    #[test]
    fn test_load_toml() {
        let raw = r#"
            listen = "127.0.0.1:8080"
            resolve_timeout_secs = 20
            request_timeout_secs = 8
            targets = [
                "cn-n1/app-1/web/prod",
                { region = "cn-e1", app_id = "app-2", group = "api", environment = "staging", alias = "api" },
            ]

            [regions.cn-e1]
            token = "e1-token"
            api_url = "http://localhost:9000"

            [github]
            repo = "leancloud/dashboard"

            [cache]
            deployments_ttl_secs = 5
        "#;
        let mut config: DashboardConfig = toml::from_str(raw).unwrap();
        config.apply_env(env(&[("LC_ACCESS_TOKEN", "shared"), ("GHP_ACCESS_TOKEN", "ghp")]));

        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.resolve_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.request_timeout(), Duration::from_secs(8));
        assert_eq!(config.cache.deployments_policy(), CachePolicy::Ttl(Duration::from_secs(5)));
        assert_eq!(config.cache.commits_policy(), CachePolicy::Lru { capacity: 1000 });
        assert_eq!(config.github.token.as_deref(), Some("ghp"));
        assert_eq!(
            config.repository().unwrap(),
            Repository {
                owner: "leancloud".into(),
                name: "dashboard".into()
            }
        );

        let targets = config.parse_targets().unwrap();
        assert_eq!(targets[1].alias, "api");
        let endpoints = config.region_endpoints(&targets).unwrap();
        // A token from the file is not overridden by the shared one.
        assert_eq!(endpoints[&Region::CnE1].token, "e1-token");
        assert_eq!(endpoints[&Region::CnE1].api_url, "http://localhost:9000");
        assert_eq!(endpoints[&Region::CnN1].token, "shared");
    }

    #[test]
    fn test_repository_validation() {
        let mut config = DashboardConfig::default();
        assert!(matches!(config.repository(), Err(ConfigError::MissingRepository)));
        for bad in ["dashboard", "/dashboard", "a/b/c"] {
            config.github.repo = Some(bad.to_string());
            assert!(matches!(config.repository(), Err(ConfigError::MalformedRepository(_))));
        }
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = DashboardConfig::load("/nonexistent/dashboard.toml").unwrap();
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert!(config.targets.is_empty());
        assert_eq!(config.cache.deployments_ttl_secs, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
