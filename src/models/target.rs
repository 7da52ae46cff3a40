use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// LeanCloud regions with a known console API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    CnN1,
    CnE1,
    UsW1,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::CnN1, Region::CnE1, Region::UsW1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::CnN1 => "cn-n1",
            Region::CnE1 => "cn-e1",
            Region::UsW1 => "us-w1",
        }
    }

    pub fn default_api_host(&self) -> &'static str {
        match self {
            Region::CnN1 => "cn-n1-console-api.leancloud.cn",
            Region::CnE1 => "cn-e1-console-api.leancloud.cn",
            Region::UsW1 => "us-w1-console-api.leancloud.app",
        }
    }

    pub fn default_console_host(&self) -> &'static str {
        match self {
            Region::CnN1 => "console.leancloud.cn",
            Region::CnE1 => "e1-console.leancloud.cn",
            Region::UsW1 => "console.leancloud.app",
        }
    }

    /// Suffix used for per-region environment variables, e.g. `CN_N1`.
    pub fn env_suffix(&self) -> String {
        self.as_str().replace('-', "_").to_uppercase()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownRegion(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    pub fn short_name(&self) -> &'static str {
        match self {
            Environment::Staging => "stg",
            Environment::Production => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stg" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// One tracked (region, app, group, environment) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub region: Region,
    pub app_id: String,
    pub group_name: String,
    pub environment: Environment,
    pub alias: String,
}

impl Target {
    pub fn new(
        region: Region,
        app_id: impl Into<String>,
        group_name: impl Into<String>,
        environment: Environment,
        alias: Option<String>,
    ) -> Self {
        let app_id = app_id.into();
        let group_name = group_name.into();
        let alias = alias.unwrap_or_else(|| default_alias(region, &app_id, &group_name, environment));
        Target {
            region,
            app_id,
            group_name,
            environment,
            alias,
        }
    }
}

fn default_alias(region: Region, app_id: &str, group_name: &str, environment: Environment) -> String {
    let short_id: String = app_id.chars().take(8).collect();
    format!("{region}/{short_id}/{group_name}/{}", environment.short_name())
}
