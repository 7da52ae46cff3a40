use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{DeploymentSource, UpstreamError, read_json};
use crate::cache::{CachePolicy, MemoCache};
use crate::models::deployment::Deployment;
use crate::models::target::{Region, Target};

/// Where and how to reach the console API of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEndpoint {
    pub api_url: String,
    pub console_url: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    region: Region,
    app_id: String,
    group_name: String,
}

type DeploymentCache = MemoCache<GroupKey, Arc<Vec<Deployment>>, UpstreamError>;

pub struct LeanEngineClient {
    http: reqwest::Client,
    endpoints: HashMap<Region, RegionEndpoint>,
    cache: DeploymentCache,
}

impl LeanEngineClient {
    pub fn new(
        http: reqwest::Client,
        endpoints: HashMap<Region, RegionEndpoint>,
        policy: CachePolicy,
    ) -> Self {
        LeanEngineClient {
            http,
            endpoints,
            cache: MemoCache::new(policy),
        }
    }
}

#[async_trait]
impl DeploymentSource for LeanEngineClient {
    async fn list_deployments(
        &self,
        region: Region,
        app_id: &str,
        group_name: &str,
    ) -> Result<Arc<Vec<Deployment>>, UpstreamError> {
        let endpoint = self
            .endpoints
            .get(&region)
            .ok_or(UpstreamError::UnconfiguredRegion(region))?;

        let url = format!(
            "{}/1.1/engine/groups/{}/deployments",
            endpoint.api_url.trim_end_matches('/'),
            urlencoding::encode(group_name),
        );
        let request = self
            .http
            .get(url)
            .bearer_auth(&endpoint.token)
            .header("X-LC-ID", app_id);

        let key = GroupKey {
            region,
            app_id: app_id.to_string(),
            group_name: group_name.to_string(),
        };
        let label = format!("{region}/{app_id}/{group_name}");
        self.cache
            .get(key, move || async move {
                tracing::debug!("fetching deployments for {label}");
                let deployments: Vec<Deployment> = read_json(request).await?;
                tracing::debug!("{label}: {} deployments", deployments.len());
                Ok(Arc::new(deployments))
            })
            .await
    }

    fn console_url(&self, target: &Target) -> String {
        let base = self
            .endpoints
            .get(&target.region)
            .map(|e| e.console_url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}", target.region.default_console_host()));
        format!(
            "{base}/apps/{}/engine/groups/{}/deploy",
            target.app_id,
            urlencoding::encode(&target.group_name),
        )
    }
}
