pub mod github;
pub mod leancloud;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::commit::CommitInfo;
use crate::models::deployment::Deployment;
use crate::models::target::{Region, Target};

/// Failure talking to either upstream. Cloneable so that one in-flight
/// outcome can be handed to every caller waiting on the same cache key.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("upstream responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed upstream payload: {0}")]
    Decode(String),
    #[error("no endpoint configured for region {0}")]
    UnconfiguredRegion(Region),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Lists the deployments of one LeanEngine group.
#[async_trait]
pub trait DeploymentSource: Send + Sync {
    async fn list_deployments(
        &self,
        region: Region,
        app_id: &str,
        group_name: &str,
    ) -> Result<Arc<Vec<Deployment>>, UpstreamError>;

    /// Link to the group's deploy page in the web console.
    fn console_url(&self, target: &Target) -> String;
}

/// Looks up commit metadata by sha.
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo, UpstreamError>;
}

/// Reads a response, turning non-2xx statuses into [`UpstreamError::Status`].
async fn read_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, UpstreamError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}
