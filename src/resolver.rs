use std::sync::Arc;

use crate::models::commit::Author;
use crate::models::deployment::{Deployment, DeploymentStatus, VersionRef};
use crate::models::status::{DeployedStatus, ResultRecord};
use crate::models::target::{Environment, Target};
use crate::sources::{CommitSource, DeploymentSource, UpstreamError};

/// Why a target could not be reported as deployed. The display strings are
/// what the dashboard shows.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Group not found")]
    GroupNotFound,
    #[error("Deployment not found")]
    DeploymentNotFound,
    #[error("Not deployed")]
    NotDeployed,
    #[error("Commit {sha} unavailable: {source}")]
    CommitUnavailable { sha: String, source: UpstreamError },
    #[error("Timed out")]
    TimedOut,
}

/// Turns one configured target into its status record.
pub struct TargetResolver {
    deployments: Arc<dyn DeploymentSource>,
    commits: Arc<dyn CommitSource>,
}

impl TargetResolver {
    pub fn new(deployments: Arc<dyn DeploymentSource>, commits: Arc<dyn CommitSource>) -> Self {
        TargetResolver {
            deployments,
            commits,
        }
    }

    /// Never fails: every problem ends up in the record's `error`.
    pub async fn resolve(&self, target: &Target) -> ResultRecord {
        match self.try_resolve(target).await {
            Ok(status) => ResultRecord::deployed(&target.alias, status),
            Err(err) => ResultRecord::failed(&target.alias, err),
        }
    }

    async fn try_resolve(&self, target: &Target) -> Result<DeployedStatus, ResolveError> {
        let deployments = self
            .deployments
            .list_deployments(target.region, &target.app_id, &target.group_name)
            .await
            .map_err(|e| {
                // Unavailable and missing groups look the same on the dashboard.
                tracing::warn!("{}: listing deployments failed: {e}", target.alias);
                ResolveError::GroupNotFound
            })?;

        let deployment = select_deployment(&deployments, target.environment)
            .ok_or(ResolveError::DeploymentNotFound)?;
        let version = deployment
            .version
            .as_ref()
            .ok_or(ResolveError::NotDeployed)?;

        let commit = match VersionRef::parse(&version.version) {
            VersionRef::GitCommit(sha) => {
                let commit = self.commits.get_commit(&sha).await.map_err(|source| {
                    tracing::warn!("{}: commit {sha} lookup failed: {source}", target.alias);
                    ResolveError::CommitUnavailable { sha, source }
                })?;
                Some(commit)
            }
            VersionRef::OpaqueArtifact(_) => None,
        };

        Ok(DeployedStatus {
            deployed_at: deployment.deployed_at,
            url: self.deployments.console_url(target),
            author: deployment.deployed_by.as_ref().map(|by| Author {
                name: by.username.clone(),
                gravatarhash: by.email_hash.clone(),
            }),
            commit,
        })
    }
}

/// First successful deployment of `environment`, in upstream order.
pub fn select_deployment(deployments: &[Deployment], environment: Environment) -> Option<&Deployment> {
    deployments
        .iter()
        .find(|d| d.environment() == environment && d.status == DeploymentStatus::Success)
}
