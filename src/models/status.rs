use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commit::{Author, CommitInfo};

/// One entry of the `/api/deployments` response, aligned with the configured targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Failed { error: String },
    Deployed(DeployedStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedStatus {
    pub deployed_at: Option<DateTime<Utc>>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
}

impl ResultRecord {
    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        ResultRecord {
            name: name.into(),
            outcome: Outcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn deployed(name: impl Into<String>, status: DeployedStatus) -> Self {
        ResultRecord {
            name: name.into(),
            outcome: Outcome::Deployed(status),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            Outcome::Deployed(_) => None,
        }
    }

    pub fn status(&self) -> Option<&DeployedStatus> {
        match &self.outcome {
            Outcome::Failed { .. } => None,
            Outcome::Deployed(status) => Some(status),
        }
    }
}
