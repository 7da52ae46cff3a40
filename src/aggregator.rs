use futures_util::future::join_all;
use std::time::Duration;

use crate::models::status::ResultRecord;
use crate::models::target::Target;
use crate::resolver::{ResolveError, TargetResolver};

/// Resolves every target concurrently and returns the records in target order.
pub struct Aggregator {
    resolver: TargetResolver,
    deadline: Option<Duration>,
}

impl Aggregator {
    pub fn new(resolver: TargetResolver) -> Self {
        Aggregator {
            resolver,
            deadline: None,
        }
    }

    /// Bound how long a single target may take before it is reported as timed out.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn aggregate_all(&self, targets: &[Target]) -> Vec<ResultRecord> {
        let started = std::time::Instant::now();
        let records = join_all(targets.iter().map(|target| self.resolve_one(target))).await;

        let failed = records.iter().filter(|r| r.error().is_some()).count();
        tracing::debug!(
            "resolved {} targets ({failed} failed) in {:?}",
            records.len(),
            started.elapsed()
        );
        records
    }

    async fn resolve_one(&self, target: &Target) -> ResultRecord {
        let Some(deadline) = self.deadline else {
            return self.resolver.resolve(target).await;
        };
        match tokio::time::timeout(deadline, self.resolver.resolve(target)).await {
            Ok(record) => record,
            Err(_) => {
                tracing::warn!("{}: no result after {deadline:?}", target.alias);
                ResultRecord::failed(&target.alias, ResolveError::TimedOut)
            }
        }
    }
}
