use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use super::{CommitSource, UpstreamError, read_json};
use crate::cache::{CachePolicy, MemoCache};
use crate::models::commit::{Author, CommitInfo, display_message};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// `owner/name` of the repository every deployed sha belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
    author: Signature,
    committer: Signature,
}

#[derive(Deserialize)]
struct Signature {
    name: String,
    #[serde(default)]
    email: String,
    date: DateTime<Utc>,
}

impl From<CommitResponse> for CommitInfo {
    fn from(response: CommitResponse) -> Self {
        let detail = response.commit;
        CommitInfo {
            sha: response.sha,
            committed_at: detail.committer.date,
            message: display_message(&detail.message),
            author: Author::from_email(detail.author.name, &detail.author.email),
        }
    }
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    repository: Repository,
    token: Option<String>,
    cache: MemoCache<String, CommitInfo, UpstreamError>,
}

impl GitHubClient {
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        repository: Repository,
        token: Option<String>,
        policy: CachePolicy,
    ) -> Self {
        GitHubClient {
            http,
            api_url: api_url.into(),
            repository,
            token,
            cache: MemoCache::new(policy),
        }
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo, UpstreamError> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_url.trim_end_matches('/'),
            self.repository.owner,
            self.repository.name,
            urlencoding::encode(sha),
        );
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, concat!("deploy-dashboard/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let sha_owned = sha.to_string();
        self.cache
            .get(sha.to_string(), move || async move {
                tracing::debug!("fetching commit {sha_owned}");
                let response: CommitResponse = read_json(request).await?;
                Ok(CommitInfo::from(response))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::commit::gravatar_hash;

    const COMMIT: &str = r#"{
        "sha": "abc123",
        "commit": {
            "message": "Fix deploy status colors\n\nThe old palette was unreadable.",
            "author": { "name": "Lee Yeh", "email": "Lee@example.com", "date": "2021-03-01T10:00:00Z" },
            "committer": { "name": "GitHub", "email": "noreply@github.com", "date": "2021-03-02T11:30:00Z" }
        },
        "author": { "login": "leeyeh" }
    }"#;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(
            reqwest::Client::new(),
            server.url(),
            Repository {
                owner: "leancloud".into(),
                name: "dashboard".into(),
            },
            token.map(String::from),
            CachePolicy::Lru { capacity: 16 },
        )
    }

    #[tokio::test]
    async fn test_get_commit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/leancloud/dashboard/commits/abc123")
            .match_header("authorization", "Bearer ghp-token")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(COMMIT)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, Some("ghp-token"));
        let commit = client.get_commit("abc123").await.unwrap();
        assert_eq!(commit.sha, "abc123");
        assert_eq!(commit.message, "Fix deploy status colors");
        assert_eq!(commit.committed_at.to_rfc3339(), "2021-03-02T11:30:00+00:00");
        assert_eq!(commit.author.name, "Lee Yeh");
        assert_eq!(commit.author.gravatarhash, gravatar_hash("lee@example.com"));

        // Commits are immutable, the second lookup never leaves the process.
        let again = client.get_commit("abc123").await.unwrap();
        assert_eq!(again, commit);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_commit_without_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/leancloud/dashboard/commits/abc123")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(COMMIT)
            .create_async()
            .await;

        let client = client_for(&server, None);
        assert!(client.get_commit("abc123").await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_commit_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/leancloud/dashboard/commits/deadbeef")
            .with_status(422)
            .with_body(r#"{"message":"No commit found for SHA: deadbeef"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, None);
        for _ in 0..2 {
            let err = client.get_commit("deadbeef").await.unwrap_err();
            assert!(matches!(err, UpstreamError::Status { status: 422, .. }));
        }
        mock.assert_async().await;
    }
}
