use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Maximum number of characters of a commit subject shown on the dashboard.
pub const MESSAGE_DISPLAY_LEN: usize = 72;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub sha: String,
    pub committed_at: DateTime<Utc>,
    pub message: String,
    pub author: Author,
}

/// A person rendered with a gravatar next to their name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    pub gravatarhash: String,
}

impl Author {
    pub fn from_email(name: impl Into<String>, email: &str) -> Self {
        Author {
            name: name.into(),
            gravatarhash: gravatar_hash(email),
        }
    }
}

/// Gravatar accepts the SHA-256 of the normalized address.
pub fn gravatar_hash(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First line of a commit message, cut to [`MESSAGE_DISPLAY_LEN`] characters.
pub fn display_message(message: &str) -> String {
    let subject = message.lines().next().unwrap_or_default().trim_end();
    if subject.chars().count() <= MESSAGE_DISPLAY_LEN {
        return subject.to_string();
    }
    let mut truncated: String = subject.chars().take(MESSAGE_DISPLAY_LEN - 1).collect();
    truncated.push('…');
    truncated
}
