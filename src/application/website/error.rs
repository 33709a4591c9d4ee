use serde::Serialize;
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, SlugError};

/// A dynamic block that cannot be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockIssue {
    pub block_id: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum WebsiteError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{0}")]
    Validation(String),
    #[error("publish blocked: {}", describe_issues(.issues))]
    PublishBlocked { issues: Vec<BlockIssue> },
    #[error("too many submissions; retry in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl WebsiteError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<DomainError> for WebsiteError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity } => WebsiteError::NotFound { entity },
            DomainError::Validation { message, .. } => WebsiteError::Validation(message),
            DomainError::Invariant { message } => {
                WebsiteError::Repo(RepoError::Integrity { message })
            }
        }
    }
}

impl From<SlugError> for WebsiteError {
    fn from(error: SlugError) -> Self {
        WebsiteError::Validation(error.to_string())
    }
}

impl From<SlugAsyncError<RepoError>> for WebsiteError {
    fn from(error: SlugAsyncError<RepoError>) -> Self {
        match error {
            SlugAsyncError::Slug(err) => err.into(),
            SlugAsyncError::Predicate(err) => WebsiteError::Repo(err),
        }
    }
}

fn describe_issues(issues: &[BlockIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("block `{}`: {}", issue.block_id, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}
