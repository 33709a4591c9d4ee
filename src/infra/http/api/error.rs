use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vestry_api_types::BlockIssueBody;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::application::website::WebsiteError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const PUBLISH_BLOCKED: &str = "publish_blocked";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<BlockIssueBody>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    details: Option<Vec<BlockIssueBody>>,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            details: None,
            retry_after: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Tenant identity required",
            Some(hint.into()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                codes::RATE_LIMITED,
                "Rate limit exceeded",
                Some(format!("Retry after {retry_after} seconds")),
            )
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::NotFound => ApiError::not_found("Resource not found"),
            RepoError::InvalidInput { message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Integrity { message } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(message) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(message),
            ),
        }
    }
}

impl From<WebsiteError> for ApiError {
    fn from(err: WebsiteError) -> Self {
        match err {
            WebsiteError::NotFound { entity } => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            WebsiteError::Validation(message) => ApiError::bad_request("Invalid request", Some(message)),
            WebsiteError::PublishBlocked { issues } => {
                let count = issues.len();
                Self {
                    details: Some(
                        issues
                            .into_iter()
                            .map(|issue| BlockIssueBody {
                                block_id: issue.block_id,
                                message: issue.message,
                            })
                            .collect(),
                    ),
                    ..ApiError::new(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        codes::PUBLISH_BLOCKED,
                        "Publish blocked by invalid blocks",
                        Some(format!("{count} block(s) need attention")),
                    )
                }
            }
            WebsiteError::RateLimited {
                retry_after_seconds,
            } => ApiError::rate_limited(retry_after_seconds),
            WebsiteError::Repo(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let diagnostic = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                details: self.details,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        ErrorReport::from_message("infra::http::api", self.status, diagnostic)
            .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::website::BlockIssue;

    #[test]
    fn publish_blocked_lists_every_block() {
        let error = ApiError::from(WebsiteError::PublishBlocked {
            issues: vec![
                BlockIssue {
                    block_id: "events".into(),
                    message: "no upcoming events".into(),
                },
                BlockIssue {
                    block_id: "staff".into(),
                    message: "no staff members".into(),
                },
            ],
        });
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code(), codes::PUBLISH_BLOCKED);
        assert_eq!(error.details.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::from(WebsiteError::RateLimited {
            retry_after_seconds: 60,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("60")
        );
    }

    #[test]
    fn duplicate_maps_to_conflict() {
        let error = ApiError::from(WebsiteError::Repo(RepoError::Duplicate {
            constraint: "website_page_revisions_page_version_key".into(),
        }));
        assert_eq!(error.status(), StatusCode::CONFLICT);
        assert_eq!(error.code(), codes::DUPLICATE);
    }
}
