//! Request and response types shared by the Vestry website API and its clients.
//!
//! The enums mirror Postgres enums; enable the `sqlx` feature to decode them
//! straight from rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle of a page or theme revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "revision_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    Draft,
    Published,
    Archived,
}

impl RevisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RevisionStatus::Draft => "draft",
            RevisionStatus::Published => "published",
            RevisionStatus::Archived => "archived",
        }
    }
}

/// Moderation state of a form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "submission_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Received,
    Reviewed,
    Resolved,
    Quarantined,
    Spam,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Received => "received",
            SubmissionStatus::Reviewed => "reviewed",
            SubmissionStatus::Resolved => "resolved",
            SubmissionStatus::Quarantined => "quarantined",
            SubmissionStatus::Spam => "spam",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "received" => Some(SubmissionStatus::Received),
            "reviewed" => Some(SubmissionStatus::Reviewed),
            "resolved" => Some(SubmissionStatus::Resolved),
            "quarantined" => Some(SubmissionStatus::Quarantined),
            "spam" => Some(SubmissionStatus::Spam),
            _ => None,
        }
    }
}

/// Ownership verification state of a custom domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "domain_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "ssl_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SslStatus {
    Pending,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "analytics_event_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    PageView,
    CtaClick,
    FormSubmit,
}

impl AnalyticsEventType {
    pub const ALL: [AnalyticsEventType; 3] = [
        AnalyticsEventType::PageView,
        AnalyticsEventType::CtaClick,
        AnalyticsEventType::FormSubmit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticsEventType::PageView => "page_view",
            AnalyticsEventType::CtaClick => "cta_click",
            AnalyticsEventType::FormSubmit => "form_submit",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCreateRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdateRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Body of a draft save. `seo` distinguishes an explicit JSON `null` from an
/// omitted field, so it is kept as raw JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSaveRequest {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub seo: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub change_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub change_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    #[serde(default)]
    pub revision_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePatchRequest {
    pub theme: Map<String, Value>,
    #[serde(default)]
    pub change_summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCreateRequest {
    pub name: String,
    pub url: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormCreateRequest {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatusRequest {
    pub status: String,
}

/// Public form submission body. `fields` is validated by the service so a
/// missing object yields a domain error instead of a decode failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmitRequest {
    #[serde(default)]
    pub fields: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCreateRequest {
    pub hostname: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRoutingRequest {
    pub redirect_to_canonical: bool,
    #[serde(default)]
    pub canonical_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventRequest {
    pub page_path: String,
    pub event_type: AnalyticsEventType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockIssueBody {
    pub block_id: String,
    pub message: String,
}

/// Deserializes a field so that an explicit `null` becomes `Some(Value::Null)`
/// while an omitted field stays `None` (via `#[serde(default)]`).
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
