//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{
    AnalyticsEventType, DomainStatus, RevisionStatus, SslStatus, SubmissionStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub theme_config: Value,
    pub template_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub slug: String,
    pub title: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Immutable snapshot of a page's blocks and SEO.
///
/// `seo` is `None` when the field was never provided and `Some(Value::Null)`
/// when an editor explicitly cleared it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRevisionRecord {
    pub id: Uuid,
    pub page_id: Uuid,
    pub version: i32,
    pub status: RevisionStatus,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<Value>,
    pub change_summary: Option<String>,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Materialized block of the currently published revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub id: Uuid,
    pub page_id: Uuid,
    pub position: i32,
    pub block_id: String,
    pub block_type: String,
    pub settings: Value,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRevisionRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub version: i32,
    pub status: RevisionStatus,
    pub theme_config: Value,
    pub change_summary: Option<String>,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub name: String,
    pub url: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub key: String,
    pub name: String,
    pub schema: Value,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmissionRecord {
    pub id: Uuid,
    pub form_id: Uuid,
    pub website_id: Uuid,
    pub fields: Value,
    pub spam_score: i32,
    pub status: SubmissionStatus,
    #[serde(skip_serializing)]
    pub ip_hash: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent_hash: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub hostname: String,
    pub status: DomainStatus,
    pub ssl_status: SslStatus,
    pub verification_token: String,
    pub is_primary: bool,
    pub redirect_to_canonical: bool,
    pub canonical_url: Option<String>,
    pub last_checked_at: Option<OffsetDateTime>,
    pub verified_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTokenRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub token: String,
    pub created_by: Option<String>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl PreviewTokenRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub page_path: String,
    pub event_type: AnalyticsEventType,
    pub source: Option<String>,
    pub payload: Value,
    #[serde(skip_serializing)]
    pub ip_hash: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub page_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub action: String,
    pub diff: Value,
    pub created_at: OffsetDateTime,
}
