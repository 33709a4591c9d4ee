use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{AuditRepo, RepoError};
use crate::domain::entities::AuditLogRecord;

pub const MAX_AUDIT_PAGE: u32 = 200;

/// Thin wrapper around the audit repository to simplify logging website mutations.
#[derive(Clone)]
pub struct WebsiteAuditService {
    repo: Arc<dyn AuditRepo>,
}

impl WebsiteAuditService {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    /// Build an audit row without writing it, for repositories that append
    /// the entry inside their own transaction.
    pub fn entry<S>(
        website_id: Uuid,
        page_id: Option<Uuid>,
        actor: Option<&str>,
        action: &str,
        diff: &S,
    ) -> AuditLogRecord
    where
        S: Serialize,
    {
        AuditLogRecord {
            id: Uuid::new_v4(),
            website_id,
            page_id,
            actor_email: actor
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            action: action.to_string(),
            diff: serde_json::to_value(diff).unwrap_or(Value::Null),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub async fn record<S>(
        &self,
        website_id: Uuid,
        page_id: Option<Uuid>,
        actor: Option<&str>,
        action: &str,
        diff: &S,
    ) -> Result<(), RepoError>
    where
        S: Serialize,
    {
        let record = Self::entry(website_id, page_id, actor, action, diff);
        self.repo.append_log(record).await
    }

    pub async fn list_recent(
        &self,
        website_id: Uuid,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, RepoError> {
        self.repo
            .list_logs(website_id, limit.clamp(1, MAX_AUDIT_PAGE))
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entry_drops_blank_actor() {
        let website_id = Uuid::new_v4();
        let record = WebsiteAuditService::entry(
            website_id,
            None,
            Some("  "),
            "theme.publish",
            &json!({"version": 2}),
        );
        assert_eq!(record.website_id, website_id);
        assert_eq!(record.actor_email, None);
        assert_eq!(record.diff, json!({"version": 2}));
    }
}
