use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AuditRepo, RepoError},
    domain::entities::AuditLogRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    website_id: Uuid,
    page_id: Option<Uuid>,
    actor_email: Option<String>,
    action: String,
    diff: Value,
    created_at: OffsetDateTime,
}

impl From<AuditRow> for AuditLogRecord {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            page_id: row.page_id,
            actor_email: row.actor_email,
            action: row.action,
            diff: row.diff,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditRepo for PostgresRepositories {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        Self::append_audit(&mut tx, &record).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_logs(
        &self,
        website_id: Uuid,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT id, website_id, page_id, actor_email, action, diff, created_at \
             FROM website_audit_logs WHERE website_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(website_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AuditLogRecord::from).collect())
    }
}
