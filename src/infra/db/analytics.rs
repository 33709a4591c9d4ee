use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AnalyticsRepo, RepoError},
    domain::{entities::AnalyticsEventRecord, types::AnalyticsEventType},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AnalyticsEventRow {
    id: Uuid,
    website_id: Uuid,
    page_path: String,
    event_type: AnalyticsEventType,
    source: Option<String>,
    payload: Value,
    ip_hash: Option<String>,
    user_agent_hash: Option<String>,
    created_at: OffsetDateTime,
}

impl From<AnalyticsEventRow> for AnalyticsEventRecord {
    fn from(row: AnalyticsEventRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            page_path: row.page_path,
            event_type: row.event_type,
            source: row.source,
            payload: row.payload,
            ip_hash: row.ip_hash,
            user_agent_hash: row.user_agent_hash,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AnalyticsRepo for PostgresRepositories {
    async fn insert_event(&self, event: AnalyticsEventRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO website_analytics_events \
             (id, website_id, page_path, event_type, source, payload, ip_hash, user_agent_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.website_id)
        .bind(&event.page_path)
        .bind(event.event_type)
        .bind(&event.source)
        .bind(&event.payload)
        .bind(&event.ip_hash)
        .bind(&event.user_agent_hash)
        .bind(event.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_events_since(
        &self,
        website_id: Uuid,
        since: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AnalyticsEventRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AnalyticsEventRow>(
            "SELECT id, website_id, page_path, event_type, source, payload, ip_hash, user_agent_hash, created_at \
             FROM website_analytics_events \
             WHERE website_id = $1 AND created_at >= $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3",
        )
        .bind(website_id)
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AnalyticsEventRecord::from).collect())
    }
}
