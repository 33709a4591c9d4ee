//! Read-only access to tenant collections owned by other services.

use async_trait::async_trait;
use time::{OffsetDateTime, macros::format_description};
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TenantDirectory},
    domain::blocks::{DynamicItem, DynamicSource},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    location: Option<String>,
    starts_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: Uuid,
    display_name: String,
    role_title: Option<String>,
    photo_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: Uuid,
    subject: String,
    summary: Option<String>,
    published_at: Option<OffsetDateTime>,
}

fn format_date(value: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]");
    value
        .date()
        .format(&format)
        .unwrap_or_else(|_| value.date().to_string())
}

fn fetch_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl TenantDirectory for PostgresRepositories {
    async fn find_tenant_by_domain(&self, hostname: &str) -> Result<Option<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM tenants WHERE lower(domain) = $1")
            .bind(hostname)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn count_items(&self, tenant_id: Uuid, source: DynamicSource) -> Result<u64, RepoError> {
        let sql = match source {
            DynamicSource::Events => {
                "SELECT COUNT(*) FROM events \
                 WHERE tenant_id = $1 AND is_public AND starts_at >= now()"
            }
            DynamicSource::Staff => "SELECT COUNT(*) FROM staff_members WHERE tenant_id = $1",
            DynamicSource::Announcements => {
                "SELECT COUNT(*) FROM announcements \
                 WHERE tenant_id = $1 AND published_at IS NOT NULL AND published_at <= now()"
            }
            DynamicSource::Giving => {
                "SELECT COUNT(DISTINCT fund) FROM giving_transactions WHERE tenant_id = $1"
            }
            DynamicSource::Sermons => return Ok(0),
        };

        let count: i64 = sqlx::query_scalar(sql)
            .bind(tenant_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        source: DynamicSource,
        limit: usize,
    ) -> Result<Vec<DynamicItem>, RepoError> {
        let limit = fetch_limit(limit);

        match source {
            DynamicSource::Events => {
                let rows = sqlx::query_as::<_, EventRow>(
                    "SELECT id, title, location, starts_at FROM events \
                     WHERE tenant_id = $1 AND is_public AND starts_at >= now() \
                     ORDER BY starts_at ASC LIMIT $2",
                )
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

                Ok(rows
                    .into_iter()
                    .map(|row| DynamicItem {
                        id: row.id.to_string(),
                        title: row.title,
                        subtitle: row.location,
                        date: Some(format_date(row.starts_at)),
                        url: None,
                        image_url: None,
                    })
                    .collect())
            }
            DynamicSource::Staff => {
                let rows = sqlx::query_as::<_, StaffRow>(
                    "SELECT id, display_name, role_title, photo_url FROM staff_members \
                     WHERE tenant_id = $1 ORDER BY sort_order ASC, display_name ASC LIMIT $2",
                )
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

                Ok(rows
                    .into_iter()
                    .map(|row| DynamicItem {
                        id: row.id.to_string(),
                        title: row.display_name,
                        subtitle: row.role_title,
                        date: None,
                        url: None,
                        image_url: row.photo_url,
                    })
                    .collect())
            }
            DynamicSource::Announcements => {
                let rows = sqlx::query_as::<_, AnnouncementRow>(
                    "SELECT id, subject, summary, published_at FROM announcements \
                     WHERE tenant_id = $1 AND published_at IS NOT NULL AND published_at <= now() \
                     ORDER BY published_at DESC LIMIT $2",
                )
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

                Ok(rows
                    .into_iter()
                    .map(|row| DynamicItem {
                        id: row.id.to_string(),
                        title: row.subject,
                        subtitle: row.summary,
                        date: row.published_at.map(format_date),
                        url: None,
                        image_url: None,
                    })
                    .collect())
            }
            // Funds only; individual gifts never reach a public page.
            DynamicSource::Giving => {
                let funds = sqlx::query_scalar::<_, String>(
                    "SELECT fund FROM giving_transactions \
                     WHERE tenant_id = $1 GROUP BY fund ORDER BY COUNT(*) DESC, fund ASC LIMIT $2",
                )
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

                Ok(funds
                    .into_iter()
                    .map(|fund| DynamicItem {
                        id: fund.clone(),
                        title: fund,
                        subtitle: None,
                        date: None,
                        url: None,
                        image_url: None,
                    })
                    .collect())
            }
            DynamicSource::Sermons => Ok(Vec::new()),
        }
    }
}
