use async_trait::async_trait;
use serde_json::Value;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ApplyTemplateParams, CreateWebsiteParams, RepoError, WebsitesRepo,
};
use crate::domain::entities::WebsiteRecord;

use super::{PostgresRepositories, map_sqlx_error};

const WEBSITE_COLUMNS: &str = "id, tenant_id, theme_config, template_key, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct WebsiteRow {
    id: Uuid,
    tenant_id: Uuid,
    theme_config: Value,
    template_key: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<WebsiteRow> for WebsiteRecord {
    fn from(row: WebsiteRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            theme_config: row.theme_config,
            template_key: row.template_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl WebsitesRepo for PostgresRepositories {
    async fn find_website_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<WebsiteRecord>, RepoError> {
        let row = sqlx::query_as::<_, WebsiteRow>(&format!(
            "SELECT {WEBSITE_COLUMNS} FROM websites WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(WebsiteRecord::from))
    }

    async fn find_website(&self, website_id: Uuid) -> Result<Option<WebsiteRecord>, RepoError> {
        let row = sqlx::query_as::<_, WebsiteRow>(&format!(
            "SELECT {WEBSITE_COLUMNS} FROM websites WHERE id = $1"
        ))
        .bind(website_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(WebsiteRecord::from))
    }

    async fn create_website(
        &self,
        params: CreateWebsiteParams,
    ) -> Result<Option<WebsiteRecord>, RepoError> {
        let CreateWebsiteParams { website, pages } = params;
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, WebsiteRow>(&format!(
            "INSERT INTO websites (id, tenant_id, theme_config, template_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (tenant_id) DO NOTHING \
             RETURNING {WEBSITE_COLUMNS}"
        ))
        .bind(website.id)
        .bind(website.tenant_id)
        .bind(&website.theme_config)
        .bind(&website.template_key)
        .bind(website.created_at)
        .bind(website.updated_at)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(None);
        };

        for seed in &pages {
            Self::insert_page_seed(&mut tx, seed).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(Some(WebsiteRecord::from(row)))
    }

    async fn apply_template(
        &self,
        params: ApplyTemplateParams,
    ) -> Result<WebsiteRecord, RepoError> {
        let ApplyTemplateParams {
            website_id,
            template_key,
            theme_config,
            pages,
            theme_revision,
            audit,
        } = params;

        let mut tx = self.begin().await?;
        Self::lock_scope(&mut tx, website_id).await?;

        query("DELETE FROM website_pages WHERE website_id = $1")
            .bind(website_id)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        for seed in &pages {
            Self::insert_page_seed(&mut tx, seed).await?;
        }

        Self::archive_published_theme(&mut tx, website_id).await?;
        Self::insert_theme_row(&mut tx, &theme_revision).await?;

        let row = sqlx::query_as::<_, WebsiteRow>(&format!(
            "UPDATE websites SET theme_config = $2, template_key = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {WEBSITE_COLUMNS}"
        ))
        .bind(website_id)
        .bind(&theme_config)
        .bind(&template_key)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        Self::append_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(WebsiteRecord::from(row))
    }
}
