use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{PageSeed, PagesRepo, RepoError, UpdatePageParams},
    domain::entities::{PageRecord, SectionRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const PAGE_COLUMNS: &str = "id, website_id, slug, title, is_published, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    website_id: Uuid,
    slug: String,
    title: String,
    is_published: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            slug: row.slug,
            title: row.title,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SectionRow {
    id: Uuid,
    page_id: Uuid,
    position: i32,
    block_id: String,
    block_type: String,
    settings: Value,
    created_at: OffsetDateTime,
}

impl From<SectionRow> for SectionRecord {
    fn from(row: SectionRow) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            position: row.position,
            block_id: row.block_id,
            block_type: row.block_type,
            settings: row.settings,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PagesRepo for PostgresRepositories {
    async fn list_pages(&self, website_id: Uuid) -> Result<Vec<PageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM website_pages WHERE website_id = $1 \
             ORDER BY created_at ASC, slug ASC"
        ))
        .bind(website_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageRecord::from).collect())
    }

    async fn find_page(
        &self,
        website_id: Uuid,
        page_id: Uuid,
    ) -> Result<Option<PageRecord>, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM website_pages WHERE website_id = $1 AND id = $2"
        ))
        .bind(website_id)
        .bind(page_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PageRecord::from))
    }

    async fn find_page_by_slug(
        &self,
        website_id: Uuid,
        slug: &str,
    ) -> Result<Option<PageRecord>, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM website_pages WHERE website_id = $1 AND slug = $2"
        ))
        .bind(website_id)
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PageRecord::from))
    }

    async fn create_page(&self, seed: PageSeed) -> Result<PageRecord, RepoError> {
        let mut tx = self.begin().await?;
        Self::insert_page_seed(&mut tx, &seed).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(seed.page)
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "UPDATE website_pages SET title = $3, slug = $4, updated_at = $5 \
             WHERE website_id = $1 AND id = $2 RETURNING {PAGE_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.page_id)
        .bind(&params.title)
        .bind(&params.slug)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PageRecord::from).ok_or(RepoError::NotFound)
    }

    async fn list_sections(&self, page_id: Uuid) -> Result<Vec<SectionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SectionRow>(
            "SELECT id, page_id, position, block_id, block_type, settings, created_at \
             FROM website_sections WHERE page_id = $1 ORDER BY position ASC",
        )
        .bind(page_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SectionRecord::from).collect())
    }
}
