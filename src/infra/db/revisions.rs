use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, Transaction, query};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommitPageRevisionParams, CommitThemeRevisionParams, RepoError, RevisionsRepo,
    SaveDraftParams,
};
use crate::domain::entities::{PageRevisionRecord, ThemeRevisionRecord};
use crate::domain::types::RevisionStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PageRevisionRow {
    id: Uuid,
    page_id: Uuid,
    version: i32,
    status: RevisionStatus,
    content: Value,
    seo: Option<Value>,
    change_summary: Option<String>,
    created_by: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PageRevisionRow> for PageRevisionRecord {
    fn from(row: PageRevisionRow) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            version: row.version,
            status: row.status,
            content: row.content,
            seo: row.seo,
            change_summary: row.change_summary,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ThemeRevisionRow {
    id: Uuid,
    website_id: Uuid,
    version: i32,
    status: RevisionStatus,
    theme_config: Value,
    change_summary: Option<String>,
    created_by: Option<String>,
    created_at: OffsetDateTime,
}

impl From<ThemeRevisionRow> for ThemeRevisionRecord {
    fn from(row: ThemeRevisionRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            version: row.version,
            status: row.status,
            theme_config: row.theme_config,
            change_summary: row.change_summary,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

impl PostgresRepositories {
    pub(super) async fn insert_revision_row(
        tx: &mut Transaction<'_, Postgres>,
        revision: &PageRevisionRecord,
    ) -> Result<(), RepoError> {
        query(
            "INSERT INTO website_page_revisions \
             (id, page_id, version, status, content, seo, change_summary, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(revision.id)
        .bind(revision.page_id)
        .bind(revision.version)
        .bind(revision.status)
        .bind(&revision.content)
        .bind(&revision.seo)
        .bind(&revision.change_summary)
        .bind(&revision.created_by)
        .bind(revision.created_at)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub(super) async fn insert_theme_row(
        tx: &mut Transaction<'_, Postgres>,
        revision: &ThemeRevisionRecord,
    ) -> Result<(), RepoError> {
        query(
            "INSERT INTO website_theme_revisions \
             (id, website_id, version, status, theme_config, change_summary, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(revision.id)
        .bind(revision.website_id)
        .bind(revision.version)
        .bind(revision.status)
        .bind(&revision.theme_config)
        .bind(&revision.change_summary)
        .bind(&revision.created_by)
        .bind(revision.created_at)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub(super) async fn archive_published_theme(
        tx: &mut Transaction<'_, Postgres>,
        website_id: Uuid,
    ) -> Result<(), RepoError> {
        query(
            "UPDATE website_theme_revisions SET status = 'archived' \
             WHERE website_id = $1 AND status = 'published'",
        )
        .bind(website_id)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl RevisionsRepo for PostgresRepositories {
    async fn list_page_revisions(
        &self,
        page_id: Uuid,
    ) -> Result<Vec<PageRevisionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageRevisionRow>(
            "SELECT id, page_id, version, status, content, seo, change_summary, created_by, created_at \
             FROM website_page_revisions WHERE page_id = $1 ORDER BY version DESC",
        )
        .bind(page_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageRevisionRecord::from).collect())
    }

    async fn insert_page_revision(
        &self,
        revision: PageRevisionRecord,
    ) -> Result<PageRevisionRecord, RepoError> {
        let mut tx = self.begin().await?;
        Self::insert_revision_row(&mut tx, &revision).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(revision)
    }

    async fn needs_revision_backfill(&self, website_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM website_pages p WHERE p.website_id = $1 \
                 AND NOT EXISTS (SELECT 1 FROM website_page_revisions r WHERE r.page_id = p.id) \
             ) OR NOT EXISTS (SELECT 1 FROM website_theme_revisions WHERE website_id = $1)",
        )
        .bind(website_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn save_draft(&self, params: SaveDraftParams) -> Result<PageRevisionRecord, RepoError> {
        let SaveDraftParams { revision, title } = params;
        let mut tx = self.begin().await?;
        Self::lock_scope(&mut tx, revision.page_id).await?;

        Self::insert_revision_row(&mut tx, &revision).await?;

        if let Some(title) = title.as_deref() {
            let result = query("UPDATE website_pages SET title = $2, updated_at = $3 WHERE id = $1")
                .bind(revision.page_id)
                .bind(title)
                .bind(revision.created_at)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
            if result.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(revision)
    }

    async fn commit_page_revision(
        &self,
        params: CommitPageRevisionParams,
    ) -> Result<PageRevisionRecord, RepoError> {
        let CommitPageRevisionParams {
            revision,
            sections,
            audit,
        } = params;
        let mut tx = self.begin().await?;
        Self::lock_scope(&mut tx, revision.page_id).await?;

        query(
            "UPDATE website_page_revisions SET status = 'archived' \
             WHERE page_id = $1 AND status = 'published'",
        )
        .bind(revision.page_id)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        Self::insert_revision_row(&mut tx, &revision).await?;
        Self::replace_sections(&mut tx, revision.page_id, &sections).await?;

        query("UPDATE website_pages SET is_published = TRUE, updated_at = $2 WHERE id = $1")
            .bind(revision.page_id)
            .bind(revision.created_at)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        Self::append_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(revision)
    }

    async fn list_theme_revisions(
        &self,
        website_id: Uuid,
    ) -> Result<Vec<ThemeRevisionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ThemeRevisionRow>(
            "SELECT id, website_id, version, status, theme_config, change_summary, created_by, created_at \
             FROM website_theme_revisions WHERE website_id = $1 ORDER BY version DESC",
        )
        .bind(website_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ThemeRevisionRecord::from).collect())
    }

    async fn insert_theme_revision(
        &self,
        revision: ThemeRevisionRecord,
    ) -> Result<ThemeRevisionRecord, RepoError> {
        let mut tx = self.begin().await?;
        Self::insert_theme_row(&mut tx, &revision).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(revision)
    }

    async fn commit_theme_revision(
        &self,
        params: CommitThemeRevisionParams,
    ) -> Result<ThemeRevisionRecord, RepoError> {
        let CommitThemeRevisionParams { revision, audit } = params;
        let mut tx = self.begin().await?;
        Self::lock_scope(&mut tx, revision.website_id).await?;

        Self::archive_published_theme(&mut tx, revision.website_id).await?;
        Self::insert_theme_row(&mut tx, &revision).await?;

        query("UPDATE websites SET theme_config = $2, updated_at = $3 WHERE id = $1")
            .bind(revision.website_id)
            .bind(&revision.theme_config)
            .bind(revision.created_at)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        Self::append_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(revision)
    }
}
