//! Postgres-backed repository implementations.

mod analytics;
mod assets;
mod audit;
mod domains;
mod forms;
mod pages;
mod previews;
mod revisions;
mod tenants;
mod util;
mod websites;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use uuid::Uuid;

use crate::application::repos::{PageSeed, RepoError};
use crate::domain::entities::{AuditLogRecord, SectionRecord};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, RepoError> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Serialize writers on `key` until the transaction ends.
    async fn lock_scope(tx: &mut Transaction<'_, Postgres>, key: Uuid) -> Result<(), RepoError> {
        Self::lock_named(tx, &key.to_string()).await
    }

    async fn lock_named(tx: &mut Transaction<'_, Postgres>, key: &str) -> Result<(), RepoError> {
        query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(key)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn insert_page_seed(
        tx: &mut Transaction<'_, Postgres>,
        seed: &PageSeed,
    ) -> Result<(), RepoError> {
        let page = &seed.page;
        query(
            "INSERT INTO website_pages (id, website_id, slug, title, is_published, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(page.id)
        .bind(page.website_id)
        .bind(&page.slug)
        .bind(&page.title)
        .bind(page.is_published)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_sections(tx, page.id, &seed.sections).await?;

        if let Some(revision) = seed.revision.as_ref() {
            Self::insert_revision_row(tx, revision).await?;
        }
        Ok(())
    }

    async fn replace_sections(
        tx: &mut Transaction<'_, Postgres>,
        page_id: Uuid,
        sections: &[SectionRecord],
    ) -> Result<(), RepoError> {
        query("DELETE FROM website_sections WHERE page_id = $1")
            .bind(page_id)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        if sections.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO website_sections (id, page_id, position, block_id, block_type, settings, created_at) ",
        );
        qb.push_values(sections, |mut row, section| {
            row.push_bind(section.id)
                .push_bind(section.page_id)
                .push_bind(section.position)
                .push_bind(&section.block_id)
                .push_bind(&section.block_type)
                .push_bind(&section.settings)
                .push_bind(section.created_at);
        });
        qb.build()
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn append_audit(
        tx: &mut Transaction<'_, Postgres>,
        record: &AuditLogRecord,
    ) -> Result<(), RepoError> {
        query(
            "INSERT INTO website_audit_logs (id, website_id, page_id, actor_email, action, diff, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.website_id)
        .bind(record.page_id)
        .bind(&record.actor_email)
        .bind(&record.action)
        .bind(&record.diff)
        .bind(record.created_at)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
