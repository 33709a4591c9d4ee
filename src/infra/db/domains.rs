use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        DomainsRepo, RecordDomainCheckParams, RepoError, SetPrimaryDomainParams,
        UpdateDomainRoutingParams,
    },
    domain::{
        entities::DomainRecord,
        types::{DomainStatus, SslStatus},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const DOMAIN_COLUMNS: &str = "id, website_id, hostname, status, ssl_status, verification_token, \
     is_primary, redirect_to_canonical, canonical_url, last_checked_at, verified_at, last_error, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct DomainRow {
    id: Uuid,
    website_id: Uuid,
    hostname: String,
    status: DomainStatus,
    ssl_status: SslStatus,
    verification_token: String,
    is_primary: bool,
    redirect_to_canonical: bool,
    canonical_url: Option<String>,
    last_checked_at: Option<OffsetDateTime>,
    verified_at: Option<OffsetDateTime>,
    last_error: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<DomainRow> for DomainRecord {
    fn from(row: DomainRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            hostname: row.hostname,
            status: row.status,
            ssl_status: row.ssl_status,
            verification_token: row.verification_token,
            is_primary: row.is_primary,
            redirect_to_canonical: row.redirect_to_canonical,
            canonical_url: row.canonical_url,
            last_checked_at: row.last_checked_at,
            verified_at: row.verified_at,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DomainsRepo for PostgresRepositories {
    async fn list_domains(&self, website_id: Uuid) -> Result<Vec<DomainRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM website_domains WHERE website_id = $1 \
             ORDER BY is_primary DESC, hostname ASC"
        ))
        .bind(website_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DomainRecord::from).collect())
    }

    async fn find_domain(
        &self,
        website_id: Uuid,
        domain_id: Uuid,
    ) -> Result<Option<DomainRecord>, RepoError> {
        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM website_domains WHERE website_id = $1 AND id = $2"
        ))
        .bind(website_id)
        .bind(domain_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(DomainRecord::from))
    }

    async fn find_domain_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Option<DomainRecord>, RepoError> {
        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM website_domains WHERE hostname = $1"
        ))
        .bind(hostname)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(DomainRecord::from))
    }

    async fn create_domain(&self, domain: DomainRecord) -> Result<DomainRecord, RepoError> {
        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "INSERT INTO website_domains \
             (id, website_id, hostname, status, ssl_status, verification_token, is_primary, \
              redirect_to_canonical, canonical_url, last_checked_at, verified_at, last_error, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(domain.id)
        .bind(domain.website_id)
        .bind(&domain.hostname)
        .bind(domain.status)
        .bind(domain.ssl_status)
        .bind(&domain.verification_token)
        .bind(domain.is_primary)
        .bind(domain.redirect_to_canonical)
        .bind(&domain.canonical_url)
        .bind(domain.last_checked_at)
        .bind(domain.verified_at)
        .bind(&domain.last_error)
        .bind(domain.created_at)
        .bind(domain.updated_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(DomainRecord::from(row))
    }

    async fn delete_domain(&self, website_id: Uuid, domain_id: Uuid) -> Result<bool, RepoError> {
        let result = query("DELETE FROM website_domains WHERE website_id = $1 AND id = $2")
            .bind(website_id)
            .bind(domain_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_domain_check(
        &self,
        params: RecordDomainCheckParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "UPDATE website_domains SET status = $3, ssl_status = $4, verified_at = $5, \
             last_checked_at = $6, last_error = $7, updated_at = $6 \
             WHERE website_id = $1 AND id = $2 RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.domain_id)
        .bind(params.status)
        .bind(params.ssl_status)
        .bind(params.verified_at)
        .bind(params.checked_at)
        .bind(&params.last_error)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::append_audit(&mut tx, &params.audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(DomainRecord::from(row))
    }

    async fn set_primary_domain(
        &self,
        params: SetPrimaryDomainParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut tx = self.begin().await?;
        Self::lock_scope(&mut tx, params.website_id).await?;
        let now = OffsetDateTime::now_utc();

        query(
            "UPDATE website_domains SET is_primary = FALSE, updated_at = $3 \
             WHERE website_id = $1 AND id <> $2 AND is_primary",
        )
        .bind(params.website_id)
        .bind(params.domain_id)
        .bind(now)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "UPDATE website_domains SET is_primary = TRUE, updated_at = $3 \
             WHERE website_id = $1 AND id = $2 RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.domain_id)
        .bind(now)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::append_audit(&mut tx, &params.audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(DomainRecord::from(row))
    }

    async fn update_domain_routing(
        &self,
        params: UpdateDomainRoutingParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "UPDATE website_domains SET redirect_to_canonical = $3, canonical_url = $4, updated_at = $5 \
             WHERE website_id = $1 AND id = $2 RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.domain_id)
        .bind(params.redirect_to_canonical)
        .bind(&params.canonical_url)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::append_audit(&mut tx, &params.audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(DomainRecord::from(row))
    }
}
