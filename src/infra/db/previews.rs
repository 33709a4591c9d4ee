use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{PreviewTokensRepo, RepoError},
    domain::entities::PreviewTokenRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PreviewTokenRow {
    id: Uuid,
    website_id: Uuid,
    token: String,
    created_by: Option<String>,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
}

impl From<PreviewTokenRow> for PreviewTokenRecord {
    fn from(row: PreviewTokenRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            token: row.token,
            created_by: row.created_by,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PreviewTokensRepo for PostgresRepositories {
    async fn create_preview_token(
        &self,
        token: PreviewTokenRecord,
    ) -> Result<PreviewTokenRecord, RepoError> {
        sqlx::query(
            "INSERT INTO website_preview_tokens (id, website_id, token, created_by, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.id)
        .bind(token.website_id)
        .bind(&token.token)
        .bind(&token.created_by)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(token)
    }

    async fn find_preview_token(
        &self,
        token: &str,
    ) -> Result<Option<PreviewTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, PreviewTokenRow>(
            "SELECT id, website_id, token, created_by, expires_at, created_at \
             FROM website_preview_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PreviewTokenRecord::from))
    }
}
