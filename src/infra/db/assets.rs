use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AssetsRepo, RepoError, UpdateAssetParams},
    domain::entities::AssetRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const ASSET_COLUMNS: &str =
    "id, website_id, name, url, storage_key, mime_type, size_bytes, alt_text, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    website_id: Uuid,
    name: String,
    url: String,
    storage_key: String,
    mime_type: String,
    size_bytes: i64,
    alt_text: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<AssetRow> for AssetRecord {
    fn from(row: AssetRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            name: row.name,
            url: row.url,
            storage_key: row.storage_key,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            alt_text: row.alt_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AssetsRepo for PostgresRepositories {
    async fn list_assets(&self, website_id: Uuid) -> Result<Vec<AssetRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM website_assets WHERE website_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(website_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AssetRecord::from).collect())
    }

    async fn create_asset(&self, asset: AssetRecord) -> Result<AssetRecord, RepoError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "INSERT INTO website_assets \
             (id, website_id, name, url, storage_key, mime_type, size_bytes, alt_text, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ASSET_COLUMNS}"
        ))
        .bind(asset.id)
        .bind(asset.website_id)
        .bind(&asset.name)
        .bind(&asset.url)
        .bind(&asset.storage_key)
        .bind(&asset.mime_type)
        .bind(asset.size_bytes)
        .bind(&asset.alt_text)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(AssetRecord::from(row))
    }

    async fn update_asset(&self, params: UpdateAssetParams) -> Result<AssetRecord, RepoError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "UPDATE website_assets SET name = $3, alt_text = $4, updated_at = $5 \
             WHERE website_id = $1 AND id = $2 RETURNING {ASSET_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.asset_id)
        .bind(&params.name)
        .bind(&params.alt_text)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(AssetRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_asset(&self, website_id: Uuid, asset_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM website_assets WHERE website_id = $1 AND id = $2")
            .bind(website_id)
            .bind(asset_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
