use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::UpdateAssetParams;
use crate::domain::entities::AssetRecord;

use super::{WebsiteError, WebsiteService, required_text};

#[derive(Debug, Clone)]
pub struct CreateAssetCommand {
    pub name: String,
    pub url: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAssetCommand {
    pub name: Option<String>,
    pub alt_text: Option<String>,
}

impl WebsiteService {
    pub async fn list_assets(&self, tenant_id: Uuid) -> Result<Vec<AssetRecord>, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        Ok(self.assets.list_assets(website.id).await?)
    }

    pub async fn create_asset(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        command: CreateAssetCommand,
    ) -> Result<AssetRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        if command.size_bytes < 0 {
            return Err(WebsiteError::validation("size must not be negative"));
        }

        let now = OffsetDateTime::now_utc();
        let asset = AssetRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            name: required_text("name", &command.name)?,
            url: required_text("url", &command.url)?,
            storage_key: required_text("storageKey", &command.storage_key)?,
            mime_type: required_text("mimeType", &command.mime_type)?,
            size_bytes: command.size_bytes,
            alt_text: optional_text(command.alt_text),
            created_at: now,
            updated_at: now,
        };

        let asset = self.assets.create_asset(asset).await?;
        self.audit
            .record(
                website.id,
                None,
                actor,
                "asset.create",
                &json!({ "assetId": asset.id, "name": asset.name }),
            )
            .await?;
        Ok(asset)
    }

    pub async fn update_asset(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        asset_id: Uuid,
        command: UpdateAssetCommand,
    ) -> Result<AssetRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let current = self
            .assets
            .list_assets(website.id)
            .await?
            .into_iter()
            .find(|asset| asset.id == asset_id)
            .ok_or(WebsiteError::not_found("asset"))?;

        let name = match command.name.as_deref() {
            Some(name) => required_text("name", name)?,
            None => current.name.clone(),
        };
        let alt_text = match command.alt_text {
            Some(alt_text) => optional_text(Some(alt_text)),
            None => current.alt_text.clone(),
        };

        let asset = self
            .assets
            .update_asset(UpdateAssetParams {
                website_id: website.id,
                asset_id,
                name,
                alt_text,
            })
            .await?;
        self.audit
            .record(
                website.id,
                None,
                actor,
                "asset.update",
                &json!({ "assetId": asset.id, "name": asset.name }),
            )
            .await?;
        Ok(asset)
    }

    pub async fn delete_asset(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        asset_id: Uuid,
    ) -> Result<(), WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        if !self.assets.delete_asset(website.id, asset_id).await? {
            return Err(WebsiteError::not_found("asset"));
        }
        self.audit
            .record(
                website.id,
                None,
                actor,
                "asset.delete",
                &json!({ "assetId": asset_id }),
            )
            .await?;
        Ok(())
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
