use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::WebsiteAuditService;
use crate::application::repos::CommitThemeRevisionParams;
use crate::domain::entities::ThemeRevisionRecord;
use crate::domain::seo::{GlobalSeo, THEME_SEO_KEY};
use crate::domain::types::RevisionStatus;

use super::{WebsiteError, WebsiteService};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeView {
    pub theme_config: Value,
    pub template_key: Option<String>,
    pub published_version: Option<i32>,
}

impl WebsiteService {
    pub async fn get_theme(&self, tenant_id: Uuid) -> Result<ThemeView, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let published_version = self
            .revisions
            .list_theme_revisions(website.id)
            .await?
            .iter()
            .find(|revision| revision.status == RevisionStatus::Published)
            .map(|revision| revision.version);

        Ok(ThemeView {
            theme_config: website.theme_config,
            template_key: website.template_key,
            published_version,
        })
    }

    pub async fn list_theme_revisions(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<ThemeRevisionRecord>, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        Ok(self.revisions.list_theme_revisions(website.id).await?)
    }

    /// Shallow-merge `patch` into the theme and publish it as a new revision.
    /// An `seo` entry goes through the global SEO merge and validation.
    pub async fn update_theme(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        mut patch: Map<String, Value>,
        change_summary: Option<String>,
    ) -> Result<ThemeRevisionRecord, WebsiteError> {
        if patch.is_empty() {
            return Err(WebsiteError::validation("theme patch is empty"));
        }
        let website = self.ensure_website(tenant_id).await?;

        if let Some(seo_patch) = patch.get_mut(THEME_SEO_KEY) {
            let Value::Object(fields) = seo_patch else {
                return Err(WebsiteError::validation("seo must be an object"));
            };
            let merged = GlobalSeo::from_theme(&website.theme_config).merge(fields)?;
            *seo_patch = merged.to_value();
        }

        let mut theme = website.theme_config.as_object().cloned().unwrap_or_default();
        let changed_keys: Vec<String> = patch.keys().cloned().collect();
        theme.extend(patch);

        let version = self.next_theme_version(website.id).await?;
        let revision = ThemeRevisionRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            version,
            status: RevisionStatus::Published,
            theme_config: Value::Object(theme),
            change_summary: change_summary
                .map(|summary| summary.trim().to_string())
                .filter(|summary| !summary.is_empty()),
            created_by: actor.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            "theme.publish",
            &json!({ "revisionId": revision.id, "version": version, "keys": changed_keys }),
        );

        let published = self
            .revisions
            .commit_theme_revision(CommitThemeRevisionParams { revision, audit })
            .await?;

        metrics::counter!("vestry_theme_publish_total").increment(1);
        info!(
            target = "vestry::website::theme",
            website_id = %website.id,
            version = published.version,
            "theme published"
        );

        Ok(published)
    }

    pub async fn get_global_seo(&self, tenant_id: Uuid) -> Result<GlobalSeo, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        Ok(GlobalSeo::from_theme(&website.theme_config))
    }

    pub async fn update_global_seo(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        patch: Map<String, Value>,
    ) -> Result<GlobalSeo, WebsiteError> {
        let mut theme_patch = Map::new();
        theme_patch.insert(THEME_SEO_KEY.to_string(), Value::Object(patch));
        let revision = self
            .update_theme(
                tenant_id,
                actor,
                theme_patch,
                Some("Updated global SEO".to_string()),
            )
            .await?;

        Ok(GlobalSeo::from_theme(&revision.theme_config))
    }
}
