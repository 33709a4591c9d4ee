//! Public, host-routed rendering of published websites and previews.

pub mod resolve;
pub mod sitemap;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{PagesRepo, PreviewTokensRepo, RevisionsRepo};
use crate::application::website::blocks::{content_blocks, strip_editor_fields};
use crate::application::website::{
    DynamicContent, HOME_SLUG, WebsiteError, WebsiteService, WebsiteStores, normalize_blocks,
};
use crate::domain::blocks::Block;
use crate::domain::entities::{PageRecord, PageRevisionRecord, PreviewTokenRecord, WebsiteRecord};
use crate::domain::seo::GlobalSeo;
use crate::domain::types::RevisionStatus;

pub use resolve::{ResolvedSite, SiteResolver, canonical_redirect};

/// Which revision of each page a rendering uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Published,
    /// Newest draft when it is ahead of the published revision.
    Preview,
}

/// Public result that may instead be a canonical redirect.
#[derive(Debug, Clone)]
pub enum Routed<T> {
    Redirect(String),
    Content(T),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub id: Uuid,
    pub slug: String,
    pub path: String,
    pub title: String,
    pub is_published: bool,
    pub revision_id: Uuid,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<Value>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSite {
    pub website_id: Uuid,
    pub hostname: String,
    pub theme: Value,
    pub seo: GlobalSeo,
    pub preview: bool,
    pub pages: Vec<RenderedPage>,
}

#[derive(Clone)]
pub struct PublicSiteService {
    resolver: SiteResolver,
    websites: WebsiteService,
    pages: Arc<dyn PagesRepo>,
    revisions: Arc<dyn RevisionsRepo>,
    previews: Arc<dyn PreviewTokensRepo>,
    dynamic: DynamicContent,
    preview_ttl: Duration,
}

impl PublicSiteService {
    pub fn new(stores: &WebsiteStores, websites: WebsiteService, preview_ttl: Duration) -> Self {
        Self {
            resolver: SiteResolver::new(
                stores.tenants.clone(),
                stores.domains.clone(),
                websites.clone(),
            ),
            dynamic: websites.dynamic().clone(),
            websites,
            pages: stores.pages.clone(),
            revisions: stores.revisions.clone(),
            previews: stores.previews.clone(),
            preview_ttl,
        }
    }

    pub fn resolver(&self) -> &SiteResolver {
        &self.resolver
    }

    pub async fn render_site(&self, host: &str) -> Result<Routed<RenderedSite>, WebsiteError> {
        let resolved = self.resolver.resolve_host_with_redirect(host).await?;
        if let Some(target) = resolved.redirect_to {
            return Ok(Routed::Redirect(target));
        }
        let site = self
            .assemble(&resolved.website, &resolved.hostname, RenderMode::Published)
            .await?;
        Ok(Routed::Content(site))
    }

    pub async fn render_page(
        &self,
        host: &str,
        slug: &str,
    ) -> Result<Routed<RenderedPage>, WebsiteError> {
        let resolved = self.resolver.resolve_host_with_redirect(host).await?;
        if let Some(target) = resolved.redirect_to {
            return Ok(Routed::Redirect(target));
        }

        let slug = slug.trim().trim_matches('/');
        let slug = if slug.is_empty() { HOME_SLUG } else { slug };
        let page = self
            .pages
            .find_page_by_slug(resolved.website.id, slug)
            .await?
            .ok_or(WebsiteError::not_found("page"))?;
        let revisions = self.revisions.list_page_revisions(page.id).await?;
        let revision = effective_revision(&revisions, RenderMode::Published)
            .ok_or(WebsiteError::not_found("page"))?;

        let rendered = self
            .render_revision(resolved.website.tenant_id, &page, revision)
            .await;
        Ok(Routed::Content(rendered))
    }

    pub async fn create_preview_token(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
    ) -> Result<PreviewTokenRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let now = OffsetDateTime::now_utc();
        let token = PreviewTokenRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            created_by: actor.map(str::to_string),
            expires_at: now + self.preview_ttl,
            created_at: now,
        };

        let token = self.previews.create_preview_token(token).await?;
        self.websites
            .audit()
            .record(
                website.id,
                None,
                actor,
                "preview.create",
                &json!({ "tokenId": token.id, "expiresAt": token.expires_at.unix_timestamp() }),
            )
            .await?;
        Ok(token)
    }

    /// Draft-preferring rendering reachable with a valid preview token.
    pub async fn render_preview(&self, token: &str) -> Result<RenderedSite, WebsiteError> {
        let record = self
            .previews
            .find_preview_token(token.trim())
            .await?
            .filter(|record| !record.is_expired(OffsetDateTime::now_utc()))
            .ok_or(WebsiteError::not_found("preview token"))?;
        let website = self
            .websites
            .find_website(record.website_id)
            .await?
            .ok_or(WebsiteError::not_found("website"))?;

        self.assemble(&website, "preview", RenderMode::Preview).await
    }

    async fn assemble(
        &self,
        website: &WebsiteRecord,
        hostname: &str,
        mode: RenderMode,
    ) -> Result<RenderedSite, WebsiteError> {
        let mut pages = Vec::new();
        for page in self.pages.list_pages(website.id).await? {
            let revisions = self.revisions.list_page_revisions(page.id).await?;
            let Some(revision) = effective_revision(&revisions, mode) else {
                continue;
            };
            pages.push(
                self.render_revision(website.tenant_id, &page, revision)
                    .await,
            );
        }
        pages.sort_by_key(|page| page.slug != HOME_SLUG);

        Ok(RenderedSite {
            website_id: website.id,
            hostname: hostname.to_string(),
            theme: website.theme_config.clone(),
            seo: GlobalSeo::from_theme(&website.theme_config),
            preview: mode == RenderMode::Preview,
            pages,
        })
    }

    async fn render_revision(
        &self,
        tenant_id: Uuid,
        page: &PageRecord,
        revision: &PageRevisionRecord,
    ) -> RenderedPage {
        let mut blocks = normalize_blocks(content_blocks(&revision.content)).blocks;
        self.dynamic.hydrate(tenant_id, &mut blocks).await;
        strip_editor_fields(&mut blocks);

        RenderedPage {
            id: page.id,
            path: page_path(&page.slug),
            slug: page.slug.clone(),
            title: page.title.clone(),
            is_published: page.is_published,
            revision_id: revision.id,
            version: revision.version,
            seo: revision.seo.clone(),
            blocks,
        }
    }
}

/// Public path of a page: the home page lives at the root.
pub fn page_path(slug: &str) -> String {
    if slug == HOME_SLUG {
        "/".to_string()
    } else {
        format!("/{slug}")
    }
}

fn effective_revision(
    revisions: &[PageRevisionRecord],
    mode: RenderMode,
) -> Option<&PageRevisionRecord> {
    let eligible = |revision: &&PageRevisionRecord| match mode {
        RenderMode::Published => revision.status == RevisionStatus::Published,
        RenderMode::Preview => matches!(
            revision.status,
            RevisionStatus::Published | RevisionStatus::Draft
        ),
    };
    revisions
        .iter()
        .filter(eligible)
        .max_by_key(|revision| revision.version)
}
