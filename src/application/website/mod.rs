//! Tenant website aggregate: bootstrap, pages, templates, revisions, theme
//! and asset metadata.

mod assets;
pub mod blocks;
pub mod dynamic;
pub mod error;
mod revisions;
mod theme;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::WebsiteAuditService;
use crate::application::repos::{
    AnalyticsRepo, ApplyTemplateParams, AssetsRepo, AuditRepo, CreateWebsiteParams, DomainsRepo,
    FormsRepo, PageSeed, PagesRepo, PreviewTokensRepo, RepoError, RevisionsRepo, TenantDirectory,
    UpdatePageParams, WebsitesRepo,
};
use crate::application::templates::{default_home_blocks, default_theme_config, find_template};
use crate::domain::entities::{
    AuditLogRecord, PageRecord, PageRevisionRecord, SectionRecord, ThemeRevisionRecord,
    WebsiteRecord,
};
use crate::domain::seo::GlobalSeo;
use crate::domain::slug::{generate_unique_slug_async, validate_slug};
use crate::domain::types::RevisionStatus;

pub use assets::{CreateAssetCommand, UpdateAssetCommand};
pub use blocks::{NormalizedBlocks, normalize_blocks};
pub use dynamic::DynamicContent;
pub use error::{BlockIssue, WebsiteError};
pub use revisions::{DraftSaved, SaveDraftCommand};
pub use theme::ThemeView;

use blocks::{blocks_from_sections, sections_from_blocks};

pub const HOME_SLUG: &str = "home";

/// Every persistence port the website services read or write.
#[derive(Clone)]
pub struct WebsiteStores {
    pub websites: Arc<dyn WebsitesRepo>,
    pub pages: Arc<dyn PagesRepo>,
    pub revisions: Arc<dyn RevisionsRepo>,
    pub assets: Arc<dyn AssetsRepo>,
    pub forms: Arc<dyn FormsRepo>,
    pub domains: Arc<dyn DomainsRepo>,
    pub previews: Arc<dyn PreviewTokensRepo>,
    pub analytics: Arc<dyn AnalyticsRepo>,
    pub audit: Arc<dyn AuditRepo>,
    pub tenants: Arc<dyn TenantDirectory>,
}

impl WebsiteStores {
    /// Wire every port to one adapter implementing all of them.
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: WebsitesRepo
            + PagesRepo
            + RevisionsRepo
            + AssetsRepo
            + FormsRepo
            + DomainsRepo
            + PreviewTokensRepo
            + AnalyticsRepo
            + AuditRepo
            + TenantDirectory
            + 'static,
    {
        Self {
            websites: repo.clone(),
            pages: repo.clone(),
            revisions: repo.clone(),
            assets: repo.clone(),
            forms: repo.clone(),
            domains: repo.clone(),
            previews: repo.clone(),
            analytics: repo.clone(),
            audit: repo.clone(),
            tenants: repo,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePageCommand {
    pub title: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePageCommand {
    pub title: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSummary {
    pub id: Uuid,
    pub version: i32,
    pub status: RevisionStatus,
    pub created_at: OffsetDateTime,
}

impl From<&PageRevisionRecord> for RevisionSummary {
    fn from(revision: &PageRevisionRecord) -> Self {
        Self {
            id: revision.id,
            version: revision.version,
            status: revision.status,
            created_at: revision.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    #[serde(flatten)]
    pub page: PageRecord,
    pub latest_revision: Option<RevisionSummary>,
    pub published_version: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteOverview {
    pub website: WebsiteRecord,
    pub seo: GlobalSeo,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetail {
    pub page: PageRecord,
    pub sections: Vec<SectionRecord>,
    pub revisions: Vec<PageRevisionRecord>,
}

#[derive(Clone)]
pub struct WebsiteService {
    websites: Arc<dyn WebsitesRepo>,
    pages: Arc<dyn PagesRepo>,
    revisions: Arc<dyn RevisionsRepo>,
    assets: Arc<dyn AssetsRepo>,
    audit: WebsiteAuditService,
    dynamic: DynamicContent,
}

impl WebsiteService {
    pub fn new(stores: &WebsiteStores) -> Self {
        Self {
            websites: stores.websites.clone(),
            pages: stores.pages.clone(),
            revisions: stores.revisions.clone(),
            assets: stores.assets.clone(),
            audit: WebsiteAuditService::new(stores.audit.clone()),
            dynamic: DynamicContent::new(stores.tenants.clone()),
        }
    }

    pub fn audit(&self) -> &WebsiteAuditService {
        &self.audit
    }

    pub fn dynamic(&self) -> &DynamicContent {
        &self.dynamic
    }

    /// Load the tenant's website, creating it on first access.
    ///
    /// Safe under concurrent first requests: the insert is conditional on the
    /// tenant unique key and the loser re-reads the winner's row.
    pub async fn ensure_website(&self, tenant_id: Uuid) -> Result<WebsiteRecord, WebsiteError> {
        let website = match self.websites.find_website_by_tenant(tenant_id).await? {
            Some(website) => website,
            None => self.create_default_website(tenant_id).await?,
        };

        if self.revisions.needs_revision_backfill(website.id).await? {
            self.backfill_revisions(&website).await?;
        }
        Ok(website)
    }

    pub async fn find_website(
        &self,
        website_id: Uuid,
    ) -> Result<Option<WebsiteRecord>, WebsiteError> {
        Ok(self.websites.find_website(website_id).await?)
    }

    pub async fn website_overview(&self, tenant_id: Uuid) -> Result<WebsiteOverview, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let pages = self.pages.list_pages(website.id).await?;

        let mut summaries = Vec::with_capacity(pages.len());
        for page in pages {
            let revisions = self.revisions.list_page_revisions(page.id).await?;
            summaries.push(PageSummary {
                latest_revision: revisions.first().map(RevisionSummary::from),
                published_version: revisions
                    .iter()
                    .find(|revision| revision.status == RevisionStatus::Published)
                    .map(|revision| revision.version),
                page,
            });
        }

        Ok(WebsiteOverview {
            seo: GlobalSeo::from_theme(&website.theme_config),
            website,
            pages: summaries,
        })
    }

    pub async fn list_pages(&self, tenant_id: Uuid) -> Result<Vec<PageRecord>, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        Ok(self.pages.list_pages(website.id).await?)
    }

    pub async fn get_page(&self, tenant_id: Uuid, page_id: Uuid) -> Result<PageDetail, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;
        let sections = self.pages.list_sections(page.id).await?;
        let revisions = self.revisions.list_page_revisions(page.id).await?;
        Ok(PageDetail {
            page,
            sections,
            revisions,
        })
    }

    /// Create a page with an empty version-1 draft.
    pub async fn create_page(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        command: CreatePageCommand,
    ) -> Result<PageRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let title = required_text("title", &command.title)?;

        let slug = match command
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
        {
            Some(slug) => {
                validate_slug(slug)?;
                self.ensure_slug_available(website.id, slug, None).await?;
                slug.to_string()
            }
            None => {
                let pages = self.pages.clone();
                let website_id = website.id;
                generate_unique_slug_async(&title, move |candidate| {
                    let pages = pages.clone();
                    let candidate = candidate.to_string();
                    async move {
                        pages
                            .find_page_by_slug(website_id, &candidate)
                            .await
                            .map(|existing| existing.is_none())
                    }
                })
                .await?
            }
        };

        let now = OffsetDateTime::now_utc();
        let page = PageRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            slug,
            title,
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        let revision = PageRevisionRecord {
            id: Uuid::new_v4(),
            page_id: page.id,
            version: 1,
            status: RevisionStatus::Draft,
            content: json!({ "blocks": [] }),
            seo: None,
            change_summary: Some("Page created".to_string()),
            created_by: actor.map(str::to_string),
            created_at: now,
        };

        let page = self
            .pages
            .create_page(PageSeed {
                page,
                sections: Vec::new(),
                revision: Some(revision),
            })
            .await?;

        self.audit
            .record(
                website.id,
                Some(page.id),
                actor,
                "page.create",
                &json!({ "slug": page.slug, "title": page.title }),
            )
            .await?;

        Ok(page)
    }

    pub async fn update_page(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        page_id: Uuid,
        command: UpdatePageCommand,
    ) -> Result<PageRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;

        let title = match command.title.as_deref() {
            Some(title) => required_text("title", title)?,
            None => page.title.clone(),
        };
        let slug = match command.slug.as_deref().map(str::trim) {
            Some(slug) if slug != page.slug => {
                validate_slug(slug)?;
                self.ensure_slug_available(website.id, slug, Some(page.id))
                    .await?;
                slug.to_string()
            }
            _ => page.slug.clone(),
        };

        let updated = self
            .pages
            .update_page(UpdatePageParams {
                website_id: website.id,
                page_id: page.id,
                title,
                slug,
            })
            .await?;

        self.audit
            .record(
                website.id,
                Some(page.id),
                actor,
                "page.update",
                &json!({
                    "before": { "slug": page.slug, "title": page.title },
                    "after": { "slug": updated.slug, "title": updated.title },
                }),
            )
            .await?;

        Ok(updated)
    }

    /// Replace all pages and the theme with a catalog template.
    pub async fn apply_template(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        template_key: &str,
    ) -> Result<WebsiteRecord, WebsiteError> {
        let template = find_template(template_key).ok_or(WebsiteError::not_found("template"))?;
        let website = self.ensure_website(tenant_id).await?;
        let now = OffsetDateTime::now_utc();

        let mut pages = Vec::with_capacity(template.pages.len());
        for seed in &template.pages {
            let page_id = Uuid::new_v4();
            let normalized = normalize_blocks(&Value::Array(seed.blocks.clone()));
            let content = crate::domain::blocks::blocks_to_content(&normalized.blocks);
            pages.push(PageSeed {
                page: PageRecord {
                    id: page_id,
                    website_id: website.id,
                    slug: seed.slug.to_string(),
                    title: seed.title.to_string(),
                    is_published: true,
                    created_at: now,
                    updated_at: now,
                },
                sections: sections_from_blocks(page_id, &normalized.blocks),
                revision: Some(PageRevisionRecord {
                    id: Uuid::new_v4(),
                    page_id,
                    version: 1,
                    status: RevisionStatus::Published,
                    content,
                    seo: Some(seed.seo.clone()),
                    change_summary: Some(format!("Seeded from template {}", template.key)),
                    created_by: actor.map(str::to_string),
                    created_at: now,
                }),
            });
        }

        let theme_version = self.next_theme_version(website.id).await?;
        let theme_revision = ThemeRevisionRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            version: theme_version,
            status: RevisionStatus::Published,
            theme_config: template.theme_config.clone(),
            change_summary: Some(format!("Applied template {}", template.key)),
            created_by: actor.map(str::to_string),
            created_at: now,
        };

        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            "template.apply",
            &json!({
                "templateKey": template.key,
                "previousTemplateKey": website.template_key,
                "pages": template.pages.iter().map(|page| page.slug).collect::<Vec<_>>(),
                "themeVersion": theme_version,
            }),
        );

        let updated = self
            .websites
            .apply_template(ApplyTemplateParams {
                website_id: website.id,
                template_key: template.key.to_string(),
                theme_config: template.theme_config.clone(),
                pages,
                theme_revision,
                audit,
            })
            .await?;

        metrics::counter!("vestry_template_apply_total").increment(1);
        info!(
            target = "vestry::website::templates",
            website_id = %website.id,
            template = template.key,
            "template applied"
        );

        Ok(updated)
    }

    pub async fn list_audit_logs(
        &self,
        tenant_id: Uuid,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        Ok(self.audit.list_recent(website.id, limit).await?)
    }

    pub(crate) async fn require_page(
        &self,
        website: &WebsiteRecord,
        page_id: Uuid,
    ) -> Result<PageRecord, WebsiteError> {
        self.pages
            .find_page(website.id, page_id)
            .await?
            .ok_or(WebsiteError::not_found("page"))
    }

    async fn ensure_slug_available(
        &self,
        website_id: Uuid,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<(), WebsiteError> {
        match self.pages.find_page_by_slug(website_id, slug).await? {
            Some(existing) if Some(existing.id) != except => Err(WebsiteError::validation(
                format!("slug `{slug}` is already used by another page"),
            )),
            _ => Ok(()),
        }
    }

    async fn create_default_website(&self, tenant_id: Uuid) -> Result<WebsiteRecord, WebsiteError> {
        let now = OffsetDateTime::now_utc();
        let website = WebsiteRecord {
            id: Uuid::new_v4(),
            tenant_id,
            theme_config: default_theme_config(),
            template_key: None,
            created_at: now,
            updated_at: now,
        };

        let home_id = Uuid::new_v4();
        let home_blocks = normalize_blocks(&Value::Array(default_home_blocks())).blocks;
        let home = PageSeed {
            page: PageRecord {
                id: home_id,
                website_id: website.id,
                slug: HOME_SLUG.to_string(),
                title: "Home".to_string(),
                is_published: true,
                created_at: now,
                updated_at: now,
            },
            sections: sections_from_blocks(home_id, &home_blocks),
            revision: None,
        };

        let created = self
            .websites
            .create_website(CreateWebsiteParams {
                website,
                pages: vec![home],
            })
            .await?;

        match created {
            Some(website) => {
                metrics::counter!("vestry_website_created_total").increment(1);
                info!(
                    target = "vestry::website::bootstrap",
                    tenant_id = %tenant_id,
                    website_id = %website.id,
                    "website created"
                );
                Ok(website)
            }
            None => self
                .websites
                .find_website_by_tenant(tenant_id)
                .await?
                .ok_or_else(|| {
                    WebsiteError::Repo(RepoError::Integrity {
                        message: format!("website for tenant {tenant_id} vanished after conflict"),
                    })
                }),
        }
    }

    /// Give every page and the theme an initial revision when they have none.
    async fn backfill_revisions(&self, website: &WebsiteRecord) -> Result<(), WebsiteError> {
        let now = OffsetDateTime::now_utc();

        for page in self.pages.list_pages(website.id).await? {
            if !self.revisions.list_page_revisions(page.id).await?.is_empty() {
                continue;
            }
            let sections = self.pages.list_sections(page.id).await?;
            let revision = PageRevisionRecord {
                id: Uuid::new_v4(),
                page_id: page.id,
                version: 1,
                status: if page.is_published {
                    RevisionStatus::Published
                } else {
                    RevisionStatus::Draft
                },
                content: json!({ "blocks": blocks_from_sections(&sections) }),
                seo: None,
                change_summary: Some("Initial revision".to_string()),
                created_by: None,
                created_at: now,
            };
            ignore_duplicate(self.revisions.insert_page_revision(revision).await)?;
        }

        if self
            .revisions
            .list_theme_revisions(website.id)
            .await?
            .is_empty()
        {
            let revision = ThemeRevisionRecord {
                id: Uuid::new_v4(),
                website_id: website.id,
                version: 1,
                status: RevisionStatus::Published,
                theme_config: website.theme_config.clone(),
                change_summary: Some("Initial theme".to_string()),
                created_by: None,
                created_at: now,
            };
            ignore_duplicate(self.revisions.insert_theme_revision(revision).await)?;
        }

        Ok(())
    }

    pub(crate) async fn next_theme_version(&self, website_id: Uuid) -> Result<i32, WebsiteError> {
        Ok(self
            .revisions
            .list_theme_revisions(website_id)
            .await?
            .iter()
            .map(|revision| revision.version)
            .max()
            .unwrap_or(0)
            + 1)
    }
}

/// A concurrent backfill that already inserted version 1 is not an error.
fn ignore_duplicate<T>(result: Result<T, RepoError>) -> Result<(), WebsiteError> {
    match result {
        Ok(_) | Err(RepoError::Duplicate { .. }) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> Result<String, WebsiteError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(WebsiteError::validation(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}
