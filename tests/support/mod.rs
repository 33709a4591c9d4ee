//! In-memory adapters standing in for Postgres and DNS in integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use vestry::application::analytics::AnalyticsService;
use vestry::application::dns::{TxtLookup, TxtResolver};
use vestry::application::domains::{DomainService, DomainSettings};
use vestry::application::forms::{FormService, SubmissionPolicy};
use vestry::application::public::PublicSiteService;
use vestry::application::public::sitemap::SitemapService;
use vestry::application::repos::{
    AnalyticsRepo, ApplyTemplateParams, AssetsRepo, AuditRepo, CommitPageRevisionParams,
    CommitThemeRevisionParams, CreateWebsiteParams, DomainsRepo, FormsRepo,
    InsertSubmissionParams, PageSeed, PagesRepo, PreviewTokensRepo, RecordDomainCheckParams,
    RepoError, RevisionsRepo, SaveDraftParams, SetPrimaryDomainParams, SubmissionInsert,
    SubmissionQueryFilter, TenantDirectory, UpdateAssetParams, UpdateDomainRoutingParams,
    UpdateFormParams, UpdatePageParams, UpdateSubmissionStatusParams, WebsitesRepo,
};
use vestry::application::website::{WebsiteService, WebsiteStores};
use vestry::domain::blocks::{DynamicItem, DynamicSource};
use vestry::domain::entities::{
    AnalyticsEventRecord, AssetRecord, AuditLogRecord, DomainRecord, FormRecord,
    FormSubmissionRecord, PageRecord, PageRevisionRecord, PreviewTokenRecord, SectionRecord,
    ThemeRevisionRecord, WebsiteRecord,
};
use vestry::domain::types::RevisionStatus;

pub const PLATFORM_APEX: &str = "vestry.site";
pub const HASH_SALT: &str = "test-salt";

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

#[derive(Default)]
struct State {
    websites: Vec<WebsiteRecord>,
    pages: Vec<PageRecord>,
    sections: Vec<SectionRecord>,
    page_revisions: Vec<PageRevisionRecord>,
    theme_revisions: Vec<ThemeRevisionRecord>,
    assets: Vec<AssetRecord>,
    forms: Vec<FormRecord>,
    submissions: Vec<FormSubmissionRecord>,
    domains: Vec<DomainRecord>,
    previews: Vec<PreviewTokenRecord>,
    events: Vec<AnalyticsEventRecord>,
    audit: Vec<AuditLogRecord>,
    tenant_domains: HashMap<String, Uuid>,
    items: HashMap<(Uuid, DynamicSource), Vec<DynamicItem>>,
    page_revision_reads: usize,
}

impl State {
    fn insert_seed(&mut self, seed: PageSeed) -> Result<PageRecord, RepoError> {
        if self
            .pages
            .iter()
            .any(|page| page.website_id == seed.page.website_id && page.slug == seed.page.slug)
        {
            return Err(duplicate("website_pages_website_id_slug_key"));
        }
        self.pages.push(seed.page.clone());
        self.sections.extend(seed.sections);
        if let Some(revision) = seed.revision {
            self.push_page_revision(revision)?;
        }
        Ok(seed.page)
    }

    fn push_page_revision(&mut self, revision: PageRevisionRecord) -> Result<(), RepoError> {
        if self
            .page_revisions
            .iter()
            .any(|existing| existing.page_id == revision.page_id && existing.version == revision.version)
        {
            return Err(duplicate("website_page_revisions_page_id_version_key"));
        }
        self.page_revisions.push(revision);
        Ok(())
    }

    fn push_theme_revision(&mut self, revision: ThemeRevisionRecord) -> Result<(), RepoError> {
        if self.theme_revisions.iter().any(|existing| {
            existing.website_id == revision.website_id && existing.version == revision.version
        }) {
            return Err(duplicate("website_theme_revisions_website_id_version_key"));
        }
        self.theme_revisions.push(revision);
        Ok(())
    }

    fn archive_published_theme(&mut self, website_id: Uuid) {
        for revision in self
            .theme_revisions
            .iter_mut()
            .filter(|revision| revision.website_id == website_id)
            .filter(|revision| revision.status == RevisionStatus::Published)
        {
            revision.status = RevisionStatus::Archived;
        }
    }

    fn domain_mut(&mut self, website_id: Uuid, domain_id: Uuid) -> Result<&mut DomainRecord, RepoError> {
        self.domains
            .iter_mut()
            .find(|domain| domain.website_id == website_id && domain.id == domain_id)
            .ok_or(RepoError::NotFound)
    }
}

/// Every repository port over one mutex-guarded state, with the same unique
/// keys the Postgres schema declares.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `hostname` the tenant's primary domain in the tenant directory.
    pub async fn bind_tenant_domain(&self, hostname: &str, tenant_id: Uuid) {
        self.state
            .lock()
            .await
            .tenant_domains
            .insert(hostname.to_string(), tenant_id);
    }

    pub async fn set_items(&self, tenant_id: Uuid, source: DynamicSource, titles: &[&str]) {
        let items = titles
            .iter()
            .enumerate()
            .map(|(index, title)| DynamicItem {
                id: format!("{}-{index}", source.as_str()),
                title: (*title).to_string(),
                subtitle: None,
                date: None,
                url: None,
                image_url: None,
            })
            .collect();
        self.state.lock().await.items.insert((tenant_id, source), items);
    }

    pub async fn audit_actions(&self, website_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .await
            .audit
            .iter()
            .filter(|entry| entry.website_id == website_id)
            .map(|entry| entry.action.clone())
            .collect()
    }

    pub async fn events(&self) -> Vec<AnalyticsEventRecord> {
        self.state.lock().await.events.clone()
    }

    pub async fn submissions(&self) -> Vec<FormSubmissionRecord> {
        self.state.lock().await.submissions.clone()
    }

    /// Number of `list_page_revisions` calls served so far.
    pub async fn page_revision_reads(&self) -> usize {
        self.state.lock().await.page_revision_reads
    }

    /// Add a page with no revision history, as rows written by older releases look.
    pub async fn insert_bare_page(&self, website_id: Uuid, slug: &str) -> Uuid {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.state.lock().await.pages.push(PageRecord {
            id,
            website_id,
            slug: slug.to_string(),
            title: slug.to_string(),
            is_published: false,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub async fn website_count(&self) -> usize {
        self.state.lock().await.websites.len()
    }

    /// Force a preview token past its expiry.
    pub async fn expire_preview(&self, token: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.previews.iter_mut().find(|record| record.token == token) {
            record.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        }
    }

    /// Backdate every stored submission, as if the rate window had elapsed.
    pub async fn age_submissions(&self, by: time::Duration) {
        for submission in self.state.lock().await.submissions.iter_mut() {
            submission.created_at -= by;
        }
    }
}

#[async_trait]
impl WebsitesRepo for MemoryStore {
    async fn find_website_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<WebsiteRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .websites
            .iter()
            .find(|website| website.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_website(&self, website_id: Uuid) -> Result<Option<WebsiteRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .websites
            .iter()
            .find(|website| website.id == website_id)
            .cloned())
    }

    async fn create_website(
        &self,
        params: CreateWebsiteParams,
    ) -> Result<Option<WebsiteRecord>, RepoError> {
        let mut state = self.state.lock().await;
        if state
            .websites
            .iter()
            .any(|website| website.tenant_id == params.website.tenant_id)
        {
            return Ok(None);
        }
        state.websites.push(params.website.clone());
        for seed in params.pages {
            state.insert_seed(seed)?;
        }
        Ok(Some(params.website))
    }

    async fn apply_template(
        &self,
        params: ApplyTemplateParams,
    ) -> Result<WebsiteRecord, RepoError> {
        let mut state = self.state.lock().await;
        if !state.websites.iter().any(|website| website.id == params.website_id) {
            return Err(RepoError::NotFound);
        }

        let removed: Vec<Uuid> = state
            .pages
            .iter()
            .filter(|page| page.website_id == params.website_id)
            .map(|page| page.id)
            .collect();
        state.pages.retain(|page| !removed.contains(&page.id));
        state.sections.retain(|section| !removed.contains(&section.page_id));
        state
            .page_revisions
            .retain(|revision| !removed.contains(&revision.page_id));

        for seed in params.pages {
            state.insert_seed(seed)?;
        }
        state.archive_published_theme(params.website_id);
        state.push_theme_revision(params.theme_revision)?;
        state.audit.push(params.audit);

        let website = state
            .websites
            .iter_mut()
            .find(|website| website.id == params.website_id)
            .ok_or(RepoError::NotFound)?;
        website.theme_config = params.theme_config;
        website.template_key = Some(params.template_key);
        website.updated_at = OffsetDateTime::now_utc();
        Ok(website.clone())
    }
}

#[async_trait]
impl PagesRepo for MemoryStore {
    async fn list_pages(&self, website_id: Uuid) -> Result<Vec<PageRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut pages: Vec<PageRecord> = state
            .pages
            .iter()
            .filter(|page| page.website_id == website_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.slug.cmp(&b.slug)));
        Ok(pages)
    }

    async fn find_page(
        &self,
        website_id: Uuid,
        page_id: Uuid,
    ) -> Result<Option<PageRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .pages
            .iter()
            .find(|page| page.website_id == website_id && page.id == page_id)
            .cloned())
    }

    async fn find_page_by_slug(
        &self,
        website_id: Uuid,
        slug: &str,
    ) -> Result<Option<PageRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .pages
            .iter()
            .find(|page| page.website_id == website_id && page.slug == slug)
            .cloned())
    }

    async fn create_page(&self, seed: PageSeed) -> Result<PageRecord, RepoError> {
        self.state.lock().await.insert_seed(seed)
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.pages.iter().any(|page| {
            page.website_id == params.website_id
                && page.slug == params.slug
                && page.id != params.page_id
        }) {
            return Err(duplicate("website_pages_website_id_slug_key"));
        }
        let page = state
            .pages
            .iter_mut()
            .find(|page| page.website_id == params.website_id && page.id == params.page_id)
            .ok_or(RepoError::NotFound)?;
        page.title = params.title;
        page.slug = params.slug;
        page.updated_at = OffsetDateTime::now_utc();
        Ok(page.clone())
    }

    async fn list_sections(&self, page_id: Uuid) -> Result<Vec<SectionRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut sections: Vec<SectionRecord> = state
            .sections
            .iter()
            .filter(|section| section.page_id == page_id)
            .cloned()
            .collect();
        sections.sort_by_key(|section| section.position);
        Ok(sections)
    }
}

#[async_trait]
impl RevisionsRepo for MemoryStore {
    async fn list_page_revisions(
        &self,
        page_id: Uuid,
    ) -> Result<Vec<PageRevisionRecord>, RepoError> {
        let mut state = self.state.lock().await;
        state.page_revision_reads += 1;
        let mut revisions: Vec<PageRevisionRecord> = state
            .page_revisions
            .iter()
            .filter(|revision| revision.page_id == page_id)
            .cloned()
            .collect();
        revisions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(revisions)
    }

    async fn needs_revision_backfill(&self, website_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        let bare_page = state
            .pages
            .iter()
            .filter(|page| page.website_id == website_id)
            .any(|page| {
                !state
                    .page_revisions
                    .iter()
                    .any(|revision| revision.page_id == page.id)
            });
        let no_theme = !state
            .theme_revisions
            .iter()
            .any(|revision| revision.website_id == website_id);
        Ok(bare_page || no_theme)
    }

    async fn insert_page_revision(
        &self,
        revision: PageRevisionRecord,
    ) -> Result<PageRevisionRecord, RepoError> {
        self.state
            .lock()
            .await
            .push_page_revision(revision.clone())?;
        Ok(revision)
    }

    async fn save_draft(&self, params: SaveDraftParams) -> Result<PageRevisionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let page_id = params.revision.page_id;
        if !state.pages.iter().any(|page| page.id == page_id) {
            return Err(RepoError::NotFound);
        }
        state.push_page_revision(params.revision.clone())?;
        if let Some(title) = params.title
            && let Some(page) = state.pages.iter_mut().find(|page| page.id == page_id)
        {
            page.title = title;
            page.updated_at = OffsetDateTime::now_utc();
        }
        Ok(params.revision)
    }

    async fn commit_page_revision(
        &self,
        params: CommitPageRevisionParams,
    ) -> Result<PageRevisionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let page_id = params.revision.page_id;
        if state.page_revisions.iter().any(|existing| {
            existing.page_id == page_id && existing.version == params.revision.version
        }) {
            return Err(duplicate("website_page_revisions_page_id_version_key"));
        }

        for revision in state
            .page_revisions
            .iter_mut()
            .filter(|revision| revision.page_id == page_id)
            .filter(|revision| revision.status == RevisionStatus::Published)
        {
            revision.status = RevisionStatus::Archived;
        }
        state.page_revisions.push(params.revision.clone());
        state.sections.retain(|section| section.page_id != page_id);
        state.sections.extend(params.sections);
        if let Some(page) = state.pages.iter_mut().find(|page| page.id == page_id) {
            page.is_published = true;
            page.updated_at = OffsetDateTime::now_utc();
        }
        state.audit.push(params.audit);
        Ok(params.revision)
    }

    async fn list_theme_revisions(
        &self,
        website_id: Uuid,
    ) -> Result<Vec<ThemeRevisionRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut revisions: Vec<ThemeRevisionRecord> = state
            .theme_revisions
            .iter()
            .filter(|revision| revision.website_id == website_id)
            .cloned()
            .collect();
        revisions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(revisions)
    }

    async fn insert_theme_revision(
        &self,
        revision: ThemeRevisionRecord,
    ) -> Result<ThemeRevisionRecord, RepoError> {
        self.state
            .lock()
            .await
            .push_theme_revision(revision.clone())?;
        Ok(revision)
    }

    async fn commit_theme_revision(
        &self,
        params: CommitThemeRevisionParams,
    ) -> Result<ThemeRevisionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let website_id = params.revision.website_id;
        if state.theme_revisions.iter().any(|existing| {
            existing.website_id == website_id && existing.version == params.revision.version
        }) {
            return Err(duplicate("website_theme_revisions_website_id_version_key"));
        }
        state.archive_published_theme(website_id);
        state.theme_revisions.push(params.revision.clone());
        let website = state
            .websites
            .iter_mut()
            .find(|website| website.id == website_id)
            .ok_or(RepoError::NotFound)?;
        website.theme_config = params.revision.theme_config.clone();
        website.updated_at = OffsetDateTime::now_utc();
        state.audit.push(params.audit);
        Ok(params.revision)
    }
}

#[async_trait]
impl AssetsRepo for MemoryStore {
    async fn list_assets(&self, website_id: Uuid) -> Result<Vec<AssetRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .assets
            .iter()
            .rev()
            .filter(|asset| asset.website_id == website_id)
            .cloned()
            .collect())
    }

    async fn create_asset(&self, asset: AssetRecord) -> Result<AssetRecord, RepoError> {
        self.state.lock().await.assets.push(asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, params: UpdateAssetParams) -> Result<AssetRecord, RepoError> {
        let mut state = self.state.lock().await;
        let asset = state
            .assets
            .iter_mut()
            .find(|asset| asset.website_id == params.website_id && asset.id == params.asset_id)
            .ok_or(RepoError::NotFound)?;
        asset.name = params.name;
        asset.alt_text = params.alt_text;
        asset.updated_at = OffsetDateTime::now_utc();
        Ok(asset.clone())
    }

    async fn delete_asset(&self, website_id: Uuid, asset_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.assets.len();
        state
            .assets
            .retain(|asset| !(asset.website_id == website_id && asset.id == asset_id));
        Ok(state.assets.len() != before)
    }
}

#[async_trait]
impl FormsRepo for MemoryStore {
    async fn list_forms(&self, website_id: Uuid) -> Result<Vec<FormRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut forms: Vec<FormRecord> = state
            .forms
            .iter()
            .filter(|form| form.website_id == website_id)
            .cloned()
            .collect();
        forms.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(forms)
    }

    async fn find_form(
        &self,
        website_id: Uuid,
        form_id: Uuid,
    ) -> Result<Option<FormRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .forms
            .iter()
            .find(|form| form.website_id == website_id && form.id == form_id)
            .cloned())
    }

    async fn find_form_by_key(
        &self,
        website_id: Uuid,
        key: &str,
    ) -> Result<Option<FormRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .forms
            .iter()
            .find(|form| form.website_id == website_id && form.key == key)
            .cloned())
    }

    async fn create_form(&self, form: FormRecord) -> Result<FormRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state
            .forms
            .iter()
            .any(|existing| existing.website_id == form.website_id && existing.key == form.key)
        {
            return Err(duplicate("website_forms_website_id_key_key"));
        }
        state.forms.push(form.clone());
        Ok(form)
    }

    async fn update_form(&self, params: UpdateFormParams) -> Result<FormRecord, RepoError> {
        let mut state = self.state.lock().await;
        let form = state
            .forms
            .iter_mut()
            .find(|form| form.website_id == params.website_id && form.id == params.form_id)
            .ok_or(RepoError::NotFound)?;
        form.name = params.name;
        form.schema = params.schema;
        form.is_active = params.is_active;
        form.updated_at = OffsetDateTime::now_utc();
        Ok(form.clone())
    }

    async fn insert_submission_within_limit(
        &self,
        params: InsertSubmissionParams,
    ) -> Result<SubmissionInsert, RepoError> {
        let mut state = self.state.lock().await;
        let submission = params.submission;
        let recent = state
            .submissions
            .iter()
            .filter(|existing| existing.form_id == submission.form_id)
            .filter(|existing| existing.ip_hash == submission.ip_hash)
            .filter(|existing| existing.created_at >= params.since)
            .count() as u64;
        if recent >= params.max_recent {
            return Ok(SubmissionInsert::Limited { recent });
        }
        state.submissions.push(submission.clone());
        Ok(SubmissionInsert::Stored(submission))
    }

    async fn list_submissions(
        &self,
        website_id: Uuid,
        filter: &SubmissionQueryFilter,
        limit: u32,
    ) -> Result<Vec<FormSubmissionRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut submissions: Vec<FormSubmissionRecord> = state
            .submissions
            .iter()
            .rev()
            .filter(|submission| submission.website_id == website_id)
            .filter(|submission| filter.form_id.is_none_or(|id| submission.form_id == id))
            .filter(|submission| filter.status.is_none_or(|status| submission.status == status))
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        submissions.truncate(limit as usize);
        Ok(submissions)
    }

    async fn update_submission_status(
        &self,
        params: UpdateSubmissionStatusParams,
    ) -> Result<FormSubmissionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let submission = state
            .submissions
            .iter_mut()
            .find(|submission| {
                submission.website_id == params.website_id && submission.id == params.submission_id
            })
            .ok_or(RepoError::NotFound)?;
        submission.status = params.status;
        submission.updated_at = OffsetDateTime::now_utc();
        let updated = submission.clone();
        state.audit.push(params.audit);
        Ok(updated)
    }
}

#[async_trait]
impl DomainsRepo for MemoryStore {
    async fn list_domains(&self, website_id: Uuid) -> Result<Vec<DomainRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut domains: Vec<DomainRecord> = state
            .domains
            .iter()
            .filter(|domain| domain.website_id == website_id)
            .cloned()
            .collect();
        domains.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });
        Ok(domains)
    }

    async fn find_domain(
        &self,
        website_id: Uuid,
        domain_id: Uuid,
    ) -> Result<Option<DomainRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .domains
            .iter()
            .find(|domain| domain.website_id == website_id && domain.id == domain_id)
            .cloned())
    }

    async fn find_domain_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Option<DomainRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .domains
            .iter()
            .find(|domain| domain.hostname == hostname)
            .cloned())
    }

    async fn create_domain(&self, domain: DomainRecord) -> Result<DomainRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state
            .domains
            .iter()
            .any(|existing| existing.hostname == domain.hostname)
        {
            return Err(duplicate("website_domains_hostname_key"));
        }
        state.domains.push(domain.clone());
        Ok(domain)
    }

    async fn delete_domain(&self, website_id: Uuid, domain_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.domains.len();
        state
            .domains
            .retain(|domain| !(domain.website_id == website_id && domain.id == domain_id));
        Ok(state.domains.len() != before)
    }

    async fn record_domain_check(
        &self,
        params: RecordDomainCheckParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut state = self.state.lock().await;
        let domain = state.domain_mut(params.website_id, params.domain_id)?;
        domain.status = params.status;
        domain.ssl_status = params.ssl_status;
        domain.verified_at = params.verified_at;
        domain.last_checked_at = Some(params.checked_at);
        domain.last_error = params.last_error;
        domain.updated_at = params.checked_at;
        let updated = domain.clone();
        state.audit.push(params.audit);
        Ok(updated)
    }

    async fn set_primary_domain(
        &self,
        params: SetPrimaryDomainParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.domain_mut(params.website_id, params.domain_id)?;
        for domain in state
            .domains
            .iter_mut()
            .filter(|domain| domain.website_id == params.website_id)
        {
            domain.is_primary = domain.id == params.domain_id;
        }
        let updated = state.domain_mut(params.website_id, params.domain_id)?.clone();
        state.audit.push(params.audit);
        Ok(updated)
    }

    async fn update_domain_routing(
        &self,
        params: UpdateDomainRoutingParams,
    ) -> Result<DomainRecord, RepoError> {
        let mut state = self.state.lock().await;
        let domain = state.domain_mut(params.website_id, params.domain_id)?;
        domain.redirect_to_canonical = params.redirect_to_canonical;
        domain.canonical_url = params.canonical_url;
        domain.updated_at = OffsetDateTime::now_utc();
        let updated = domain.clone();
        state.audit.push(params.audit);
        Ok(updated)
    }
}

#[async_trait]
impl PreviewTokensRepo for MemoryStore {
    async fn create_preview_token(
        &self,
        token: PreviewTokenRecord,
    ) -> Result<PreviewTokenRecord, RepoError> {
        self.state.lock().await.previews.push(token.clone());
        Ok(token)
    }

    async fn find_preview_token(
        &self,
        token: &str,
    ) -> Result<Option<PreviewTokenRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .previews
            .iter()
            .find(|record| record.token == token)
            .cloned())
    }
}

#[async_trait]
impl AnalyticsRepo for MemoryStore {
    async fn insert_event(&self, event: AnalyticsEventRecord) -> Result<(), RepoError> {
        self.state.lock().await.events.push(event);
        Ok(())
    }

    async fn list_events_since(
        &self,
        website_id: Uuid,
        since: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AnalyticsEventRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut events: Vec<AnalyticsEventRecord> = state
            .events
            .iter()
            .rev()
            .filter(|event| event.website_id == website_id && event.created_at >= since)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit as usize);
        Ok(events)
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.state.lock().await.audit.push(record);
        Ok(())
    }

    async fn list_logs(
        &self,
        website_id: Uuid,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.website_id == website_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn find_tenant_by_domain(&self, hostname: &str) -> Result<Option<Uuid>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.tenant_domains.get(hostname).copied())
    }

    async fn count_items(&self, tenant_id: Uuid, source: DynamicSource) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .get(&(tenant_id, source))
            .map(|items| items.len() as u64)
            .unwrap_or(0))
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        source: DynamicSource,
        limit: usize,
    ) -> Result<Vec<DynamicItem>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .get(&(tenant_id, source))
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// TXT answers keyed by the queried name; unknown names have no records.
#[derive(Default)]
pub struct FakeTxtResolver {
    answers: Mutex<HashMap<String, TxtLookup>>,
}

impl FakeTxtResolver {
    pub async fn answer(&self, name: &str, lookup: TxtLookup) {
        self.answers.lock().await.insert(name.to_string(), lookup);
    }
}

#[async_trait]
impl TxtResolver for FakeTxtResolver {
    async fn lookup_txt(&self, name: &str) -> TxtLookup {
        self.answers
            .lock()
            .await
            .get(name)
            .cloned()
            .unwrap_or(TxtLookup::NoRecords)
    }
}

/// Every service wired to one in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub dns: Arc<FakeTxtResolver>,
    pub website: WebsiteService,
    pub site: PublicSiteService,
    pub sitemap: SitemapService,
    pub forms: FormService,
    pub domains: DomainService,
    pub analytics: AnalyticsService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(SubmissionPolicy::default())
    }

    pub fn with_policy(policy: SubmissionPolicy) -> Self {
        let store = MemoryStore::new();
        let stores = WebsiteStores::from_shared(store.clone());
        let website = WebsiteService::new(&stores);
        let site = PublicSiteService::new(&stores, website.clone(), time::Duration::hours(1));
        let resolver = site.resolver().clone();
        let sitemap = SitemapService::new(&stores, resolver.clone());
        let forms = FormService::new(&stores, website.clone(), resolver.clone(), policy, HASH_SALT);
        let dns = Arc::new(FakeTxtResolver::default());
        let domains = DomainService::new(
            &stores,
            website.clone(),
            dns.clone(),
            DomainSettings {
                platform_apex: PLATFORM_APEX.to_string(),
                verification_prefix: "_verify".to_string(),
            },
        );
        let analytics = AnalyticsService::new(&stores, website.clone(), resolver, HASH_SALT);

        Self {
            store,
            dns,
            website,
            site,
            sitemap,
            forms,
            domains,
            analytics,
        }
    }

    /// A fresh tenant whose primary domain is `hostname`.
    pub async fn tenant(&self, hostname: &str) -> Uuid {
        let tenant_id = Uuid::new_v4();
        self.store.bind_tenant_domain(hostname, tenant_id).await;
        tenant_id
    }
}
