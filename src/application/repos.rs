//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::blocks::{DynamicItem, DynamicSource};
use crate::domain::entities::{
    AnalyticsEventRecord, AssetRecord, AuditLogRecord, DomainRecord, FormRecord,
    FormSubmissionRecord, PageRecord, PageRevisionRecord, PreviewTokenRecord, SectionRecord,
    ThemeRevisionRecord, WebsiteRecord,
};
use crate::domain::types::{DomainStatus, SslStatus, SubmissionStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// A page together with the rows that materialize it.
#[derive(Debug, Clone)]
pub struct PageSeed {
    pub page: PageRecord,
    pub sections: Vec<SectionRecord>,
    pub revision: Option<PageRevisionRecord>,
}

#[derive(Debug, Clone)]
pub struct CreateWebsiteParams {
    pub website: WebsiteRecord,
    pub pages: Vec<PageSeed>,
}

#[derive(Debug, Clone)]
pub struct ApplyTemplateParams {
    pub website_id: Uuid,
    pub template_key: String,
    pub theme_config: Value,
    pub pages: Vec<PageSeed>,
    pub theme_revision: ThemeRevisionRecord,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct UpdatePageParams {
    pub website_id: Uuid,
    pub page_id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct SaveDraftParams {
    pub revision: PageRevisionRecord,
    pub title: Option<String>,
}

/// Everything a publish or rollback writes for one page.
#[derive(Debug, Clone)]
pub struct CommitPageRevisionParams {
    pub revision: PageRevisionRecord,
    pub sections: Vec<SectionRecord>,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct CommitThemeRevisionParams {
    pub revision: ThemeRevisionRecord,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct UpdateAssetParams {
    pub website_id: Uuid,
    pub asset_id: Uuid,
    pub name: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateFormParams {
    pub website_id: Uuid,
    pub form_id: Uuid,
    pub name: String,
    pub schema: Value,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionQueryFilter {
    pub form_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Clone)]
pub struct InsertSubmissionParams {
    pub submission: FormSubmissionRecord,
    pub since: OffsetDateTime,
    pub max_recent: u64,
}

#[derive(Debug, Clone)]
pub enum SubmissionInsert {
    Stored(FormSubmissionRecord),
    Limited { recent: u64 },
}

#[derive(Debug, Clone)]
pub struct UpdateSubmissionStatusParams {
    pub website_id: Uuid,
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct RecordDomainCheckParams {
    pub website_id: Uuid,
    pub domain_id: Uuid,
    pub status: DomainStatus,
    pub ssl_status: SslStatus,
    pub verified_at: Option<OffsetDateTime>,
    pub checked_at: OffsetDateTime,
    pub last_error: Option<String>,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct SetPrimaryDomainParams {
    pub website_id: Uuid,
    pub domain_id: Uuid,
    pub audit: AuditLogRecord,
}

#[derive(Debug, Clone)]
pub struct UpdateDomainRoutingParams {
    pub website_id: Uuid,
    pub domain_id: Uuid,
    pub redirect_to_canonical: bool,
    pub canonical_url: Option<String>,
    pub audit: AuditLogRecord,
}

#[async_trait]
pub trait WebsitesRepo: Send + Sync {
    async fn find_website_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<WebsiteRecord>, RepoError>;

    async fn find_website(&self, website_id: Uuid) -> Result<Option<WebsiteRecord>, RepoError>;

    /// Insert a website with its seed pages. Returns `None` when the tenant
    /// already owns a website; nothing is written in that case.
    async fn create_website(
        &self,
        params: CreateWebsiteParams,
    ) -> Result<Option<WebsiteRecord>, RepoError>;

    /// Replace every page and the theme in one transaction.
    async fn apply_template(&self, params: ApplyTemplateParams)
    -> Result<WebsiteRecord, RepoError>;
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    async fn list_pages(&self, website_id: Uuid) -> Result<Vec<PageRecord>, RepoError>;

    async fn find_page(
        &self,
        website_id: Uuid,
        page_id: Uuid,
    ) -> Result<Option<PageRecord>, RepoError>;

    async fn find_page_by_slug(
        &self,
        website_id: Uuid,
        slug: &str,
    ) -> Result<Option<PageRecord>, RepoError>;

    async fn create_page(&self, seed: PageSeed) -> Result<PageRecord, RepoError>;

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError>;

    async fn list_sections(&self, page_id: Uuid) -> Result<Vec<SectionRecord>, RepoError>;
}

#[async_trait]
pub trait RevisionsRepo: Send + Sync {
    /// Revisions of a page, highest version first.
    async fn list_page_revisions(
        &self,
        page_id: Uuid,
    ) -> Result<Vec<PageRevisionRecord>, RepoError>;

    async fn insert_page_revision(
        &self,
        revision: PageRevisionRecord,
    ) -> Result<PageRevisionRecord, RepoError>;

    /// Whether any page of the website, or its theme, has no revision yet.
    async fn needs_revision_backfill(&self, website_id: Uuid) -> Result<bool, RepoError>;

    async fn save_draft(&self, params: SaveDraftParams) -> Result<PageRevisionRecord, RepoError>;

    /// Archive the published revision, insert the new one as published,
    /// mirror its blocks into sections and append the audit entry.
    async fn commit_page_revision(
        &self,
        params: CommitPageRevisionParams,
    ) -> Result<PageRevisionRecord, RepoError>;

    /// Theme revisions of a website, highest version first.
    async fn list_theme_revisions(
        &self,
        website_id: Uuid,
    ) -> Result<Vec<ThemeRevisionRecord>, RepoError>;

    async fn insert_theme_revision(
        &self,
        revision: ThemeRevisionRecord,
    ) -> Result<ThemeRevisionRecord, RepoError>;

    /// Archive the published theme, insert the new one and point the website at it.
    async fn commit_theme_revision(
        &self,
        params: CommitThemeRevisionParams,
    ) -> Result<ThemeRevisionRecord, RepoError>;
}

#[async_trait]
pub trait AssetsRepo: Send + Sync {
    async fn list_assets(&self, website_id: Uuid) -> Result<Vec<AssetRecord>, RepoError>;

    async fn create_asset(&self, asset: AssetRecord) -> Result<AssetRecord, RepoError>;

    async fn update_asset(&self, params: UpdateAssetParams) -> Result<AssetRecord, RepoError>;

    /// Returns `false` when no asset matched.
    async fn delete_asset(&self, website_id: Uuid, asset_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait FormsRepo: Send + Sync {
    async fn list_forms(&self, website_id: Uuid) -> Result<Vec<FormRecord>, RepoError>;

    async fn find_form(
        &self,
        website_id: Uuid,
        form_id: Uuid,
    ) -> Result<Option<FormRecord>, RepoError>;

    async fn find_form_by_key(
        &self,
        website_id: Uuid,
        key: &str,
    ) -> Result<Option<FormRecord>, RepoError>;

    async fn create_form(&self, form: FormRecord) -> Result<FormRecord, RepoError>;

    async fn update_form(&self, params: UpdateFormParams) -> Result<FormRecord, RepoError>;

    /// Count submissions sharing the form and `ip_hash` since `since` and insert
    /// only while that count is below `max_recent`. Count and insert are atomic
    /// per `(form_id, ip_hash)`.
    async fn insert_submission_within_limit(
        &self,
        params: InsertSubmissionParams,
    ) -> Result<SubmissionInsert, RepoError>;

    /// Newest first.
    async fn list_submissions(
        &self,
        website_id: Uuid,
        filter: &SubmissionQueryFilter,
        limit: u32,
    ) -> Result<Vec<FormSubmissionRecord>, RepoError>;

    async fn update_submission_status(
        &self,
        params: UpdateSubmissionStatusParams,
    ) -> Result<FormSubmissionRecord, RepoError>;
}

#[async_trait]
pub trait DomainsRepo: Send + Sync {
    async fn list_domains(&self, website_id: Uuid) -> Result<Vec<DomainRecord>, RepoError>;

    async fn find_domain(
        &self,
        website_id: Uuid,
        domain_id: Uuid,
    ) -> Result<Option<DomainRecord>, RepoError>;

    async fn find_domain_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Option<DomainRecord>, RepoError>;

    async fn create_domain(&self, domain: DomainRecord) -> Result<DomainRecord, RepoError>;

    async fn delete_domain(&self, website_id: Uuid, domain_id: Uuid) -> Result<bool, RepoError>;

    async fn record_domain_check(
        &self,
        params: RecordDomainCheckParams,
    ) -> Result<DomainRecord, RepoError>;

    /// Clear the primary flag on every other domain of the website and set it
    /// on the target, atomically.
    async fn set_primary_domain(
        &self,
        params: SetPrimaryDomainParams,
    ) -> Result<DomainRecord, RepoError>;

    async fn update_domain_routing(
        &self,
        params: UpdateDomainRoutingParams,
    ) -> Result<DomainRecord, RepoError>;
}

#[async_trait]
pub trait PreviewTokensRepo: Send + Sync {
    async fn create_preview_token(
        &self,
        token: PreviewTokenRecord,
    ) -> Result<PreviewTokenRecord, RepoError>;

    async fn find_preview_token(
        &self,
        token: &str,
    ) -> Result<Option<PreviewTokenRecord>, RepoError>;
}

#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    async fn insert_event(&self, event: AnalyticsEventRecord) -> Result<(), RepoError>;

    /// Events since `since`, newest first, at most `limit` rows.
    async fn list_events_since(
        &self,
        website_id: Uuid,
        since: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AnalyticsEventRecord>, RepoError>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;

    async fn list_logs(
        &self,
        website_id: Uuid,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, RepoError>;
}

/// Read-only view of tenant data owned by other services.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Tenant whose primary domain is exactly `hostname`.
    async fn find_tenant_by_domain(&self, hostname: &str) -> Result<Option<Uuid>, RepoError>;

    async fn count_items(&self, tenant_id: Uuid, source: DynamicSource) -> Result<u64, RepoError>;

    async fn list_items(
        &self,
        tenant_id: Uuid,
        source: DynamicSource,
        limit: usize,
    ) -> Result<Vec<DynamicItem>, RepoError>;
}
