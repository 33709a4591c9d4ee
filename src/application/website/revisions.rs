//! Draft, publish and rollback of page revisions.
//!
//! Revisions are insert-only. Publishing or rolling back never edits an
//! existing row: the current published revision is archived and a new one is
//! appended at the next version, so history only grows.

use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::audit::WebsiteAuditService;
use crate::application::repos::{CommitPageRevisionParams, RepoError, SaveDraftParams};
use crate::domain::entities::PageRevisionRecord;
use crate::domain::types::RevisionStatus;

use super::blocks::{content_blocks, normalize_blocks, sections_from_blocks};
use super::{WebsiteError, WebsiteService, required_text};

#[derive(Debug, Clone, Default)]
pub struct SaveDraftCommand {
    pub content: Option<Value>,
    /// `Some(Value::Null)` clears SEO explicitly; `None` leaves it unset.
    pub seo: Option<Value>,
    pub title: Option<String>,
    pub change_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSaved {
    pub revision: PageRevisionRecord,
    pub warnings: Vec<String>,
}

impl WebsiteService {
    pub async fn list_revisions(
        &self,
        tenant_id: Uuid,
        page_id: Uuid,
    ) -> Result<Vec<PageRevisionRecord>, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;
        Ok(self.revisions.list_page_revisions(page.id).await?)
    }

    pub async fn save_draft(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        page_id: Uuid,
        command: SaveDraftCommand,
    ) -> Result<DraftSaved, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;

        let mut content = match command.content {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(WebsiteError::validation("content must be an object")),
            None => return Err(WebsiteError::validation("content is required")),
        };
        if let Some(seo) = &command.seo
            && !(seo.is_object() || seo.is_null())
        {
            return Err(WebsiteError::validation("seo must be an object or null"));
        }
        let title = command
            .title
            .as_deref()
            .map(|title| required_text("title", title))
            .transpose()?;

        let normalized = normalize_blocks(content.get("blocks").unwrap_or(&Value::Null));
        content.insert(
            "blocks".into(),
            Value::Array(normalized.blocks.iter().map(|block| block.to_value()).collect()),
        );

        let revisions = self.revisions.list_page_revisions(page.id).await?;
        let revision = PageRevisionRecord {
            id: Uuid::new_v4(),
            page_id: page.id,
            version: next_version(&revisions),
            status: RevisionStatus::Draft,
            content: Value::Object(content),
            seo: command.seo,
            change_summary: trimmed(command.change_summary),
            created_by: actor.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };

        let revision = self
            .revisions
            .save_draft(SaveDraftParams { revision, title })
            .await?;

        self.audit
            .record(
                website.id,
                Some(page.id),
                actor,
                "page.draft",
                &json!({ "revisionId": revision.id, "version": revision.version }),
            )
            .await?;

        Ok(DraftSaved {
            revision,
            warnings: normalized.warnings,
        })
    }

    /// Publish the latest draft, or re-publish the latest published revision.
    pub async fn publish_page(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        page_id: Uuid,
        change_summary: Option<String>,
    ) -> Result<PageRevisionRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;
        let revisions = self.revisions.list_page_revisions(page.id).await?;

        let source = latest_with_status(&revisions, RevisionStatus::Draft)
            .or_else(|| latest_with_status(&revisions, RevisionStatus::Published))
            .ok_or_else(|| {
                WebsiteError::validation("page has no draft or published revision to publish")
            })?;

        let blocks = normalize_blocks(content_blocks(&source.content)).blocks;
        let issues = self.dynamic.validate(website.tenant_id, &blocks).await?;
        if !issues.is_empty() {
            warn!(
                target = "vestry::website::publish",
                page_id = %page.id,
                blocked = issues.len(),
                "publish blocked by dynamic block validation"
            );
            return Err(WebsiteError::PublishBlocked { issues });
        }

        let revision = PageRevisionRecord {
            id: Uuid::new_v4(),
            page_id: page.id,
            version: next_version(&revisions),
            status: RevisionStatus::Published,
            content: source.content.clone(),
            seo: source.seo.clone(),
            change_summary: trimmed(change_summary).or_else(|| source.change_summary.clone()),
            created_by: actor.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        let audit = WebsiteAuditService::entry(
            website.id,
            Some(page.id),
            actor,
            "page.publish",
            &transition_diff(source, &revision),
        );

        let published = self
            .commit(CommitPageRevisionParams {
                sections: sections_from_blocks(page.id, &blocks),
                revision,
                audit,
            })
            .await?;

        metrics::counter!("vestry_page_publish_total").increment(1);
        info!(
            target = "vestry::website::publish",
            page_id = %page.id,
            source_version = source.version,
            version = published.version,
            "page published"
        );

        Ok(published)
    }

    /// Re-publish the content of an earlier published or archived revision
    /// as a new version. Without a target, the most recent archived revision
    /// is used, then the current published one.
    pub async fn rollback_page(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        page_id: Uuid,
        target_revision_id: Option<Uuid>,
    ) -> Result<PageRevisionRecord, WebsiteError> {
        let website = self.ensure_website(tenant_id).await?;
        let page = self.require_page(&website, page_id).await?;
        let revisions = self.revisions.list_page_revisions(page.id).await?;

        let target = match target_revision_id {
            Some(id) => {
                let revision = revisions
                    .iter()
                    .find(|revision| revision.id == id)
                    .ok_or(WebsiteError::not_found("revision"))?;
                if revision.status == RevisionStatus::Draft {
                    return Err(WebsiteError::validation(
                        "only published or archived revisions can be rolled back to",
                    ));
                }
                revision
            }
            None => latest_with_status(&revisions, RevisionStatus::Archived)
                .or_else(|| latest_with_status(&revisions, RevisionStatus::Published))
                .ok_or_else(|| WebsiteError::validation("page has no revision to roll back to"))?,
        };

        let blocks = normalize_blocks(content_blocks(&target.content)).blocks;
        let revision = PageRevisionRecord {
            id: Uuid::new_v4(),
            page_id: page.id,
            version: next_version(&revisions),
            status: RevisionStatus::Published,
            content: target.content.clone(),
            seo: target.seo.clone(),
            change_summary: Some(format!("Rollback to version {}", target.version)),
            created_by: actor.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        let audit = WebsiteAuditService::entry(
            website.id,
            Some(page.id),
            actor,
            "page.rollback",
            &transition_diff(target, &revision),
        );

        let published = self
            .commit(CommitPageRevisionParams {
                sections: sections_from_blocks(page.id, &blocks),
                revision,
                audit,
            })
            .await?;

        metrics::counter!("vestry_page_rollback_total").increment(1);
        info!(
            target = "vestry::website::publish",
            page_id = %page.id,
            target_version = target.version,
            version = published.version,
            "page rolled back"
        );

        Ok(published)
    }

    async fn commit(
        &self,
        params: CommitPageRevisionParams,
    ) -> Result<PageRevisionRecord, WebsiteError> {
        let page_id = params.revision.page_id;
        let version = params.revision.version;
        self.revisions
            .commit_page_revision(params)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { constraint } => {
                    warn!(
                        target = "vestry::website::publish",
                        page_id = %page_id,
                        version,
                        constraint = %constraint,
                        "concurrent publish lost the version race"
                    );
                    WebsiteError::Repo(RepoError::Duplicate { constraint })
                }
                other => other.into(),
            })
    }
}

fn latest_with_status(
    revisions: &[PageRevisionRecord],
    status: RevisionStatus,
) -> Option<&PageRevisionRecord> {
    revisions
        .iter()
        .filter(|revision| revision.status == status)
        .max_by_key(|revision| revision.version)
}

fn next_version(revisions: &[PageRevisionRecord]) -> i32 {
    revisions
        .iter()
        .map(|revision| revision.version)
        .max()
        .unwrap_or(0)
        + 1
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn transition_diff(source: &PageRevisionRecord, target: &PageRevisionRecord) -> Value {
    let mut diff = Map::new();
    diff.insert("sourceRevisionId".into(), json!(source.id));
    diff.insert("sourceVersion".into(), json!(source.version));
    diff.insert("revisionId".into(), json!(target.id));
    diff.insert("version".into(), json!(target.version));
    Value::Object(diff)
}
