//! Website forms: admin management, public submissions and moderation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::audit::WebsiteAuditService;
use crate::application::fingerprint::ClientInfo;
use crate::application::public::SiteResolver;
use crate::application::repos::{
    AnalyticsRepo, FormsRepo, InsertSubmissionParams, RepoError, SubmissionInsert,
    SubmissionQueryFilter, UpdateFormParams, UpdateSubmissionStatusParams,
};
use crate::application::website::{WebsiteError, WebsiteService, WebsiteStores, required_text};
use crate::domain::entities::{AnalyticsEventRecord, FormRecord, FormSubmissionRecord};
use crate::domain::slug::validate_slug;
use crate::domain::spam::SpamPolicy;
use crate::domain::types::{AnalyticsEventType, SubmissionStatus};

pub const MAX_SUBMISSION_PAGE: u32 = 200;

/// Spam scoring plus the per-form, per-client submission budget.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicy {
    pub spam: SpamPolicy,
    pub max_submissions: u64,
    pub window: Duration,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            spam: SpamPolicy::default(),
            max_submissions: 4,
            window: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateFormCommand {
    pub key: String,
    pub name: String,
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateFormCommand {
    pub name: Option<String>,
    pub schema: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FormSubmission {
    pub fields: Option<Value>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: Uuid,
    pub status: SubmissionStatus,
    pub spam_score: i32,
}

#[derive(Clone)]
pub struct FormService {
    websites: WebsiteService,
    resolver: SiteResolver,
    forms: Arc<dyn FormsRepo>,
    analytics: Arc<dyn AnalyticsRepo>,
    policy: SubmissionPolicy,
    hash_salt: Arc<str>,
}

impl FormService {
    pub fn new(
        stores: &WebsiteStores,
        websites: WebsiteService,
        resolver: SiteResolver,
        policy: SubmissionPolicy,
        hash_salt: &str,
    ) -> Self {
        Self {
            websites,
            resolver,
            forms: stores.forms.clone(),
            analytics: stores.analytics.clone(),
            policy,
            hash_salt: Arc::from(hash_salt),
        }
    }

    pub async fn list_forms(&self, tenant_id: Uuid) -> Result<Vec<FormRecord>, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        Ok(self.forms.list_forms(website.id).await?)
    }

    pub async fn create_form(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        command: CreateFormCommand,
    ) -> Result<FormRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let key = command.key.trim().to_string();
        validate_slug(&key)?;
        let name = required_text("name", &command.name)?;
        let schema = schema_value(command.schema)?;

        if self.forms.find_form_by_key(website.id, &key).await?.is_some() {
            return Err(WebsiteError::validation(format!(
                "form key `{key}` is already in use"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let form = self
            .forms
            .create_form(FormRecord {
                id: Uuid::new_v4(),
                website_id: website.id,
                key,
                name,
                schema,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.websites
            .audit()
            .record(
                website.id,
                None,
                actor,
                "form.create",
                &json!({ "formId": form.id, "key": form.key }),
            )
            .await?;
        Ok(form)
    }

    pub async fn update_form(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        form_id: Uuid,
        command: UpdateFormCommand,
    ) -> Result<FormRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let current = self
            .forms
            .find_form(website.id, form_id)
            .await?
            .ok_or(WebsiteError::not_found("form"))?;

        let name = match command.name.as_deref() {
            Some(name) => required_text("name", name)?,
            None => current.name.clone(),
        };
        let schema = match command.schema {
            Some(schema) => schema_value(Some(schema))?,
            None => current.schema.clone(),
        };

        let form = self
            .forms
            .update_form(UpdateFormParams {
                website_id: website.id,
                form_id,
                name,
                schema,
                is_active: command.is_active.unwrap_or(current.is_active),
            })
            .await?;

        self.websites
            .audit()
            .record(
                website.id,
                None,
                actor,
                "form.update",
                &json!({ "formId": form.id, "isActive": form.is_active }),
            )
            .await?;
        Ok(form)
    }

    pub async fn list_submissions(
        &self,
        tenant_id: Uuid,
        form_id: Option<Uuid>,
        status: Option<&str>,
        limit: u32,
    ) -> Result<Vec<FormSubmissionRecord>, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let status = status
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(parse_status)
            .transpose()?;
        if let Some(form_id) = form_id
            && self.forms.find_form(website.id, form_id).await?.is_none()
        {
            return Err(WebsiteError::not_found("form"));
        }

        Ok(self
            .forms
            .list_submissions(
                website.id,
                &SubmissionQueryFilter { form_id, status },
                limit.clamp(1, MAX_SUBMISSION_PAGE),
            )
            .await?)
    }

    pub async fn update_submission_status(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        submission_id: Uuid,
        status: &str,
    ) -> Result<FormSubmissionRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let status = parse_status(status)?;
        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            "submission.status",
            &json!({ "submissionId": submission_id, "status": status.as_str() }),
        );

        self.forms
            .update_submission_status(UpdateSubmissionStatusParams {
                website_id: website.id,
                submission_id,
                status,
                audit,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => {
                    WebsiteError::not_found("submission")
                }
                other => other.into(),
            })
    }

    /// Accept a public submission for the form `key` on the site serving `host`.
    pub async fn submit(
        &self,
        host: &str,
        key: &str,
        submission: FormSubmission,
        client: &ClientInfo,
    ) -> Result<SubmissionReceipt, WebsiteError> {
        let resolved = self.resolver.resolve_host(host).await?;
        let website_id = resolved.website.id;
        let form = self
            .forms
            .find_form_by_key(website_id, key.trim())
            .await?
            .filter(|form| form.is_active)
            .ok_or(WebsiteError::not_found("form"))?;

        let fields: Map<String, Value> = match submission.fields {
            Some(Value::Object(fields)) => fields,
            _ => return Err(WebsiteError::validation("fields must be an object")),
        };

        let now = OffsetDateTime::now_utc();
        let spam_score = self.policy.spam.score(&fields);
        let status = self.policy.spam.classify(spam_score);
        let ip_hash = client.ip_hash(&self.hash_salt);
        let user_agent_hash = client.user_agent_hash(&self.hash_salt);

        let outcome = self
            .forms
            .insert_submission_within_limit(InsertSubmissionParams {
                submission: FormSubmissionRecord {
                    id: Uuid::new_v4(),
                    form_id: form.id,
                    website_id,
                    fields: Value::Object(fields),
                    spam_score,
                    status,
                    ip_hash: Some(client.rate_key(&self.hash_salt)),
                    user_agent_hash: user_agent_hash.clone(),
                    created_at: now,
                    updated_at: now,
                },
                since: now - self.policy.window,
                max_recent: self.policy.max_submissions,
            })
            .await?;

        let stored = match outcome {
            SubmissionInsert::Stored(stored) => stored,
            SubmissionInsert::Limited { recent } => {
                metrics::counter!("vestry_form_rate_limited_total").increment(1);
                warn!(
                    target = "vestry::forms",
                    form_id = %form.id,
                    recent,
                    "form submission rate limited"
                );
                return Err(WebsiteError::RateLimited {
                    retry_after_seconds: u64::try_from(self.policy.window.whole_seconds())
                        .unwrap_or(0)
                        .max(1),
                });
            }
        };

        metrics::counter!("vestry_form_submission_total").increment(1);
        if status == SubmissionStatus::Quarantined {
            metrics::counter!("vestry_form_quarantined_total").increment(1);
            info!(
                target = "vestry::forms",
                form_id = %form.id,
                submission_id = %stored.id,
                spam_score,
                "submission quarantined"
            );
        }

        let event = AnalyticsEventRecord {
            id: Uuid::new_v4(),
            website_id,
            page_path: format!("/_forms/{}", form.key),
            event_type: AnalyticsEventType::FormSubmit,
            source: submission
                .source
                .map(|source| source.trim().to_string())
                .filter(|source| !source.is_empty()),
            payload: json!({ "formKey": form.key, "submissionId": stored.id }),
            ip_hash,
            user_agent_hash,
            created_at: now,
        };
        if let Err(err) = self.analytics.insert_event(event).await {
            warn!(
                target = "vestry::forms",
                form_id = %form.id,
                error = %err,
                "failed to record form_submit analytics event"
            );
        }

        Ok(SubmissionReceipt {
            id: stored.id,
            status: stored.status,
            spam_score: stored.spam_score,
        })
    }
}

fn parse_status(value: &str) -> Result<SubmissionStatus, WebsiteError> {
    SubmissionStatus::parse(value)
        .ok_or_else(|| WebsiteError::validation(format!("unknown submission status `{value}`")))
}

fn schema_value(schema: Option<Value>) -> Result<Value, WebsiteError> {
    match schema {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(Value::Object(map)) => Ok(Value::Object(map)),
        Some(_) => Err(WebsiteError::validation("schema must be an object")),
    }
}
