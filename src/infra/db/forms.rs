use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        FormsRepo, InsertSubmissionParams, RepoError, SubmissionInsert, SubmissionQueryFilter,
        UpdateFormParams, UpdateSubmissionStatusParams,
    },
    domain::{
        entities::{FormRecord, FormSubmissionRecord},
        types::SubmissionStatus,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const FORM_COLUMNS: &str = "id, website_id, key, name, schema, is_active, created_at, updated_at";
const SUBMISSION_COLUMNS: &str = "id, form_id, website_id, fields, spam_score, status, \
     ip_hash, user_agent_hash, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FormRow {
    id: Uuid,
    website_id: Uuid,
    key: String,
    name: String,
    schema: Value,
    is_active: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FormRow> for FormRecord {
    fn from(row: FormRow) -> Self {
        Self {
            id: row.id,
            website_id: row.website_id,
            key: row.key,
            name: row.name,
            schema: row.schema,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    form_id: Uuid,
    website_id: Uuid,
    fields: Value,
    spam_score: i32,
    status: SubmissionStatus,
    ip_hash: Option<String>,
    user_agent_hash: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SubmissionRow> for FormSubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: row.id,
            form_id: row.form_id,
            website_id: row.website_id,
            fields: row.fields,
            spam_score: row.spam_score,
            status: row.status,
            ip_hash: row.ip_hash,
            user_agent_hash: row.user_agent_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FormsRepo for PostgresRepositories {
    async fn list_forms(&self, website_id: Uuid) -> Result<Vec<FormRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM website_forms WHERE website_id = $1 ORDER BY key ASC"
        ))
        .bind(website_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FormRecord::from).collect())
    }

    async fn find_form(
        &self,
        website_id: Uuid,
        form_id: Uuid,
    ) -> Result<Option<FormRecord>, RepoError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM website_forms WHERE website_id = $1 AND id = $2"
        ))
        .bind(website_id)
        .bind(form_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(FormRecord::from))
    }

    async fn find_form_by_key(
        &self,
        website_id: Uuid,
        key: &str,
    ) -> Result<Option<FormRecord>, RepoError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM website_forms WHERE website_id = $1 AND key = $2"
        ))
        .bind(website_id)
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(FormRecord::from))
    }

    async fn create_form(&self, form: FormRecord) -> Result<FormRecord, RepoError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "INSERT INTO website_forms \
             (id, website_id, key, name, schema, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {FORM_COLUMNS}"
        ))
        .bind(form.id)
        .bind(form.website_id)
        .bind(&form.key)
        .bind(&form.name)
        .bind(&form.schema)
        .bind(form.is_active)
        .bind(form.created_at)
        .bind(form.updated_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FormRecord::from(row))
    }

    async fn update_form(&self, params: UpdateFormParams) -> Result<FormRecord, RepoError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "UPDATE website_forms SET name = $3, schema = $4, is_active = $5, updated_at = $6 \
             WHERE website_id = $1 AND id = $2 RETURNING {FORM_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.form_id)
        .bind(&params.name)
        .bind(&params.schema)
        .bind(params.is_active)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(FormRecord::from).ok_or(RepoError::NotFound)
    }

    async fn insert_submission_within_limit(
        &self,
        params: InsertSubmissionParams,
    ) -> Result<SubmissionInsert, RepoError> {
        let InsertSubmissionParams {
            submission,
            since,
            max_recent,
        } = params;
        let client = submission.ip_hash.as_deref().unwrap_or_default();
        let mut tx = self.begin().await?;
        Self::lock_named(&mut tx, &format!("form-submit:{}:{client}", submission.form_id)).await?;

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM website_form_submissions \
             WHERE form_id = $1 AND ip_hash = $2 AND created_at >= $3",
        )
        .bind(submission.form_id)
        .bind(&submission.ip_hash)
        .bind(since)
        .fetch_one(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;
        let recent = Self::convert_count(recent)?;
        if recent >= max_recent {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(SubmissionInsert::Limited { recent });
        }

        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "INSERT INTO website_form_submissions \
             (id, form_id, website_id, fields, spam_score, status, ip_hash, user_agent_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(submission.id)
        .bind(submission.form_id)
        .bind(submission.website_id)
        .bind(&submission.fields)
        .bind(submission.spam_score)
        .bind(submission.status)
        .bind(&submission.ip_hash)
        .bind(&submission.user_agent_hash)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .fetch_one(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(SubmissionInsert::Stored(FormSubmissionRecord::from(row)))
    }

    async fn list_submissions(
        &self,
        website_id: Uuid,
        filter: &SubmissionQueryFilter,
        limit: u32,
    ) -> Result<Vec<FormSubmissionRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SUBMISSION_COLUMNS} FROM website_form_submissions WHERE website_id = "
        ));
        qb.push_bind(website_id);

        if let Some(form_id) = filter.form_id {
            qb.push(" AND form_id = ").push_bind(form_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<SubmissionRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FormSubmissionRecord::from).collect())
    }

    async fn update_submission_status(
        &self,
        params: UpdateSubmissionStatusParams,
    ) -> Result<FormSubmissionRecord, RepoError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "UPDATE website_form_submissions SET status = $3, updated_at = $4 \
             WHERE website_id = $1 AND id = $2 RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(params.website_id)
        .bind(params.submission_id)
        .bind(params.status)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::append_audit(&mut tx, &params.audit).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(FormSubmissionRecord::from(row))
    }
}
