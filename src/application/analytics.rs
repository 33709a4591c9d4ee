//! Public event intake and the in-memory analytics summary.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::application::fingerprint::ClientInfo;
use crate::application::public::SiteResolver;
use crate::application::repos::{AnalyticsRepo, FormsRepo, SubmissionQueryFilter};
use crate::application::website::{WebsiteError, WebsiteService, WebsiteStores};
use crate::domain::entities::{AnalyticsEventRecord, FormSubmissionRecord};
use crate::domain::types::{AnalyticsEventType, AnalyticsRange};

/// Rows read per summary; the summary is computed in memory over them.
pub const SUMMARY_EVENT_LIMIT: u32 = 10_000;
pub const RECENT_EVENTS: usize = 20;
pub const RECENT_SUBMISSIONS: u32 = 10;
pub const TOP_ENTRIES: usize = 10;
const MAX_PAGE_PATH: usize = 512;
const DIRECT_SOURCE: &str = "direct";

#[derive(Debug, Clone)]
pub struct AnalyticsEventInput {
    pub page_path: String,
    pub event_type: AnalyticsEventType,
    pub source: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTotals {
    pub page_view: u64,
    pub cta_click: u64,
    pub form_submit: u64,
    pub total: u64,
}

impl EventTotals {
    fn add(&mut self, event_type: AnalyticsEventType) {
        match event_type {
            AnalyticsEventType::PageView => self.page_view += 1,
            AnalyticsEventType::CtaClick => self.cta_click += 1,
            AnalyticsEventType::FormSubmit => self.form_submit += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: String,
    #[serde(flatten)]
    pub counts: EventTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub range: AnalyticsRange,
    pub totals: EventTotals,
    pub timeline: Vec<TimelinePoint>,
    pub top_pages: Vec<RankedEntry>,
    pub top_sources: Vec<RankedEntry>,
    pub recent_events: Vec<AnalyticsEventRecord>,
    pub recent_submissions: Vec<FormSubmissionRecord>,
    /// The bounded read hit its limit, so older events in range were skipped.
    pub truncated: bool,
}

#[derive(Clone)]
pub struct AnalyticsService {
    websites: WebsiteService,
    resolver: SiteResolver,
    analytics: Arc<dyn AnalyticsRepo>,
    forms: Arc<dyn FormsRepo>,
    hash_salt: Arc<str>,
}

impl AnalyticsService {
    pub fn new(
        stores: &WebsiteStores,
        websites: WebsiteService,
        resolver: SiteResolver,
        hash_salt: &str,
    ) -> Self {
        Self {
            websites,
            resolver,
            analytics: stores.analytics.clone(),
            forms: stores.forms.clone(),
            hash_salt: Arc::from(hash_salt),
        }
    }

    pub async fn record_event(
        &self,
        host: &str,
        input: AnalyticsEventInput,
        client: &ClientInfo,
    ) -> Result<(), WebsiteError> {
        let resolved = self.resolver.resolve_host(host).await?;
        let page_path = normalize_page_path(&input.page_path)?;
        let payload = match input.payload {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::Object(map)) => Value::Object(map),
            Some(_) => return Err(WebsiteError::validation("payload must be an object")),
        };

        let event = AnalyticsEventRecord {
            id: Uuid::new_v4(),
            website_id: resolved.website.id,
            page_path,
            event_type: input.event_type,
            source: input
                .source
                .map(|source| source.trim().to_string())
                .filter(|source| !source.is_empty()),
            payload,
            ip_hash: client.ip_hash(&self.hash_salt),
            user_agent_hash: client.user_agent_hash(&self.hash_salt),
            created_at: OffsetDateTime::now_utc(),
        };

        debug!(
            target = "vestry::analytics",
            website_id = %event.website_id,
            event_type = event.event_type.as_str(),
            path = %event.page_path,
            "analytics event"
        );
        self.analytics.insert_event(event).await?;
        Ok(())
    }

    pub async fn analytics_summary(
        &self,
        tenant_id: Uuid,
        range: AnalyticsRange,
    ) -> Result<AnalyticsSummary, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let now = OffsetDateTime::now_utc();
        let since = range_start(range, now.date()).midnight().assume_utc();

        let events = self
            .analytics
            .list_events_since(website.id, since, SUMMARY_EVENT_LIMIT)
            .await?;
        let submissions = self
            .forms
            .list_submissions(
                website.id,
                &SubmissionQueryFilter::default(),
                RECENT_SUBMISSIONS,
            )
            .await?;

        Ok(summarize(range, now.date(), events, submissions))
    }
}

/// Aggregate events (newest first) into totals, a zero-filled daily timeline
/// ending at `today`, rankings and recent slices.
pub fn summarize(
    range: AnalyticsRange,
    today: Date,
    events: Vec<AnalyticsEventRecord>,
    submissions: Vec<FormSubmissionRecord>,
) -> AnalyticsSummary {
    let start = range_start(range, today);
    let truncated = events.len() >= SUMMARY_EVENT_LIMIT as usize;

    let mut totals = EventTotals::default();
    let mut days: Vec<TimelinePoint> = Vec::new();
    let mut index_by_day: HashMap<Date, usize> = HashMap::new();
    let mut day = start;
    while day <= today {
        index_by_day.insert(day, days.len());
        days.push(TimelinePoint {
            date: format_day(day),
            counts: EventTotals::default(),
        });
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }

    let mut pages: HashMap<&str, u64> = HashMap::new();
    let mut sources: HashMap<&str, u64> = HashMap::new();
    for event in &events {
        let Some(&slot) = index_by_day.get(&event.created_at.date()) else {
            continue;
        };
        days[slot].counts.add(event.event_type);
        totals.add(event.event_type);

        if event.event_type == AnalyticsEventType::PageView {
            *pages.entry(event.page_path.as_str()).or_default() += 1;
        }
        let source = event.source.as_deref().unwrap_or(DIRECT_SOURCE);
        *sources.entry(source).or_default() += 1;
    }

    let top_pages = rank(pages);
    let top_sources = rank(sources);
    let mut recent_events = events;
    recent_events.truncate(RECENT_EVENTS);
    let mut recent_submissions = submissions;
    recent_submissions.truncate(RECENT_SUBMISSIONS as usize);

    AnalyticsSummary {
        range,
        totals,
        timeline: days,
        top_pages,
        top_sources,
        recent_events,
        recent_submissions,
        truncated,
    }
}

fn rank(counts: HashMap<&str, u64>) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = counts
        .into_iter()
        .map(|(key, count)| RankedEntry {
            key: key.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(TOP_ENTRIES);
    entries
}

fn range_start(range: AnalyticsRange, today: Date) -> Date {
    today - Duration::days(range.days() - 1)
}

fn format_day(day: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    day.format(&format).unwrap_or_else(|_| day.to_string())
}

fn normalize_page_path(raw: &str) -> Result<String, WebsiteError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WebsiteError::validation("pagePath is required"));
    }
    let path = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    if path.len() > MAX_PAGE_PATH {
        return Err(WebsiteError::validation(format!(
            "pagePath must be at most {MAX_PAGE_PATH} characters"
        )));
    }
    Ok(path)
}
