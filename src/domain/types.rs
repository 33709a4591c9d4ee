//! Shared domain enumerations aligned with persisted database enums.
//!
//! The enums live in `vestry-api-types` so API clients decode the same values.

pub use vestry_api_types::{
    AnalyticsEventType, DomainStatus, RevisionStatus, SslStatus, SubmissionStatus,
};

/// Lookback windows accepted by the analytics dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "14d")]
    Days14,
    #[default]
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
}

impl AnalyticsRange {
    /// Parse a range key; unknown or missing keys fall back to 30 days.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("7d") => AnalyticsRange::Days7,
            Some("14d") => AnalyticsRange::Days14,
            Some("90d") => AnalyticsRange::Days90,
            _ => AnalyticsRange::Days30,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            AnalyticsRange::Days7 => 7,
            AnalyticsRange::Days14 => 14,
            AnalyticsRange::Days30 => 30,
            AnalyticsRange::Days90 => 90,
        }
    }
}
