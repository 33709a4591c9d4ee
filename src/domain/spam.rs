//! Heuristic spam scoring for public form submissions.

use serde_json::{Map, Value};

use crate::domain::types::SubmissionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamPolicy {
    /// Field length (in characters) above which a submission is suspicious.
    pub long_field_chars: usize,
    pub long_field_weight: i32,
    pub url_weight: i32,
    pub quarantine_score: i32,
}

impl Default for SpamPolicy {
    fn default() -> Self {
        Self {
            long_field_chars: 800,
            long_field_weight: 30,
            url_weight: 25,
            quarantine_score: 40,
        }
    }
}

impl SpamPolicy {
    /// Each heuristic contributes at most once per submission.
    pub fn score(&self, fields: &Map<String, Value>) -> i32 {
        let values: Vec<String> = fields.values().map(field_text).collect();

        let mut score = 0;
        if values
            .iter()
            .any(|value| value.chars().count() > self.long_field_chars)
        {
            score += self.long_field_weight;
        }
        if values.iter().any(|value| contains_url(value)) {
            score += self.url_weight;
        }
        score
    }

    pub fn classify(&self, score: i32) -> SubmissionStatus {
        if score >= self.quarantine_score {
            SubmissionStatus::Quarantined
        } else {
            SubmissionStatus::Received
        }
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn contains_url(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    lowered.contains("http://") || lowered.contains("https://")
}
