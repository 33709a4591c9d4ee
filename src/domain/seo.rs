//! Website-wide SEO settings kept under `theme_config.seo`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::error::DomainError;

pub const DEFAULT_SITE_NAME: &str = "Our Church";
pub const DEFAULT_META_DESCRIPTION: &str = "Worship, community and events near you.";

/// Key under the theme config holding the SEO object.
pub const THEME_SEO_KEY: &str = "seo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSeo {
    pub site_name: String,
    pub title_suffix: String,
    pub meta_description: String,
    pub canonical_base_url: String,
    pub og_image_url: String,
    pub organization_name: String,
    pub organization_url: String,
    pub robots_index: bool,
    pub robots_follow: bool,
}

impl Default for GlobalSeo {
    fn default() -> Self {
        Self {
            site_name: DEFAULT_SITE_NAME.to_string(),
            title_suffix: String::new(),
            meta_description: DEFAULT_META_DESCRIPTION.to_string(),
            canonical_base_url: String::new(),
            og_image_url: String::new(),
            organization_name: String::new(),
            organization_url: String::new(),
            robots_index: true,
            robots_follow: true,
        }
    }
}

impl GlobalSeo {
    /// Read the normalized SEO object out of a theme config.
    pub fn from_theme(theme_config: &Value) -> Self {
        match theme_config.get(THEME_SEO_KEY).and_then(Value::as_object) {
            Some(stored) => Self::default().apply(stored),
            None => Self::default(),
        }
    }

    /// Apply a patch. Blank or missing strings keep the current value;
    /// each boolean is `true` unless the patch sets it to `false`, so a patch
    /// that omits a flag turns it back on.
    pub fn merge(&self, patch: &Map<String, Value>) -> Result<Self, DomainError> {
        let merged = self.apply(patch);
        validate_base_url(&merged.canonical_base_url)?;
        Ok(merged)
    }

    fn apply(&self, patch: &Map<String, Value>) -> Self {
        let text = |key: &str, current: &str| match patch.get(key).and_then(Value::as_str) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => current.to_string(),
        };
        let flag = |key: &str| !matches!(patch.get(key), Some(Value::Bool(false)));

        Self {
            site_name: text("siteName", &self.site_name),
            title_suffix: text("titleSuffix", &self.title_suffix),
            meta_description: text("metaDescription", &self.meta_description),
            canonical_base_url: text("canonicalBaseUrl", &self.canonical_base_url)
                .trim_end_matches('/')
                .to_string(),
            og_image_url: text("ogImageUrl", &self.og_image_url),
            organization_name: text("organizationName", &self.organization_name),
            organization_url: text("organizationUrl", &self.organization_url),
            robots_index: flag("robotsIndex"),
            robots_follow: flag("robotsFollow"),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Explicit canonical base URL, or `https://{host}`.
    pub fn base_url(&self, host: &str) -> String {
        if self.canonical_base_url.is_empty() {
            format!("https://{host}")
        } else {
            self.canonical_base_url.clone()
        }
    }
}

fn validate_base_url(value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Ok(());
    }
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(DomainError::validation(
            "canonicalBaseUrl",
            "canonicalBaseUrl must be an absolute http(s) URL",
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn missing_seo_uses_defaults() {
        let seo = GlobalSeo::from_theme(&json!({"colors": {}}));
        assert_eq!(seo, GlobalSeo::default());
        assert!(seo.robots_index && seo.robots_follow);
    }

    #[test]
    fn blank_strings_keep_prior_value() {
        let prior = GlobalSeo {
            site_name: "Grace Chapel".into(),
            ..GlobalSeo::default()
        };
        let merged = prior
            .merge(&patch(json!({"siteName": "   ", "titleSuffix": " | Grace"})))
            .unwrap();
        assert_eq!(merged.site_name, "Grace Chapel");
        assert_eq!(merged.title_suffix, "| Grace");
    }

    #[test]
    fn booleans_only_turn_off_when_false() {
        let merged = GlobalSeo::default()
            .merge(&patch(json!({"robotsIndex": false, "robotsFollow": "no"})))
            .unwrap();
        assert!(!merged.robots_index);
        assert!(merged.robots_follow);
    }

    #[test]
    fn omitted_flags_default_back_to_true() {
        let prior = GlobalSeo {
            robots_index: false,
            robots_follow: false,
            ..GlobalSeo::default()
        };
        let merged = prior.merge(&patch(json!({"siteName": "Grace"}))).unwrap();
        assert!(merged.robots_index);
        assert!(merged.robots_follow);
        assert_eq!(merged.site_name, "Grace");

        let stored = GlobalSeo::from_theme(&json!({"seo": {"robotsIndex": false}}));
        assert!(!stored.robots_index);
        assert!(stored.robots_follow);
    }

    #[test]
    fn canonical_base_url_must_be_http() {
        let err = GlobalSeo::default()
            .merge(&patch(json!({"canonicalBaseUrl": "ftp://grace.org"})))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "canonicalBaseUrl", .. }));

        let merged = GlobalSeo::default()
            .merge(&patch(json!({"canonicalBaseUrl": "https://grace.org/"})))
            .unwrap();
        assert_eq!(merged.base_url("ignored.example"), "https://grace.org");
    }

    #[test]
    fn base_url_falls_back_to_host() {
        assert_eq!(GlobalSeo::default().base_url("grace.org"), "https://grace.org");
    }
}
