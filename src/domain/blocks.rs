//! Typed page blocks.
//!
//! A block travels as `{ "id", "type", "settings" }` JSON. The settings of the
//! block types the service reasons about (`dynamic_list`, `custom_fragment`)
//! are parsed into explicit structs; every other type keeps its settings as an
//! open map that is passed through untouched. Unknown keys survive a round
//! trip in every variant.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const DEFAULT_DYNAMIC_LIMIT: usize = 6;
pub const MAX_DYNAMIC_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Hero,
    CtaBand,
    FeatureGrid,
    ServiceTimes,
    StaffCards,
    Testimonials,
    Stats,
    Faq,
    Gallery,
    MapContact,
    Footer,
    DynamicList,
    Form,
    CustomFragment,
    /// Untyped legacy content.
    Content,
    Other(String),
}

impl BlockKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "hero" => BlockKind::Hero,
            "cta_band" => BlockKind::CtaBand,
            "feature_grid" => BlockKind::FeatureGrid,
            "service_times" => BlockKind::ServiceTimes,
            "staff_cards" => BlockKind::StaffCards,
            "testimonials" => BlockKind::Testimonials,
            "stats" => BlockKind::Stats,
            "faq" => BlockKind::Faq,
            "gallery" => BlockKind::Gallery,
            "map_contact" => BlockKind::MapContact,
            "footer" => BlockKind::Footer,
            "dynamic_list" => BlockKind::DynamicList,
            "form" => BlockKind::Form,
            "custom_fragment" => BlockKind::CustomFragment,
            "content" => BlockKind::Content,
            other => BlockKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Hero => "hero",
            BlockKind::CtaBand => "cta_band",
            BlockKind::FeatureGrid => "feature_grid",
            BlockKind::ServiceTimes => "service_times",
            BlockKind::StaffCards => "staff_cards",
            BlockKind::Testimonials => "testimonials",
            BlockKind::Stats => "stats",
            BlockKind::Faq => "faq",
            BlockKind::Gallery => "gallery",
            BlockKind::MapContact => "map_contact",
            BlockKind::Footer => "footer",
            BlockKind::DynamicList => "dynamic_list",
            BlockKind::Form => "form",
            BlockKind::CustomFragment => "custom_fragment",
            BlockKind::Content => "content",
            BlockKind::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live collections a `dynamic_list` block can pull from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicSource {
    Events,
    Staff,
    Announcements,
    Giving,
    Sermons,
}

impl DynamicSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DynamicSource::Events => "events",
            DynamicSource::Staff => "staff",
            DynamicSource::Announcements => "announcements",
            DynamicSource::Giving => "giving",
            DynamicSource::Sermons => "sermons",
        }
    }
}

impl FromStr for DynamicSource {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "events" => Ok(DynamicSource::Events),
            "staff" => Ok(DynamicSource::Staff),
            "announcements" => Ok(DynamicSource::Announcements),
            "giving" => Ok(DynamicSource::Giving),
            "sermons" => Ok(DynamicSource::Sermons),
            _ => Err(()),
        }
    }
}

/// Static content shown when a dynamic block has no live items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fallback {
    pub heading: Option<String>,
    pub body: Option<String>,
    pub extra: Map<String, Value>,
}

impl Fallback {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let mut extra = map.clone();
        let heading = take_string(&mut extra, "heading");
        let body = take_string(&mut extra, "body");
        Some(Self {
            heading,
            body,
            extra,
        })
    }

    /// A fallback counts only when it has visible text.
    pub fn is_usable(&self) -> bool {
        let filled = |value: &Option<String>| {
            value
                .as_deref()
                .map(|text| !text.trim().is_empty())
                .unwrap_or(false)
        };
        filled(&self.heading) || filled(&self.body)
    }

    fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(heading) = &self.heading {
            map.insert("heading".into(), Value::String(heading.clone()));
        }
        if let Some(body) = &self.body {
            map.insert("body".into(), Value::String(body.clone()));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicListSettings {
    pub source: Option<String>,
    pub limit: Option<u64>,
    pub fallback: Option<Fallback>,
    pub extra: Map<String, Value>,
}

impl DynamicListSettings {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut extra = map.clone();
        let source = take_string(&mut extra, "source");
        let limit = extra.remove("limit").and_then(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        });
        let fallback = extra
            .remove("fallback")
            .as_ref()
            .and_then(Fallback::from_value);
        Self {
            source,
            limit,
            fallback,
            extra,
        }
    }

    /// The configured source, or `None` when blank.
    pub fn source_key(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn resolved_source(&self) -> Option<DynamicSource> {
        self.source_key().and_then(|key| key.parse().ok())
    }

    /// Item count to hydrate: 1–20, 6 when unset.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(limit) => (limit.min(MAX_DYNAMIC_LIMIT as u64) as usize).max(1),
            None => DEFAULT_DYNAMIC_LIMIT,
        }
    }

    pub fn has_usable_fallback(&self) -> bool {
        self.fallback.as_ref().is_some_and(Fallback::is_usable)
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        if let Some(source) = &self.source {
            map.insert("source".into(), Value::String(source.clone()));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::from(limit));
        }
        if let Some(fallback) = &self.fallback {
            map.insert("fallback".into(), fallback.to_value());
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomFragmentSettings {
    pub html: String,
    pub html_original: Option<String>,
    pub sanitizer_warnings: Vec<String>,
    pub extra: Map<String, Value>,
}

impl CustomFragmentSettings {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut extra = map.clone();
        let html = take_string(&mut extra, "html").unwrap_or_default();
        let html_original = take_string(&mut extra, "htmlOriginal");
        let sanitizer_warnings = match extra.remove("sanitizerWarnings") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            html,
            html_original,
            sanitizer_warnings,
            extra,
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("html".into(), Value::String(self.html.clone()));
        if let Some(original) = &self.html_original {
            map.insert("htmlOriginal".into(), Value::String(original.clone()));
        }
        if !self.sanitizer_warnings.is_empty() {
            map.insert(
                "sanitizerWarnings".into(),
                Value::Array(
                    self.sanitizer_warnings
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
            );
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockSettings {
    DynamicList(DynamicListSettings),
    CustomFragment(CustomFragmentSettings),
    Generic(Map<String, Value>),
}

impl BlockSettings {
    pub fn parse(kind: &BlockKind, map: &Map<String, Value>) -> Self {
        match kind {
            BlockKind::DynamicList => BlockSettings::DynamicList(DynamicListSettings::from_map(map)),
            BlockKind::CustomFragment => {
                BlockSettings::CustomFragment(CustomFragmentSettings::from_map(map))
            }
            _ => BlockSettings::Generic(map.clone()),
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            BlockSettings::DynamicList(settings) => settings.to_map(),
            BlockSettings::CustomFragment(settings) => settings.to_map(),
            BlockSettings::Generic(map) => map.clone(),
        }
    }
}

/// Record pulled from a tenant collection into a `dynamic_list` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub settings: BlockSettings,
    pub resolved_items: Option<Vec<DynamicItem>>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind, settings: &Map<String, Value>) -> Self {
        let settings = BlockSettings::parse(&kind, settings);
        Self {
            id: id.into(),
            kind,
            settings,
            resolved_items: None,
        }
    }

    pub fn dynamic_list(&self) -> Option<&DynamicListSettings> {
        match &self.settings {
            BlockSettings::DynamicList(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn custom_fragment(&self) -> Option<&CustomFragmentSettings> {
        match &self.settings {
            BlockSettings::CustomFragment(settings) => Some(settings),
            _ => None,
        }
    }

    /// Persisted shape: `{ id, type, settings }`, plus `resolvedItems` once hydrated.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("type".into(), Value::String(self.kind.as_str().to_string()));
        map.insert("settings".into(), Value::Object(self.settings.to_map()));
        if let Some(items) = &self.resolved_items {
            map.insert(
                "resolvedItems".into(),
                serde_json::to_value(items).unwrap_or(Value::Array(Vec::new())),
            );
        }
        Value::Object(map)
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Wrap blocks into the revision content document.
pub fn blocks_to_content(blocks: &[Block]) -> Value {
    let mut content = Map::new();
    content.insert(
        "blocks".into(),
        Value::Array(blocks.iter().map(Block::to_value).collect()),
    );
    Value::Object(content)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(text)) => Some(text),
        Some(Value::Null) | None => None,
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
    }
}
