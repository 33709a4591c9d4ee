//! Normalization of raw block JSON into typed blocks.

use std::collections::HashSet;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::sanitizer::sanitize_fragment;
use crate::domain::blocks::{Block, BlockKind, BlockSettings};
use crate::domain::entities::SectionRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBlocks {
    pub blocks: Vec<Block>,
    pub warnings: Vec<String>,
}

/// Best-effort conversion of editor input into a block list. Never fails:
/// malformed entries are dropped and reported as warnings.
pub fn normalize_blocks(raw: &Value) -> NormalizedBlocks {
    let mut normalized = NormalizedBlocks::default();

    let entries = match raw {
        Value::Array(entries) => entries,
        Value::Null => return normalized,
        _ => {
            normalized
                .warnings
                .push("blocks must be an array; content ignored".to_string());
            return normalized;
        }
    };

    let mut seen_ids = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            normalized
                .warnings
                .push(format!("block at position {} is not an object; skipped", index + 1));
            continue;
        };

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(BlockKind::parse)
            .unwrap_or(BlockKind::Content);

        let requested_id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{kind}-{}", index + 1));
        let id = unique_id(&mut seen_ids, requested_id);

        let settings = object
            .get("settings")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut block = Block::new(id, kind, &settings);
        sanitize_block(&mut block, &mut normalized.warnings);
        normalized.blocks.push(block);
    }

    normalized
}

/// The `blocks` array of a revision content document.
pub fn content_blocks(content: &Value) -> &Value {
    content.get("blocks").unwrap_or(&Value::Null)
}

/// Rows mirroring a published block list.
pub fn sections_from_blocks(page_id: Uuid, blocks: &[Block]) -> Vec<SectionRecord> {
    let now = OffsetDateTime::now_utc();
    blocks
        .iter()
        .enumerate()
        .map(|(position, block)| SectionRecord {
            id: Uuid::new_v4(),
            page_id,
            position: i32::try_from(position).unwrap_or(i32::MAX),
            block_id: block.id.clone(),
            block_type: block.kind.as_str().to_string(),
            settings: Value::Object(block.settings.to_map()),
            created_at: now,
        })
        .collect()
}

/// Rebuild raw block JSON from materialized sections.
pub fn blocks_from_sections(sections: &[SectionRecord]) -> Value {
    let mut ordered: Vec<&SectionRecord> = sections.iter().collect();
    ordered.sort_by_key(|section| section.position);
    Value::Array(
        ordered
            .into_iter()
            .map(|section| {
                let mut map = Map::new();
                map.insert("id".into(), Value::String(section.block_id.clone()));
                map.insert("type".into(), Value::String(section.block_type.clone()));
                map.insert("settings".into(), section.settings.clone());
                Value::Object(map)
            })
            .collect(),
    )
}

/// Drop editor-only fragment fields before blocks leave through the public site.
pub fn strip_editor_fields(blocks: &mut [Block]) {
    for block in blocks {
        if let BlockSettings::CustomFragment(settings) = &mut block.settings {
            settings.html_original = None;
            settings.sanitizer_warnings.clear();
        }
    }
}

fn sanitize_block(block: &mut Block, warnings: &mut Vec<String>) {
    let BlockSettings::CustomFragment(settings) = &mut block.settings else {
        return;
    };

    let sanitized = sanitize_fragment(&settings.html);
    if sanitized.changed(&settings.html) {
        settings.html_original = Some(std::mem::take(&mut settings.html));
    }
    settings.html = sanitized.html;
    settings.sanitizer_warnings = sanitized.warnings;
    warnings.extend(
        settings
            .sanitizer_warnings
            .iter()
            .map(|warning| format!("block {}: {warning}", block.id)),
    );
}

fn unique_id(seen: &mut HashSet<String>, requested: String) -> String {
    if seen.insert(requested.clone()) {
        return requested;
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{requested}-{counter}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_type_and_generates_ids() {
        let result = normalize_blocks(&json!([
            {"settings": {"text": "Hello"}},
            {"type": "hero", "id": "  "},
        ]));
        assert!(result.warnings.is_empty());
        assert_eq!(result.blocks[0].kind, BlockKind::Content);
        assert_eq!(result.blocks[0].id, "content-1");
        assert_eq!(result.blocks[1].id, "hero-2");
    }

    #[test]
    fn skips_non_objects_with_warning() {
        let result = normalize_blocks(&json!([1, "hero", {"type": "faq", "id": "q"}]));
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn non_array_input_yields_empty_list() {
        let result = normalize_blocks(&json!({"type": "hero"}));
        assert!(result.blocks.is_empty());
        assert_eq!(result.warnings.len(), 1);

        let result = normalize_blocks(&Value::Null);
        assert!(result.blocks.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn duplicate_ids_are_suffixed() {
        let result = normalize_blocks(&json!([
            {"type": "hero", "id": "a"},
            {"type": "faq", "id": "a"},
        ]));
        let ids: Vec<_> = result.blocks.iter().map(|block| block.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a-2"]);
    }

    #[test]
    fn custom_fragment_is_sanitized_and_original_kept() {
        let raw = "<p>Hi</p><script>alert(1)</script>";
        let result = normalize_blocks(&json!([
            {"type": "custom_fragment", "id": "embed", "settings": {"html": raw, "width": "full"}}
        ]));
        let settings = result.blocks[0].custom_fragment().expect("fragment");
        assert_eq!(settings.html, "<p>Hi</p>");
        assert_eq!(settings.html_original.as_deref(), Some(raw));
        assert_eq!(settings.sanitizer_warnings.len(), 1);
        assert_eq!(settings.extra.get("width"), Some(&json!("full")));
        assert_eq!(result.warnings, vec!["block embed: removed <script> element".to_string()]);
    }

    #[test]
    fn renormalizing_sanitized_content_keeps_original() {
        let first = normalize_blocks(&json!([
            {"type": "custom_fragment", "id": "embed", "settings": {"html": "<b onclick=\"x\">a</b>"}}
        ]));
        let stored = Value::Array(first.blocks.iter().map(Block::to_value).collect());
        let second = normalize_blocks(&stored);
        let settings = second.blocks[0].custom_fragment().expect("fragment");
        assert_eq!(settings.html, "<b>a</b>");
        assert_eq!(settings.html_original.as_deref(), Some("<b onclick=\"x\">a</b>"));
        assert!(second.warnings.is_empty());
    }

    #[test]
    fn settings_are_copied_not_shared() {
        let raw = json!([{"type": "hero", "id": "h", "settings": {"heading": "Hi"}}]);
        let mut result = normalize_blocks(&raw);
        if let BlockSettings::Generic(map) = &mut result.blocks[0].settings {
            map.insert("heading".into(), json!("Changed"));
        }
        assert_eq!(raw[0]["settings"]["heading"], "Hi");
    }

    #[test]
    fn sections_round_trip_block_order() {
        let page_id = Uuid::new_v4();
        let result = normalize_blocks(&json!([
            {"type": "hero", "id": "a", "settings": {}},
            {"type": "faq", "id": "b", "settings": {"items": []}},
        ]));
        let sections = sections_from_blocks(page_id, &result.blocks);
        assert_eq!(sections[1].position, 1);
        let rebuilt = normalize_blocks(&blocks_from_sections(&sections));
        assert_eq!(rebuilt.blocks, result.blocks);
    }
}
