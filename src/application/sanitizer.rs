//! Sanitizer for editor-authored HTML fragments.
//!
//! Fragments are streamed through `lol_html`: scripts are dropped, event
//! handler attributes and script-bearing URLs are stripped, and iframes are
//! only kept when their host is on the embed allow-list. Sanitization never
//! fails; every change is reported as a warning.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use tracing::warn;

/// Embed providers whose iframes may appear in custom fragments.
pub const IFRAME_HOST_ALLOWLIST: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "www.youtube-nocookie.com",
    "player.vimeo.com",
    "www.google.com",
    "open.spotify.com",
    "w.soundcloud.com",
    "www.facebook.com",
];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];
const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedFragment {
    pub html: String,
    pub warnings: Vec<String>,
}

impl SanitizedFragment {
    pub fn changed(&self, original: &str) -> bool {
        self.html != original
    }
}

/// Whether an iframe `src` points at an allow-listed embed host.
pub fn is_host_allowlisted(src: &str) -> bool {
    iframe_host(src).is_some_and(|host| IFRAME_HOST_ALLOWLIST.contains(&host.as_str()))
}

pub fn sanitize_fragment(fragment: &str) -> SanitizedFragment {
    let warnings = Rc::new(RefCell::new(Vec::<String>::new()));

    let rewritten = rewrite_str(
        fragment,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", {
                    let warnings = Rc::clone(&warnings);
                    move |el| {
                        el.remove();
                        warnings
                            .borrow_mut()
                            .push("removed <script> element".to_string());
                        Ok(())
                    }
                }),
                element!("iframe", {
                    let warnings = Rc::clone(&warnings);
                    move |el| {
                        let src = el.get_attribute("src").unwrap_or_default();
                        if !is_host_allowlisted(&src) {
                            let host = iframe_host(&src).unwrap_or_else(|| src.trim().to_string());
                            el.remove();
                            warnings.borrow_mut().push(format!(
                                "iframe removed: host \"{host}\" is not allow-listed"
                            ));
                        }
                        Ok(())
                    }
                }),
                element!("*", {
                    let warnings = Rc::clone(&warnings);
                    move |el| {
                        if el.removed() {
                            return Ok(());
                        }
                        let tag = el.tag_name();
                        let names: Vec<String> =
                            el.attributes().iter().map(|attr| attr.name()).collect();
                        for name in names {
                            let lowered = name.to_ascii_lowercase();
                            if is_event_handler(&lowered) {
                                el.remove_attribute(&name);
                                warnings.borrow_mut().push(format!(
                                    "removed event handler `{lowered}` from <{tag}>"
                                ));
                                continue;
                            }
                            if URL_ATTRIBUTES.contains(&lowered.as_str())
                                && let Some(value) = el.get_attribute(&name)
                                && has_unsafe_scheme(&value)
                            {
                                el.remove_attribute(&name);
                                warnings.borrow_mut().push(format!(
                                    "removed unsafe `{lowered}` URL from <{tag}>"
                                ));
                            }
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    );

    let mut warnings = Rc::try_unwrap(warnings)
        .map(RefCell::into_inner)
        .unwrap_or_else(|rc| rc.borrow().clone());

    match rewritten {
        Ok(html) => SanitizedFragment { html, warnings },
        Err(err) => {
            warn!(
                target = "vestry::sanitizer",
                error = %err,
                "fragment rejected by rewriter; escaping as text"
            );
            warnings.push(format!("fragment could not be parsed and was escaped: {err}"));
            SanitizedFragment {
                html: ammonia::clean_text(fragment),
                warnings,
            }
        }
    }
}

fn is_event_handler(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].chars().all(|ch| ch.is_ascii_lowercase())
}

fn has_unsafe_scheme(value: &str) -> bool {
    let compact: String = decode_entities(value)
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(scheme))
}

/// Decode the character references commonly used to hide a URL scheme.
fn decode_entities(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(index) = rest.find('&') {
        output.push_str(&rest[..index]);
        rest = &rest[index..];

        let end = rest
            .char_indices()
            .skip(1)
            .take(12)
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '#'))
            .map(|(pos, _)| pos)
            .unwrap_or(rest.len().min(13));
        let entity = &rest[1..end];

        match decode_entity(entity) {
            Some(ch) => {
                output.push(ch);
                rest = rest[end..].strip_prefix(';').unwrap_or(&rest[end..]);
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(entity: &str) -> Option<char> {
    let lowered = entity.to_ascii_lowercase();
    if let Some(hex) = lowered.strip_prefix("#x") {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(decimal) = lowered.strip_prefix('#') {
        return decimal.parse::<u32>().ok().and_then(char::from_u32);
    }
    match lowered.as_str() {
        "colon" => Some(':'),
        "tab" => Some('\t'),
        "newline" => Some('\n'),
        _ => None,
    }
}

fn iframe_host(src: &str) -> Option<String> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return None;
    }
    let absolute = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_with_their_content() {
        let result = sanitize_fragment("<p>Hi</p><script>alert(1)</script>");
        assert_eq!(result.html, "<p>Hi</p>");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn strips_event_handlers() {
        let result = sanitize_fragment(r#"<img src="/a.png" onerror="alert(1)" OnClick="x()">"#);
        assert!(!result.html.to_ascii_lowercase().contains("onerror"));
        assert!(!result.html.to_ascii_lowercase().contains("onclick"));
        assert!(result.html.contains(r#"src="/a.png""#));
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn strips_obfuscated_javascript_urls() {
        for href in [
            "javascript:alert(1)",
            " JaVaScRiPt:alert(1)",
            "java\tscript:alert(1)",
            "javascript&#58;alert(1)",
            "&#x6A;avascript:alert(1)",
            "javascript&colon;alert(1)",
        ] {
            let html = format!(r#"<a href="{href}">x</a>"#);
            let result = sanitize_fragment(&html);
            assert_eq!(result.html, "<a>x</a>", "{href}");
            assert!(!result.warnings.is_empty());
        }
    }

    #[test]
    fn keeps_safe_links() {
        let html = r#"<a href="https://grace.org/visit">Visit</a>"#;
        let result = sanitize_fragment(html);
        assert_eq!(result.html, html);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn keeps_allowlisted_iframe_verbatim() {
        let html = r#"<iframe src="https://www.youtube.com/embed/abc" style="border:0;width:100%"></iframe>"#;
        let result = sanitize_fragment(html);
        assert_eq!(result.html, html);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn removes_unknown_iframe_with_host_warning() {
        let result = sanitize_fragment(r#"<p>a</p><iframe src="https://evil.example/x"></iframe>"#);
        assert_eq!(result.html, "<p>a</p>");
        assert_eq!(
            result.warnings,
            vec![r#"iframe removed: host "evil.example" is not allow-listed"#.to_string()]
        );
    }

    #[test]
    fn host_predicate_handles_protocol_relative_and_garbage() {
        assert!(is_host_allowlisted("//player.vimeo.com/video/1"));
        assert!(is_host_allowlisted("https://open.spotify.com/embed/track/1"));
        assert!(!is_host_allowlisted("javascript:alert(1)"));
        assert!(!is_host_allowlisted("not a url"));
        assert!(!is_host_allowlisted("https://youtube.com.evil.example/"));
    }

    #[test]
    fn malformed_markup_is_best_effort() {
        let result = sanitize_fragment("<div><p onclick='x'>unclosed <b>bold");
        assert!(!result.html.contains("onclick"));
        assert!(result.html.contains("unclosed"));
    }
}
