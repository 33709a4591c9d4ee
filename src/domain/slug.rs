//! Slug derivation and validation for page slugs and form keys.
//!
//! Titles are transliterated (`pinyin` for CJK input) and then slugified with
//! the `slug` crate, so "主日崇拜" becomes `zhu-ri-chong-bai`. Explicit slugs
//! supplied by editors are validated rather than rewritten.

use std::future::Future;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;
pub const MAX_SLUG_LEN: usize = 96;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{slug}` is not a valid slug (lowercase letters, digits and single dashes, up to 96 characters)")]
    Invalid { slug: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a slug from human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(transliterate_to_ascii(input));
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    let mut truncated: String = candidate.chars().take(MAX_SLUG_LEN).collect();
    while truncated.ends_with('-') {
        truncated.pop();
    }
    Ok(truncated)
}

/// Validate an editor-supplied slug without rewriting it.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');

    if valid {
        Ok(())
    } else {
        Err(SlugError::Invalid {
            slug: slug.to_string(),
        })
    }
}

/// Derive a slug from `input`, suffixing `-2`, `-3`, … until `is_unique` accepts it.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("主日 Worship").expect("slug");
        assert_eq!(slug, "zhu-ri-worship");
    }

    #[test]
    fn derive_slug_rejects_blank_titles() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn validate_slug_accepts_kebab_case() {
        assert!(validate_slug("plan-a-visit").is_ok());
        assert!(validate_slug("home").is_ok());
    }

    #[test]
    fn validate_slug_rejects_uppercase_and_edges() {
        for bad in ["About", "-about", "about-", "about--us", "", "about us", "über"] {
            assert!(validate_slug(bad).is_err(), "{bad} should be invalid");
        }
    }

    #[tokio::test]
    async fn unique_slug_appends_counter() {
        let taken = ["visit".to_string(), "visit-2".to_string()];
        let slug = generate_unique_slug_async("Visit", |candidate| {
            let free = !taken.contains(&candidate.to_string());
            async move { Ok::<_, std::io::Error>(free) }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "visit-3");
    }
}
