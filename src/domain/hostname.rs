//! Hostname normalization shared by domain registration and public routing.

use crate::domain::error::DomainError;

/// Reduce user or header input to a bare lowercase hostname.
///
/// `HTTPS://Example.com:8443/about?x=1` becomes `example.com`.
pub fn normalize_hostname(input: &str) -> Result<String, DomainError> {
    let mut host = input.trim().to_ascii_lowercase();

    if let Some(index) = host.find("://") {
        host.drain(..index + 3);
    }
    if let Some(index) = host.find(['/', '?', '#']) {
        host.truncate(index);
    }
    if let Some(index) = host.rfind('@') {
        host.drain(..=index);
    }
    if !host.starts_with('[')
        && let Some(index) = host.rfind(':')
    {
        host.truncate(index);
    }

    let host = host.trim_end_matches(['.', '/']).to_string();
    if host.is_empty() {
        return Err(DomainError::validation("hostname", "hostname is required"));
    }
    if host
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '[' | ']' | ':')))
    {
        return Err(DomainError::validation(
            "hostname",
            format!("`{host}` is not a valid hostname"),
        ));
    }
    Ok(host)
}

/// Whether `host` is the apex itself or a subdomain of it.
pub fn is_within_apex(host: &str, apex: &str) -> bool {
    let apex = apex.trim().trim_end_matches('.').to_ascii_lowercase();
    if apex.is_empty() {
        return false;
    }
    host == apex || host.ends_with(&format!(".{apex}"))
}

/// Host portion of an absolute URL, normalized.
pub fn url_host(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value.trim()).ok()?;
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_case_and_trailing_slash() {
        assert_eq!(normalize_hostname("HTTPS://Example.com/").unwrap(), "example.com");
        assert_eq!(normalize_hostname("example.com").unwrap(), "example.com");
    }

    #[test]
    fn strips_port_path_and_query() {
        assert_eq!(
            normalize_hostname("http://grace.vestry.site:8080/about?ref=1").unwrap(),
            "grace.vestry.site"
        );
        assert_eq!(normalize_hostname("Example.COM.").unwrap(), "example.com");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(normalize_hostname("   ").is_err());
        assert!(normalize_hostname("https:///").is_err());
        assert!(normalize_hostname("exa mple.com").is_err());
    }

    #[test]
    fn apex_membership() {
        assert!(is_within_apex("grace.vestry.site", "vestry.site"));
        assert!(is_within_apex("vestry.site", "vestry.site"));
        assert!(!is_within_apex("evilvestry.site", "vestry.site"));
    }

    #[test]
    fn url_host_lowercases() {
        assert_eq!(url_host("https://WWW.Grace.org/home").as_deref(), Some("www.grace.org"));
        assert_eq!(url_host("not a url"), None);
    }
}
