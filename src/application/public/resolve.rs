//! Host-based routing of public requests to a tenant website.

use std::sync::Arc;

use tracing::debug;

use crate::application::repos::{DomainsRepo, TenantDirectory};
use crate::application::website::{WebsiteError, WebsiteService};
use crate::domain::entities::{DomainRecord, WebsiteRecord};
use crate::domain::hostname::normalize_hostname;
use crate::domain::types::DomainStatus;

#[derive(Debug, Clone)]
pub struct ResolvedSite {
    pub website: WebsiteRecord,
    /// Normalized hostname the request matched.
    pub hostname: String,
    /// Custom domain row when the match came from one.
    pub domain: Option<DomainRecord>,
    /// Canonical URL the request should be redirected to, if any.
    pub redirect_to: Option<String>,
}

#[derive(Clone)]
pub struct SiteResolver {
    tenants: Arc<dyn TenantDirectory>,
    domains: Arc<dyn DomainsRepo>,
    websites: WebsiteService,
}

impl SiteResolver {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        domains: Arc<dyn DomainsRepo>,
        websites: WebsiteService,
    ) -> Self {
        Self {
            tenants,
            domains,
            websites,
        }
    }

    /// Match a host to a website: the tenant's primary domain first, then a
    /// verified custom domain.
    pub async fn resolve_host(&self, host: &str) -> Result<ResolvedSite, WebsiteError> {
        let hostname =
            normalize_hostname(host).map_err(|_| WebsiteError::not_found("website"))?;

        if let Some(tenant_id) = self.tenants.find_tenant_by_domain(&hostname).await? {
            let website = self.websites.ensure_website(tenant_id).await?;
            return Ok(ResolvedSite {
                website,
                hostname,
                domain: None,
                redirect_to: None,
            });
        }

        let domain = self
            .domains
            .find_domain_by_hostname(&hostname)
            .await?
            .filter(|domain| domain.status == DomainStatus::Verified)
            .ok_or(WebsiteError::not_found("website"))?;
        let website = self
            .websites
            .find_website(domain.website_id)
            .await?
            .ok_or(WebsiteError::not_found("website"))?;

        Ok(ResolvedSite {
            website,
            hostname,
            domain: Some(domain),
            redirect_to: None,
        })
    }

    /// Like [`resolve_host`](Self::resolve_host), also applying the matched
    /// domain's canonical redirect policy.
    pub async fn resolve_host_with_redirect(
        &self,
        host: &str,
    ) -> Result<ResolvedSite, WebsiteError> {
        let mut resolved = self.resolve_host(host).await?;
        resolved.redirect_to = resolved
            .domain
            .as_ref()
            .and_then(|domain| canonical_redirect(domain, &resolved.hostname));
        if let Some(target) = &resolved.redirect_to {
            debug!(
                target = "vestry::public::resolve",
                host = %resolved.hostname,
                redirect_to = %target,
                "canonical redirect"
            );
        }
        Ok(resolved)
    }
}

/// Redirect target for `domain`, unless it would point back at `hostname`.
pub fn canonical_redirect(domain: &DomainRecord, hostname: &str) -> Option<String> {
    if !domain.redirect_to_canonical {
        return None;
    }
    let canonical = domain
        .canonical_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let canonical_host = normalize_hostname(canonical).ok()?;
    if canonical_host == hostname {
        return None;
    }

    let target = if canonical.contains("://") {
        canonical.to_string()
    } else {
        format!("https://{canonical}")
    };
    Some(target.trim_end_matches('/').to_string())
}
