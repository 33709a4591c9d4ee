//! Custom domains: registration, TXT ownership checks, primary selection and
//! canonical routing.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::audit::WebsiteAuditService;
use crate::application::dns::{TxtLookup, TxtResolver};
use crate::application::repos::{
    DomainsRepo, RecordDomainCheckParams, SetPrimaryDomainParams, UpdateDomainRoutingParams,
};
use crate::application::website::{WebsiteError, WebsiteService, WebsiteStores};
use crate::domain::entities::{DomainRecord, WebsiteRecord};
use crate::domain::hostname::{is_within_apex, normalize_hostname};
use crate::domain::types::{DomainStatus, SslStatus};

/// Result of one ownership check.
///
/// `Unavailable` means the resolver gave no definitive answer; the domain
/// keeps its current status until a later check succeeds or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum DnsCheckOutcome {
    Found,
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheck {
    pub domain: DomainRecord,
    pub outcome: DnsCheckOutcome,
}

#[derive(Debug, Clone)]
pub struct DomainSettings {
    pub platform_apex: String,
    pub verification_prefix: String,
}

#[derive(Clone)]
pub struct DomainService {
    websites: WebsiteService,
    domains: Arc<dyn DomainsRepo>,
    resolver: Arc<dyn TxtResolver>,
    settings: DomainSettings,
}

impl DomainService {
    pub fn new(
        stores: &WebsiteStores,
        websites: WebsiteService,
        resolver: Arc<dyn TxtResolver>,
        settings: DomainSettings,
    ) -> Self {
        Self {
            websites,
            domains: stores.domains.clone(),
            resolver,
            settings,
        }
    }

    pub async fn list_domains(&self, tenant_id: Uuid) -> Result<Vec<DomainRecord>, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        Ok(self.domains.list_domains(website.id).await?)
    }

    /// Register a hostname. Hosts under the platform apex are trusted and
    /// verified immediately; anything else waits for a TXT check.
    pub async fn add_domain(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        hostname: &str,
    ) -> Result<DomainRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let hostname = normalize_hostname(hostname)?;
        if self
            .domains
            .find_domain_by_hostname(&hostname)
            .await?
            .is_some()
        {
            return Err(WebsiteError::validation(format!(
                "hostname `{hostname}` is already registered"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let platform = is_within_apex(&hostname, &self.settings.platform_apex);
        let domain = DomainRecord {
            id: Uuid::new_v4(),
            website_id: website.id,
            hostname,
            status: if platform {
                DomainStatus::Verified
            } else {
                DomainStatus::Pending
            },
            ssl_status: if platform {
                SslStatus::Active
            } else {
                SslStatus::Pending
            },
            verification_token: Uuid::new_v4().simple().to_string(),
            is_primary: false,
            redirect_to_canonical: false,
            canonical_url: None,
            last_checked_at: None,
            verified_at: platform.then_some(now),
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        let domain = self.domains.create_domain(domain).await?;
        self.websites
            .audit()
            .record(
                website.id,
                None,
                actor,
                "domain.add",
                &json!({
                    "domainId": domain.id,
                    "hostname": domain.hostname,
                    "status": domain.status,
                }),
            )
            .await?;
        Ok(domain)
    }

    pub async fn delete_domain(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        domain_id: Uuid,
    ) -> Result<(), WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let domain = self.require_domain(&website, domain_id).await?;
        if !self.domains.delete_domain(website.id, domain.id).await? {
            return Err(WebsiteError::not_found("domain"));
        }
        self.websites
            .audit()
            .record(
                website.id,
                None,
                actor,
                "domain.delete",
                &json!({ "domainId": domain.id, "hostname": domain.hostname }),
            )
            .await?;
        Ok(())
    }

    pub async fn verify_domain(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        domain_id: Uuid,
    ) -> Result<DomainCheck, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let domain = self.require_domain(&website, domain_id).await?;
        self.check(&website, actor, domain, "domain.verify").await
    }

    /// Re-run the ownership check for every domain of the website.
    pub async fn health_check_domains(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
    ) -> Result<Vec<DomainCheck>, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let domains = self.domains.list_domains(website.id).await?;

        let mut checks = Vec::with_capacity(domains.len());
        for domain in domains {
            checks.push(
                self.check(&website, actor, domain, "domain.health_check")
                    .await?,
            );
        }
        Ok(checks)
    }

    pub async fn set_primary_domain(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        domain_id: Uuid,
    ) -> Result<DomainRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let domain = self.require_domain(&website, domain_id).await?;
        if domain.status != DomainStatus::Verified {
            return Err(WebsiteError::validation(
                "only verified domains can be made primary",
            ));
        }

        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            "domain.primary",
            &json!({ "domainId": domain.id, "hostname": domain.hostname }),
        );
        Ok(self
            .domains
            .set_primary_domain(SetPrimaryDomainParams {
                website_id: website.id,
                domain_id: domain.id,
                audit,
            })
            .await?)
    }

    pub async fn update_domain_routing(
        &self,
        tenant_id: Uuid,
        actor: Option<&str>,
        domain_id: Uuid,
        redirect_to_canonical: bool,
        canonical_url: Option<&str>,
    ) -> Result<DomainRecord, WebsiteError> {
        let website = self.websites.ensure_website(tenant_id).await?;
        let domain = self.require_domain(&website, domain_id).await?;

        let canonical_url = canonical_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(validate_canonical_url)
            .transpose()?;
        if redirect_to_canonical && canonical_url.is_none() {
            return Err(WebsiteError::validation(
                "canonicalUrl is required when redirectToCanonical is enabled",
            ));
        }

        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            "domain.routing",
            &json!({
                "domainId": domain.id,
                "before": {
                    "redirectToCanonical": domain.redirect_to_canonical,
                    "canonicalUrl": domain.canonical_url,
                },
                "after": {
                    "redirectToCanonical": redirect_to_canonical,
                    "canonicalUrl": canonical_url,
                },
            }),
        );
        Ok(self
            .domains
            .update_domain_routing(UpdateDomainRoutingParams {
                website_id: website.id,
                domain_id: domain.id,
                redirect_to_canonical,
                canonical_url,
                audit,
            })
            .await?)
    }

    async fn check(
        &self,
        website: &WebsiteRecord,
        actor: Option<&str>,
        domain: DomainRecord,
        action: &str,
    ) -> Result<DomainCheck, WebsiteError> {
        let now = OffsetDateTime::now_utc();
        let outcome = if is_within_apex(&domain.hostname, &self.settings.platform_apex) {
            DnsCheckOutcome::Found
        } else {
            let name = format!("{}.{}", self.settings.verification_prefix, domain.hostname);
            classify(
                self.resolver.lookup_txt(&name).await,
                &domain.verification_token,
            )
        };

        let (status, ssl_status, verified_at, last_error) = match &outcome {
            DnsCheckOutcome::Found => (
                DomainStatus::Verified,
                SslStatus::Active,
                domain.verified_at.or(Some(now)),
                None,
            ),
            DnsCheckOutcome::NotFound => (
                DomainStatus::Pending,
                SslStatus::Pending,
                None,
                Some(format!(
                    "TXT record {}.{} does not contain the verification token",
                    self.settings.verification_prefix, domain.hostname
                )),
            ),
            DnsCheckOutcome::Unavailable(reason) => (
                domain.status,
                domain.ssl_status,
                domain.verified_at,
                Some(format!("DNS lookup unavailable: {reason}")),
            ),
        };

        match &outcome {
            DnsCheckOutcome::Unavailable(reason) => warn!(
                target = "vestry::domains",
                domain_id = %domain.id,
                hostname = %domain.hostname,
                reason = %reason,
                "domain check inconclusive"
            ),
            _ => info!(
                target = "vestry::domains",
                domain_id = %domain.id,
                hostname = %domain.hostname,
                status = ?status,
                "domain checked"
            ),
        }
        metrics::counter!("vestry_domain_check_total").increment(1);

        let audit = WebsiteAuditService::entry(
            website.id,
            None,
            actor,
            action,
            &json!({
                "domainId": domain.id,
                "hostname": domain.hostname,
                "previousStatus": domain.status,
                "status": status,
                "outcome": outcome,
            }),
        );
        let domain = self
            .domains
            .record_domain_check(RecordDomainCheckParams {
                website_id: website.id,
                domain_id: domain.id,
                status,
                ssl_status,
                verified_at,
                checked_at: now,
                last_error,
                audit,
            })
            .await?;

        Ok(DomainCheck { domain, outcome })
    }

    async fn require_domain(
        &self,
        website: &WebsiteRecord,
        domain_id: Uuid,
    ) -> Result<DomainRecord, WebsiteError> {
        self.domains
            .find_domain(website.id, domain_id)
            .await?
            .ok_or(WebsiteError::not_found("domain"))
    }
}

/// Map a raw TXT answer to a check outcome for `token`.
pub fn classify(lookup: TxtLookup, token: &str) -> DnsCheckOutcome {
    match lookup {
        TxtLookup::Records(records) if records.iter().any(|record| record.trim() == token) => {
            DnsCheckOutcome::Found
        }
        TxtLookup::Records(_) | TxtLookup::NoRecords => DnsCheckOutcome::NotFound,
        TxtLookup::Unavailable(reason) => DnsCheckOutcome::Unavailable(reason),
    }
}

fn validate_canonical_url(value: &str) -> Result<String, WebsiteError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(value.trim_end_matches('/').to_string())
        }
        _ => Err(WebsiteError::validation(
            "canonicalUrl must be an absolute http(s) URL",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_token_exactly() {
        let found = classify(
            TxtLookup::Records(vec!["other".into(), " abc123 ".into()]),
            "abc123",
        );
        assert_eq!(found, DnsCheckOutcome::Found);

        let missing = classify(TxtLookup::Records(vec!["abc".into()]), "abc123");
        assert_eq!(missing, DnsCheckOutcome::NotFound);
        assert_eq!(
            classify(TxtLookup::NoRecords, "abc123"),
            DnsCheckOutcome::NotFound
        );
    }

    #[test]
    fn classify_keeps_resolver_failures_distinct() {
        let outcome = classify(TxtLookup::Unavailable("timed out".into()), "abc123");
        assert_eq!(outcome, DnsCheckOutcome::Unavailable("timed out".into()));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"result": "unavailable", "reason": "timed out"})
        );
    }

    #[test]
    fn canonical_url_must_be_http() {
        assert_eq!(
            validate_canonical_url("https://grace.org/").unwrap(),
            "https://grace.org"
        );
        assert!(validate_canonical_url("grace.org").is_err());
        assert!(validate_canonical_url("ftp://grace.org").is_err());
    }
}
