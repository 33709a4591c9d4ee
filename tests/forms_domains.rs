mod support;

use serde_json::json;
use support::Harness;
use uuid::Uuid;

use vestry::application::dns::TxtLookup;
use vestry::application::domains::DnsCheckOutcome;
use vestry::application::fingerprint::ClientInfo;
use vestry::application::forms::{
    CreateFormCommand, FormSubmission, SubmissionPolicy, UpdateFormCommand,
};
use vestry::application::website::WebsiteError;
use vestry::domain::types::{AnalyticsEventType, DomainStatus, SslStatus, SubmissionStatus};

const EDITOR: Option<&str> = Some("editor@grace.org");
const HOST: &str = "grace.vestry.site";

fn visitor(ip: &str) -> ClientInfo {
    ClientInfo {
        ip: Some(ip.to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
    }
}

async fn contact_form(h: &Harness, tenant: Uuid) -> Uuid {
    h.forms
        .create_form(
            tenant,
            EDITOR,
            CreateFormCommand {
                key: "contact".into(),
                name: "Contact us".into(),
                schema: None,
            },
        )
        .await
        .unwrap()
        .id
}

fn fields(value: serde_json::Value) -> FormSubmission {
    FormSubmission {
        fields: Some(value),
        source: Some("newsletter".into()),
    }
}

#[tokio::test]
async fn submissions_are_scored_and_recorded() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    let clean = h
        .forms
        .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("198.51.100.1"))
        .await
        .unwrap();
    assert_eq!(clean.status, SubmissionStatus::Received);
    assert_eq!(clean.spam_score, 0);

    let spam = h
        .forms
        .submit(
            HOST,
            "contact",
            fields(json!({
                "message": format!("{} https://spam.example", "x".repeat(900))
            })),
            &visitor("198.51.100.2"),
        )
        .await
        .unwrap();
    assert_eq!(spam.status, SubmissionStatus::Quarantined);
    assert_eq!(spam.spam_score, 55);

    let stored = h.store.submissions().await;
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|submission| {
        submission
            .ip_hash
            .as_deref()
            .is_some_and(|hash| hash.len() == 64 && !hash.contains("198.51"))
    }));

    let events = h.store.events().await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| {
        event.event_type == AnalyticsEventType::FormSubmit && event.page_path == "/_forms/contact"
    }));
}

#[tokio::test]
async fn repeated_submissions_from_one_ip_are_rate_limited() {
    let h = Harness::with_policy(SubmissionPolicy {
        max_submissions: 2,
        ..SubmissionPolicy::default()
    });
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    for _ in 0..2 {
        h.forms
            .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("203.0.113.5"))
            .await
            .unwrap();
    }
    let err = h
        .forms
        .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("203.0.113.5"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WebsiteError::RateLimited {
            retry_after_seconds: 60
        }
    ));

    // A different visitor is unaffected.
    h.forms
        .submit(HOST, "contact", fields(json!({ "name": "Boaz" })), &visitor("203.0.113.6"))
        .await
        .unwrap();

    h.store.age_submissions(time::Duration::minutes(2)).await;
    h.forms
        .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("203.0.113.5"))
        .await
        .unwrap();
}

#[tokio::test]
async fn default_policy_allows_four_submissions_per_minute() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    let mut accepted = Vec::new();
    for _ in 0..5 {
        let result = h
            .forms
            .submit(HOST, "contact", fields(json!({ "name": "Naomi" })), &visitor("203.0.113.9"))
            .await;
        accepted.push(result.is_ok());
    }
    assert_eq!(accepted, [true, true, true, true, false]);
}

#[tokio::test]
async fn visitors_without_an_address_share_one_budget() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    let anonymous = |agent: &str| ClientInfo {
        ip: None,
        user_agent: Some(agent.to_string()),
    };
    for i in 0..4 {
        h.forms
            .submit(
                HOST,
                "contact",
                fields(json!({ "name": "Orpah" })),
                &anonymous(&format!("agent-{i}")),
            )
            .await
            .unwrap();
    }
    let err = h
        .forms
        .submit(HOST, "contact", fields(json!({ "name": "Orpah" })), &anonymous("agent-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::RateLimited { .. }));

    let stored = h.store.submissions().await;
    assert!(stored.iter().all(|submission| submission.ip_hash.is_some()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_exceed_the_budget() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let forms = h.forms.clone();
        handles.push(tokio::spawn(async move {
            forms
                .submit(HOST, "contact", fields(json!({ "name": "Jesse" })), &visitor("203.0.113.20"))
                .await
        }));
    }

    let mut stored = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => stored += 1,
            Err(WebsiteError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(stored, 4);
    assert_eq!(limited, 8);
    assert_eq!(h.store.submissions().await.len(), 4);
}

#[tokio::test]
async fn inactive_or_unknown_forms_reject_submissions() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    let form_id = contact_form(&h, tenant).await;
    h.forms
        .update_form(
            tenant,
            EDITOR,
            form_id,
            UpdateFormCommand {
                is_active: Some(false),
                ..UpdateFormCommand::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .forms
        .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("198.51.100.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { entity: "form" }));

    let err = h
        .forms
        .submit(HOST, "prayer", fields(json!({})), &visitor("198.51.100.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { entity: "form" }));
}

#[tokio::test]
async fn form_keys_are_unique_slugs_and_fields_must_be_objects() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    contact_form(&h, tenant).await;

    let duplicate = h
        .forms
        .create_form(
            tenant,
            EDITOR,
            CreateFormCommand {
                key: "contact".into(),
                name: "Again".into(),
                schema: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(duplicate, WebsiteError::Validation(_)));

    let bad_key = h
        .forms
        .create_form(
            tenant,
            EDITOR,
            CreateFormCommand {
                key: "Contact Us".into(),
                name: "Contact".into(),
                schema: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(bad_key, WebsiteError::Validation(_)));

    let err = h
        .forms
        .submit(HOST, "contact", fields(json!(["a"])), &visitor("198.51.100.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));
}

#[tokio::test]
async fn submission_status_can_be_triaged() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    let form_id = contact_form(&h, tenant).await;
    let receipt = h
        .forms
        .submit(HOST, "contact", fields(json!({ "name": "Ruth" })), &visitor("198.51.100.1"))
        .await
        .unwrap();

    let updated = h
        .forms
        .update_submission_status(tenant, EDITOR, receipt.id, "resolved")
        .await
        .unwrap();
    assert_eq!(updated.status, SubmissionStatus::Resolved);

    let resolved = h
        .forms
        .list_submissions(tenant, Some(form_id), Some("resolved"), 50)
        .await
        .unwrap();
    assert_eq!(resolved.len(), 1);
    let received = h
        .forms
        .list_submissions(tenant, None, Some("received"), 50)
        .await
        .unwrap();
    assert!(received.is_empty());

    let err = h
        .forms
        .update_submission_status(tenant, EDITOR, receipt.id, "deleted")
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let err = h
        .forms
        .update_submission_status(tenant, EDITOR, Uuid::new_v4(), "resolved")
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { entity: "submission" }));
}

#[tokio::test]
async fn domains_under_the_platform_apex_are_verified_on_add() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();

    let platform = h
        .domains
        .add_domain(tenant, EDITOR, "grace.vestry.site")
        .await
        .unwrap();
    assert_eq!(platform.status, DomainStatus::Verified);
    assert_eq!(platform.ssl_status, SslStatus::Active);
    assert!(platform.verified_at.is_some());

    let custom = h
        .domains
        .add_domain(tenant, EDITOR, "grace.org")
        .await
        .unwrap();
    assert_eq!(custom.status, DomainStatus::Pending);
    assert_eq!(custom.verification_token.len(), 32);

    let err = h
        .domains
        .add_domain(Uuid::new_v4(), EDITOR, "GRACE.org")
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));
}

#[tokio::test]
async fn verification_distinguishes_missing_and_unavailable_dns() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();
    let domain = h
        .domains
        .add_domain(tenant, EDITOR, "grace.org")
        .await
        .unwrap();

    let missing = h
        .domains
        .verify_domain(tenant, EDITOR, domain.id)
        .await
        .unwrap();
    assert_eq!(missing.outcome, DnsCheckOutcome::NotFound);
    assert_eq!(missing.domain.status, DomainStatus::Pending);
    assert!(missing.domain.last_error.is_some());
    assert!(missing.domain.last_checked_at.is_some());

    h.dns
        .answer(
            "_verify.grace.org",
            TxtLookup::Records(vec![domain.verification_token.clone()]),
        )
        .await;
    let found = h
        .domains
        .verify_domain(tenant, EDITOR, domain.id)
        .await
        .unwrap();
    assert_eq!(found.outcome, DnsCheckOutcome::Found);
    assert_eq!(found.domain.status, DomainStatus::Verified);
    assert!(found.domain.last_error.is_none());

    h.dns
        .answer("_verify.grace.org", TxtLookup::Unavailable("timed out".into()))
        .await;
    let checks = h.domains.health_check_domains(tenant, None).await.unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].domain.status, DomainStatus::Verified);
    assert_eq!(
        checks[0].domain.last_error.as_deref(),
        Some("DNS lookup unavailable: timed out")
    );
    assert_eq!(checks[0].domain.verified_at, found.domain.verified_at);
}

#[tokio::test]
async fn only_one_verified_domain_is_primary() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();
    let first = h
        .domains
        .add_domain(tenant, EDITOR, "grace.vestry.site")
        .await
        .unwrap();
    let second = h
        .domains
        .add_domain(tenant, EDITOR, "www.grace.vestry.site")
        .await
        .unwrap();
    let pending = h
        .domains
        .add_domain(tenant, EDITOR, "grace.org")
        .await
        .unwrap();

    let err = h
        .domains
        .set_primary_domain(tenant, EDITOR, pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    h.domains
        .set_primary_domain(tenant, EDITOR, first.id)
        .await
        .unwrap();
    h.domains
        .set_primary_domain(tenant, EDITOR, second.id)
        .await
        .unwrap();

    let primaries: Vec<_> = h
        .domains
        .list_domains(tenant)
        .await
        .unwrap()
        .into_iter()
        .filter(|domain| domain.is_primary)
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].id, second.id);
}

#[tokio::test]
async fn canonical_redirect_requires_an_absolute_url() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();
    let domain = h
        .domains
        .add_domain(tenant, EDITOR, "grace.vestry.site")
        .await
        .unwrap();

    let err = h
        .domains
        .update_domain_routing(tenant, EDITOR, domain.id, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let err = h
        .domains
        .update_domain_routing(tenant, EDITOR, domain.id, true, Some("grace.org"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let updated = h
        .domains
        .update_domain_routing(tenant, EDITOR, domain.id, false, Some(" "))
        .await
        .unwrap();
    assert!(!updated.redirect_to_canonical);
    assert!(updated.canonical_url.is_none());

    h.domains.delete_domain(tenant, EDITOR, domain.id).await.unwrap();
    let err = h
        .domains
        .delete_domain(tenant, EDITOR, domain.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { entity: "domain" }));
}
