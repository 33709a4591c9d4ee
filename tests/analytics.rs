mod support;

use serde_json::json;
use support::Harness;

use vestry::application::analytics::AnalyticsEventInput;
use vestry::application::fingerprint::ClientInfo;
use vestry::application::website::WebsiteError;
use vestry::domain::types::{AnalyticsEventType, AnalyticsRange};

const HOST: &str = "grace.vestry.site";

fn page_view(path: &str, source: Option<&str>) -> AnalyticsEventInput {
    AnalyticsEventInput {
        page_path: path.to_string(),
        event_type: AnalyticsEventType::PageView,
        source: source.map(str::to_string),
        payload: None,
    }
}

#[tokio::test]
async fn events_roll_up_into_a_summary() {
    let h = Harness::new();
    let tenant = h.tenant(HOST).await;
    let client = ClientInfo {
        ip: Some("198.51.100.7".into()),
        user_agent: Some("Mozilla/5.0".into()),
    };

    for (path, source) in [
        ("/", None),
        ("visit", Some("google")),
        ("/visit", Some("google")),
        ("/about", Some("  ")),
    ] {
        h.analytics
            .record_event(HOST, page_view(path, source), &client)
            .await
            .unwrap();
    }
    h.analytics
        .record_event(
            HOST,
            AnalyticsEventInput {
                page_path: "/".into(),
                event_type: AnalyticsEventType::CtaClick,
                source: None,
                payload: Some(json!({ "cta": "plan-visit" })),
            },
            &client,
        )
        .await
        .unwrap();

    let summary = h
        .analytics
        .analytics_summary(tenant, AnalyticsRange::Days7)
        .await
        .unwrap();
    assert_eq!(summary.totals.page_view, 4);
    assert_eq!(summary.totals.cta_click, 1);
    assert_eq!(summary.totals.total, 5);
    assert_eq!(summary.timeline.len(), 7);
    assert_eq!(summary.timeline.last().unwrap().counts.total, 5);
    assert_eq!(summary.top_pages[0].key, "/visit");
    assert_eq!(summary.top_pages[0].count, 2);
    assert_eq!(summary.top_sources[0].key, "direct");
    assert_eq!(summary.top_sources[0].count, 3);
    assert_eq!(summary.recent_events.len(), 5);
    assert!(!summary.truncated);

    let stored = h.store.events().await;
    assert!(stored.iter().all(|event| event.ip_hash.is_some()));
    assert!(stored.iter().all(|event| event.payload.is_object()));
}

#[tokio::test]
async fn malformed_events_are_rejected() {
    let h = Harness::new();
    h.tenant(HOST).await;
    let client = ClientInfo::default();

    let err = h
        .analytics
        .record_event(HOST, page_view("   ", None), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let err = h
        .analytics
        .record_event(
            HOST,
            AnalyticsEventInput {
                payload: Some(json!("clicked")),
                ..page_view("/", None)
            },
            &client,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let err = h
        .analytics
        .record_event("unknown.example", page_view("/", None), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { .. }));
    assert!(h.store.events().await.is_empty());
}
