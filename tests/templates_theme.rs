mod support;

use serde_json::{Map, Value, json};
use support::Harness;
use uuid::Uuid;

use vestry::application::website::{CreatePageCommand, WebsiteError};
use vestry::domain::types::RevisionStatus;

const EDITOR: Option<&str> = Some("editor@grace.org");

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[tokio::test]
async fn applying_a_template_replaces_pages_and_theme() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();
    h.website
        .create_page(
            tenant,
            EDITOR,
            CreatePageCommand {
                title: "Old page".into(),
                slug: Some("old-page".into()),
            },
        )
        .await
        .unwrap();

    let website = h
        .website
        .apply_template(tenant, EDITOR, "civic-light")
        .await
        .unwrap();
    assert_eq!(website.template_key.as_deref(), Some("civic-light"));
    assert_eq!(website.theme_config["colors"]["primary"], "#2563eb");

    let slugs: Vec<String> = h
        .website
        .list_pages(tenant)
        .await
        .unwrap()
        .into_iter()
        .map(|page| page.slug)
        .collect();
    assert!(slugs.contains(&"home".to_string()));
    assert!(slugs.contains(&"visit".to_string()));
    assert!(!slugs.contains(&"old-page".to_string()));

    let themes = h.website.list_theme_revisions(tenant).await.unwrap();
    assert_eq!(themes.len(), 2);
    assert_eq!(themes[0].version, 2);
    assert_eq!(themes[0].status, RevisionStatus::Published);
    assert_eq!(themes[1].status, RevisionStatus::Archived);

    let view = h.website.get_theme(tenant).await.unwrap();
    assert_eq!(view.published_version, Some(2));
    assert!(
        h.store
            .audit_actions(website.id)
            .await
            .contains(&"template.apply".to_string())
    );
}

#[tokio::test]
async fn template_pages_are_published_with_sections() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();
    h.website
        .apply_template(tenant, EDITOR, "civic-light")
        .await
        .unwrap();

    let home = h
        .website
        .list_pages(tenant)
        .await
        .unwrap()
        .into_iter()
        .find(|page| page.slug == "home")
        .unwrap();
    let detail = h.website.get_page(tenant, home.id).await.unwrap();
    assert!(detail.page.is_published);
    let block_ids: Vec<&str> = detail
        .sections
        .iter()
        .map(|section| section.block_id.as_str())
        .collect();
    assert_eq!(
        block_ids,
        vec!["hero", "service-times", "upcoming-events", "footer"]
    );
    assert_eq!(detail.revisions.len(), 1);
    assert_eq!(detail.revisions[0].status, RevisionStatus::Published);
}

#[tokio::test]
async fn unknown_template_is_not_found() {
    let h = Harness::new();
    let err = h
        .website
        .apply_template(Uuid::new_v4(), EDITOR, "neon-nights")
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::NotFound { entity: "template" }));
}

#[tokio::test]
async fn theme_patch_merges_and_archives_previous_revision() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();

    let revision = h
        .website
        .update_theme(
            tenant,
            EDITOR,
            object(json!({ "colors": { "primary": "#000000" } })),
            Some("Darker".into()),
        )
        .await
        .unwrap();
    assert_eq!(revision.version, 2);
    assert_eq!(revision.theme_config["colors"]["primary"], "#000000");
    assert_eq!(revision.theme_config["typography"]["heading"], "Merriweather");

    let view = h.website.get_theme(tenant).await.unwrap();
    assert_eq!(view.theme_config["colors"]["primary"], "#000000");
    assert_eq!(view.published_version, Some(2));

    let published = h
        .website
        .list_theme_revisions(tenant)
        .await
        .unwrap()
        .into_iter()
        .filter(|revision| revision.status == RevisionStatus::Published)
        .count();
    assert_eq!(published, 1);
}

#[tokio::test]
async fn empty_theme_patch_is_rejected() {
    let h = Harness::new();
    let err = h
        .website
        .update_theme(Uuid::new_v4(), EDITOR, Map::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));
}

#[tokio::test]
async fn global_seo_merges_into_theme() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();

    let seo = h
        .website
        .update_global_seo(
            tenant,
            EDITOR,
            object(json!({
                "siteName": "Grace Church",
                "canonicalBaseUrl": "https://grace.org/",
                "robotsFollow": false,
                "metaDescription": "   "
            })),
        )
        .await
        .unwrap();
    assert_eq!(seo.site_name, "Grace Church");
    assert_eq!(seo.canonical_base_url, "https://grace.org");
    assert!(!seo.robots_follow);
    assert!(seo.robots_index);
    assert_eq!(
        seo.meta_description,
        vestry::domain::seo::DEFAULT_META_DESCRIPTION
    );

    let stored = h.website.get_global_seo(tenant).await.unwrap();
    assert_eq!(stored, seo);
}

#[tokio::test]
async fn theme_patches_touching_seo_are_validated_and_normalized() {
    let h = Harness::new();
    let tenant = Uuid::new_v4();

    let err = h
        .website
        .update_theme(
            tenant,
            EDITOR,
            object(json!({ "seo": { "canonicalBaseUrl": "grace.org" } })),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));

    let err = h
        .website
        .update_theme(tenant, EDITOR, object(json!({ "seo": "noindex" })), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));
    assert_eq!(h.website.list_theme_revisions(tenant).await.unwrap().len(), 1);

    let revision = h
        .website
        .update_theme(
            tenant,
            EDITOR,
            object(json!({
                "seo": { "siteName": "Grace Church", "robotsIndex": false },
                "fonts": { "heading": "Lora" }
            })),
            None,
        )
        .await
        .unwrap();
    let seo = &revision.theme_config["seo"];
    assert_eq!(seo["siteName"], "Grace Church");
    assert_eq!(seo["robotsIndex"], false);
    assert_eq!(seo["robotsFollow"], true);
    assert_eq!(
        seo["metaDescription"],
        vestry::domain::seo::DEFAULT_META_DESCRIPTION
    );
    assert_eq!(revision.theme_config["fonts"]["heading"], "Lora");
}

#[tokio::test]
async fn global_seo_rejects_relative_base_url() {
    let h = Harness::new();
    let err = h
        .website
        .update_global_seo(
            Uuid::new_v4(),
            EDITOR,
            object(json!({ "canonicalBaseUrl": "grace.org" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WebsiteError::Validation(_)));
}
