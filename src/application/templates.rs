//! Built-in starter templates used to seed and re-theme tenant websites.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Active,
    Beta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePage {
    pub slug: &'static str,
    pub title: &'static str,
    pub blocks: Vec<Value>,
    pub seo: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub family: &'static str,
    pub description: &'static str,
    pub preview_image_url: &'static str,
    pub status: TemplateStatus,
    pub theme_config: Value,
    pub pages: Vec<TemplatePage>,
}

static TEMPLATES: Lazy<Vec<TemplateDefinition>> =
    Lazy::new(|| vec![civic_light(), harbor_modern(), heritage_classic()]);

pub fn templates() -> &'static [TemplateDefinition] {
    TEMPLATES.as_slice()
}

pub fn find_template(key: &str) -> Option<&'static TemplateDefinition> {
    let key = key.trim();
    templates().iter().find(|template| template.key == key)
}

/// Theme given to a website before any template is applied.
pub fn default_theme_config() -> Value {
    json!({
        "colors": {
            "primary": "#1f4e79",
            "secondary": "#f2a900",
            "background": "#ffffff",
            "text": "#1a1a1a"
        },
        "typography": { "heading": "Merriweather", "body": "Inter" },
        "layout": { "maxWidth": 1200, "radius": 8 },
        "seo": {
            "siteName": "Our Church",
            "robotsIndex": true,
            "robotsFollow": true
        }
    })
}

/// Block list of the home page created for a brand new website.
pub fn default_home_blocks() -> Vec<Value> {
    vec![json!({
        "id": "hero-1",
        "type": "hero",
        "settings": {
            "heading": "Welcome home",
            "subheading": "Join us this Sunday.",
            "ctaLabel": "Plan a visit",
            "ctaHref": "/visit"
        }
    })]
}

fn civic_light() -> TemplateDefinition {
    TemplateDefinition {
        key: "civic-light",
        name: "Civic Light",
        family: "civic",
        description: "Bright, airy layout for neighborhood congregations with a strong events focus.",
        preview_image_url: "https://assets.vestry.site/templates/civic-light.png",
        status: TemplateStatus::Active,
        theme_config: json!({
            "colors": {
                "primary": "#2563eb",
                "secondary": "#f59e0b",
                "background": "#f8fafc",
                "text": "#0f172a"
            },
            "typography": { "heading": "Source Serif Pro", "body": "Inter" },
            "layout": { "maxWidth": 1180, "radius": 12 },
            "seo": { "siteName": "Our Church", "robotsIndex": true, "robotsFollow": true }
        }),
        pages: vec![
            TemplatePage {
                slug: "home",
                title: "Home",
                blocks: vec![
                    json!({
                        "id": "hero",
                        "type": "hero",
                        "settings": {
                            "heading": "A church for the whole city",
                            "subheading": "Sundays at 9 & 11am",
                            "ctaLabel": "Plan your visit",
                            "ctaHref": "/visit"
                        }
                    }),
                    json!({
                        "id": "service-times",
                        "type": "service_times",
                        "settings": {
                            "items": [
                                { "label": "Sunday Worship", "time": "9:00 AM" },
                                { "label": "Sunday Worship", "time": "11:00 AM" }
                            ]
                        }
                    }),
                    json!({
                        "id": "upcoming-events",
                        "type": "dynamic_list",
                        "settings": {
                            "source": "events",
                            "limit": 3,
                            "fallback": {
                                "heading": "Events are coming soon",
                                "body": "Check back for gatherings this season."
                            }
                        }
                    }),
                    json!({
                        "id": "footer",
                        "type": "footer",
                        "settings": { "note": "All are welcome." }
                    }),
                ],
                seo: json!({ "title": "Home", "description": "Welcome to our church." }),
            },
            TemplatePage {
                slug: "visit",
                title: "Plan a Visit",
                blocks: vec![
                    json!({
                        "id": "visit-faq",
                        "type": "faq",
                        "settings": {
                            "items": [
                                { "question": "What should I wear?", "answer": "Come as you are." },
                                { "question": "Is there parking?", "answer": "Yes, behind the building." }
                            ]
                        }
                    }),
                    json!({
                        "id": "visit-map",
                        "type": "map_contact",
                        "settings": { "address": "", "phone": "", "email": "" }
                    }),
                ],
                seo: json!({ "title": "Plan a Visit" }),
            },
            TemplatePage {
                slug: "about",
                title: "About",
                blocks: vec![json!({
                    "id": "team",
                    "type": "dynamic_list",
                    "settings": {
                        "source": "staff",
                        "fallback": { "heading": "Meet our team", "body": "Staff profiles are on the way." }
                    }
                })],
                seo: json!({ "title": "About us" }),
            },
        ],
    }
}

fn harbor_modern() -> TemplateDefinition {
    TemplateDefinition {
        key: "harbor-modern",
        name: "Harbor Modern",
        family: "harbor",
        description: "Dark, image-forward layout for growing multi-site churches.",
        preview_image_url: "https://assets.vestry.site/templates/harbor-modern.png",
        status: TemplateStatus::Active,
        theme_config: json!({
            "colors": {
                "primary": "#0ea5e9",
                "secondary": "#22d3ee",
                "background": "#0b1120",
                "text": "#e2e8f0"
            },
            "typography": { "heading": "Poppins", "body": "Inter" },
            "layout": { "maxWidth": 1280, "radius": 4 },
            "seo": { "siteName": "Our Church", "robotsIndex": true, "robotsFollow": true }
        }),
        pages: vec![
            TemplatePage {
                slug: "home",
                title: "Home",
                blocks: vec![
                    json!({
                        "id": "hero",
                        "type": "hero",
                        "settings": {
                            "heading": "Find your harbor",
                            "subheading": "One church, many neighborhoods",
                            "ctaLabel": "Watch online",
                            "ctaHref": "/watch"
                        }
                    }),
                    json!({
                        "id": "stats",
                        "type": "stats",
                        "settings": {
                            "items": [
                                { "label": "Campuses", "value": "3" },
                                { "label": "Small groups", "value": "40+" }
                            ]
                        }
                    }),
                    json!({
                        "id": "news",
                        "type": "dynamic_list",
                        "settings": {
                            "source": "announcements",
                            "fallback": { "heading": "Stay tuned", "body": "News will appear here." }
                        }
                    }),
                    json!({
                        "id": "cta",
                        "type": "cta_band",
                        "settings": { "heading": "Get connected", "ctaLabel": "Join a group", "ctaHref": "/groups" }
                    }),
                ],
                seo: json!({ "title": "Home" }),
            },
            TemplatePage {
                slug: "watch",
                title: "Watch",
                blocks: vec![json!({
                    "id": "sermons",
                    "type": "dynamic_list",
                    "settings": {
                        "source": "sermons",
                        "fallback": { "heading": "Sermons", "body": "Recordings will be posted after each service." }
                    }
                })],
                seo: json!({ "title": "Watch online" }),
            },
        ],
    }
}

fn heritage_classic() -> TemplateDefinition {
    TemplateDefinition {
        key: "heritage-classic",
        name: "Heritage Classic",
        family: "heritage",
        description: "Traditional serif layout for liturgical and historic parishes.",
        preview_image_url: "https://assets.vestry.site/templates/heritage-classic.png",
        status: TemplateStatus::Beta,
        theme_config: json!({
            "colors": {
                "primary": "#7c2d12",
                "secondary": "#a16207",
                "background": "#fffbeb",
                "text": "#292524"
            },
            "typography": { "heading": "Cormorant Garamond", "body": "Lora" },
            "layout": { "maxWidth": 1040, "radius": 0 },
            "seo": { "siteName": "Our Parish", "robotsIndex": true, "robotsFollow": true }
        }),
        pages: vec![
            TemplatePage {
                slug: "home",
                title: "Home",
                blocks: vec![
                    json!({
                        "id": "hero",
                        "type": "hero",
                        "settings": {
                            "heading": "Rooted in tradition",
                            "subheading": "Daily prayer and Sunday Eucharist",
                            "ctaLabel": "Service times",
                            "ctaHref": "/worship"
                        }
                    }),
                    json!({
                        "id": "testimonials",
                        "type": "testimonials",
                        "settings": { "items": [] }
                    }),
                    json!({
                        "id": "footer",
                        "type": "footer",
                        "settings": { "note": "Founded 1887." }
                    }),
                ],
                seo: json!({ "title": "Home" }),
            },
            TemplatePage {
                slug: "worship",
                title: "Worship",
                blocks: vec![json!({
                    "id": "times",
                    "type": "service_times",
                    "settings": {
                        "items": [
                            { "label": "Morning Prayer", "time": "8:00 AM" },
                            { "label": "Holy Eucharist", "time": "10:30 AM" }
                        ]
                    }
                })],
                seo: json!({ "title": "Worship" }),
            },
            TemplatePage {
                slug: "giving",
                title: "Giving",
                blocks: vec![json!({
                    "id": "funds",
                    "type": "dynamic_list",
                    "settings": {
                        "source": "giving",
                        "fallback": { "heading": "Support our parish", "body": "Online giving opens soon." }
                    }
                })],
                seo: json!({ "title": "Giving" }),
            },
        ],
    }
}
