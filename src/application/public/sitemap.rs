//! sitemap.xml and robots.txt for resolved public hosts.

use std::sync::Arc;

use crate::application::repos::{PagesRepo, RevisionsRepo};
use crate::application::website::{WebsiteError, WebsiteStores};
use crate::domain::seo::GlobalSeo;
use crate::domain::types::RevisionStatus;

use super::{SiteResolver, page_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub path: String,
    pub priority: &'static str,
}

#[derive(Clone)]
pub struct SitemapService {
    resolver: SiteResolver,
    pages: Arc<dyn PagesRepo>,
    revisions: Arc<dyn RevisionsRepo>,
}

impl SitemapService {
    pub fn new(stores: &WebsiteStores, resolver: SiteResolver) -> Self {
        Self {
            resolver,
            pages: stores.pages.clone(),
            revisions: stores.revisions.clone(),
        }
    }

    pub async fn sitemap_xml(&self, host: &str) -> Result<String, WebsiteError> {
        let resolved = self.resolver.resolve_host(host).await?;
        let seo = GlobalSeo::from_theme(&resolved.website.theme_config);
        let base = seo.base_url(&resolved.hostname);

        let mut entries = Vec::new();
        for page in self.pages.list_pages(resolved.website.id).await? {
            let published = self
                .revisions
                .list_page_revisions(page.id)
                .await?
                .iter()
                .any(|revision| revision.status == RevisionStatus::Published);
            if !published {
                continue;
            }
            let path = page_path(&page.slug);
            let priority = if path == "/" { "1.0" } else { "0.8" };
            entries.push(SitemapEntry { path, priority });
        }
        entries.sort_by(|a, b| (a.path != "/", &a.path).cmp(&(b.path != "/", &b.path)));

        Ok(render_sitemap(&base, &entries))
    }

    pub async fn robots_txt(&self, host: &str) -> Result<String, WebsiteError> {
        let resolved = self.resolver.resolve_host(host).await?;
        let seo = GlobalSeo::from_theme(&resolved.website.theme_config);
        Ok(render_robots(&seo, &seo.base_url(&resolved.hostname)))
    }
}

pub fn render_sitemap(base: &str, entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        let loc = xml_escape(&canonical_url(base, &entry.path));
        xml.push_str(&format!(
            "  <url><loc>{loc}</loc><changefreq>weekly</changefreq><priority>{}</priority></url>\n",
            entry.priority
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn render_robots(seo: &GlobalSeo, base: &str) -> String {
    let mut body = String::from("User-agent: *\n");
    if seo.robots_index {
        body.push_str("Allow: /\n");
    } else {
        body.push_str("Disallow: /\n");
    }
    if !seo.robots_follow {
        body.push_str("# nofollow: links on this site should not be followed\n");
    }
    body.push_str(&format!("Sitemap: {}\n", canonical_url(base, "/sitemap.xml")));
    body
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn canonical_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path == "/" {
        format!("{base}/")
    } else {
        format!("{base}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitemap_lists_home_first_with_priorities() {
        let entries = vec![
            SitemapEntry {
                path: "/".into(),
                priority: "1.0",
            },
            SitemapEntry {
                path: "/visit".into(),
                priority: "0.8",
            },
        ];
        let xml = render_sitemap("https://grace.org/", &entries);
        insta::assert_snapshot!(xml, @r###"
        <?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://grace.org/</loc><changefreq>weekly</changefreq><priority>1.0</priority></url>
          <url><loc>https://grace.org/visit</loc><changefreq>weekly</changefreq><priority>0.8</priority></url>
        </urlset>
        "###);
    }

    #[test]
    fn robots_reflects_flags() {
        let seo = GlobalSeo::default();
        assert_eq!(
            render_robots(&seo, "https://grace.org"),
            "User-agent: *\nAllow: /\nSitemap: https://grace.org/sitemap.xml\n"
        );

        let closed = GlobalSeo {
            robots_index: false,
            robots_follow: false,
            ..GlobalSeo::default()
        };
        let body = render_robots(&closed, "https://grace.org");
        assert!(body.contains("Disallow: /\n"));
        assert!(body.contains("# nofollow"));
    }
}
