/*!
 * Public Rendering Components
 * Pure functions turning content into view models and HTML. Nothing here
 * reads or writes the store
 */
pub mod blog;
pub mod home;

pub use blog::{blog_index, post_page};
pub use home::{home_page, HomeContent};

use crate::content::models::SiteConfig;

/// Site identity used by every page
#[derive(Debug, Clone)]
pub struct SiteMeta {
    pub name: String,
    pub description: String,
}

impl SiteMeta {
    /// The configured site name wins over the process default.
    pub fn resolve(&self, config: &SiteConfig) -> SiteMeta {
        SiteMeta {
            name: config
                .site_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&self.name)
                .to_string(),
            description: self.description.clone(),
        }
    }
}

/// A rendered public page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Maintenance mode is on; only the notice was rendered.
    Maintenance(String),
    Content(String),
}

impl Page {
    pub fn html(&self) -> &str {
        match self {
            Page::Maintenance(html) | Page::Content(html) => html,
        }
    }
}

/// Render a public page unless maintenance mode is on. `build` only runs
/// when the site is live.
pub fn public_page<F>(config: &SiteConfig, site: &SiteMeta, build: F) -> Page
where
    F: FnOnce(&SiteMeta) -> String,
{
    let site = site.resolve(config);
    if config.maintenance_mode {
        Page::Maintenance(maintenance_notice(&site))
    } else {
        Page::Content(build(&site))
    }
}

pub fn maintenance_notice(site: &SiteMeta) -> String {
    layout(
        site,
        &format!("{} | Under maintenance", site.name),
        r#"<main class="maintenance">
  <h1>We'll be right back</h1>
  <p>The site is undergoing scheduled maintenance. Please check back soon.</p>
</main>"#,
    )
}

pub fn not_found_page(site: &SiteMeta) -> String {
    layout(
        site,
        &format!("Not found | {}", site.name),
        r#"<main class="not-found">
  <h1>Page not found</h1>
  <p><a href="/blog">Back to the blog</a></p>
</main>"#,
    )
}

pub fn layout(site: &SiteMeta, title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{}</title>
  <meta name="description" content="{}">
  <link rel="alternate" type="application/rss+xml" title="{}" href="/rss.xml">
</head>
<body>
<header><a href="/">{}</a> <nav><a href="/blog">Blog</a> <a href="/#contact">Contact</a></nav></header>
{}
<footer>&copy; {}</footer>
</body>
</html>"#,
        escape_html(title),
        escape_html(&site.description),
        escape_html(&site.name),
        escape_html(&site.name),
        body,
        escape_html(&site.name),
    )
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Only hosted http(s) or site-relative URLs end up in `src`/`href`.
pub(crate) fn safe_url(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let allowed = lower.starts_with("https://")
        || lower.starts_with("http://")
        || (url.starts_with('/') && !url.starts_with("//"))
        || url.starts_with('#');
    if allowed {
        Some(escape_html(url))
    } else {
        None
    }
}
