/**
 * RSS Feed
 * Latest published posts as an RSS 2.0 document
 */
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::config::ServerConfig;
use crate::content::models::{Post, PostStatus, POSTS};
use crate::error::ApiError;
use crate::store::{query_typed, Direction, Query};
use crate::AppState;

const FEED_LIMIT: usize = 50;
const FEED_CACHE_CONTROL: &str = "public, max-age=3600, stale-while-revalidate=600";

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn render_feed(config: &ServerConfig, site_name: &str, posts: &[Post]) -> String {
    let base_url = config.site_url.trim_end_matches('/');

    let mut items = String::new();
    for post in posts {
        let post_url = format!("{}/blog/{}", base_url, post.id);
        items.push_str(&format!(
            "    <item>\n\
                   <title>{}</title>\n\
                   <link>{}</link>\n\
                   <description>{}</description>\n\
                   <category>{}</category>\n\
                   <pubDate>{}</pubDate>\n\
                   <guid isPermaLink=\"true\">{}</guid>\n\
                 </item>\n",
            escape_xml(&post.title),
            escape_xml(&post_url),
            escape_xml(&post.excerpt),
            escape_xml(&post.category),
            rfc822(&post.created_at),
            escape_xml(&post_url),
        ));
    }

    let feed_url = format!("{}/rss.xml", base_url);
    let blog_url = format!("{}/blog", base_url);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(site_name),
        escape_xml(&blog_url),
        escape_xml(&config.site_description),
        escape_xml(&feed_url),
        posts
            .first()
            .map(|post| rfc822(&post.created_at))
            .unwrap_or_default(),
        items,
    )
}

/// GET /rss.xml - The latest published posts
pub async fn rss_feed(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store()?;
    let query = Query::new()
        .filter("status", PostStatus::Published.as_str())
        .order_by("createdAt", Direction::Descending)
        .limit(FEED_LIMIT);
    let posts = query_typed::<Post>(store.as_ref(), POSTS, &query)
        .await
        .map_err(ApiError::store("Failed to build feed"))?;

    let site = state.site_meta().resolve(&*state.site_config.current().await);
    let xml = render_feed(&state.config, &site.name, &posts);

    Ok((
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (header::CACHE_CONTROL, FEED_CACHE_CONTROL),
        ],
        xml,
    )
        .into_response())
}
