//! Blog index and single post pages.

use super::{escape_html, layout, safe_url, SiteMeta};
use crate::content::{models::Post, sanitize_html};

fn display_date(post: &Post) -> String {
    post.created_at.format("%B %-d, %Y").to_string()
}

pub fn blog_index(site: &SiteMeta, posts: &[Post]) -> String {
    let body = if posts.is_empty() {
        "<p>No posts yet.</p>\n".to_string()
    } else {
        posts
            .iter()
            .map(|post| {
                format!(
                    "<article>\n  <h2><a href=\"/blog/{}\">{}</a></h2>\n  <p class=\"meta\">{} &middot; {} &middot; {}</p>\n  <p>{}</p>\n</article>\n",
                    escape_html(&post.id),
                    escape_html(&post.title),
                    escape_html(&post.category),
                    display_date(post),
                    escape_html(&post.read_time),
                    escape_html(&post.excerpt)
                )
            })
            .collect()
    };

    layout(
        site,
        &format!("Blog | {}", site.name),
        &format!("<main class=\"blog\">\n<h1>Blog</h1>\n{}</main>", body),
    )
}

pub fn post_page(site: &SiteMeta, post: &Post) -> String {
    let image = post
        .image
        .as_deref()
        .and_then(safe_url)
        .map(|src| format!("<img src=\"{}\" alt=\"{}\">\n", src, escape_html(&post.title)))
        .unwrap_or_default();

    let tags: String = post
        .tags
        .iter()
        .map(|t| format!("<li>{}</li>", escape_html(t)))
        .collect();

    let body = format!(
        "<main class=\"post\">\n<article>\n<h1>{}</h1>\n<p class=\"meta\">{} &middot; {} &middot; {}</p>\n{}<div class=\"content\">{}</div>\n<ul class=\"tags\">{}</ul>\n</article>\n</main>",
        escape_html(&post.title),
        escape_html(&post.author),
        display_date(post),
        escape_html(&post.read_time),
        image,
        sanitize_html(&post.content),
        tags
    );

    layout(site, &format!("{} | {}", post.title, site.name), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::models::PostStatus;
    use chrono::TimeZone;

    fn post() -> Post {
        Post {
            id: "p1".into(),
            title: "Hello & welcome".into(),
            excerpt: "Intro".into(),
            content: "<p>Body</p><script>alert(1)</script>".into(),
            category: "News".into(),
            image: Some("data:image/png;base64,AAAA".into()),
            tags: vec!["launch".into()],
            status: PostStatus::Published,
            author: "Team".into(),
            views: 0,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
            updated_at: chrono::Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
            read_time: "1 min read".into(),
        }
    }

    fn site() -> SiteMeta {
        SiteMeta {
            name: "Acme".into(),
            description: String::new(),
        }
    }

    #[test]
    fn test_post_page_sanitizes_body() {
        let html = post_page(&site(), &post());
        assert!(html.contains("<p>Body</p>"));
        assert!(!html.contains("alert(1)"));
        assert!(!html.contains("data:image"));
        assert!(html.contains("Hello &amp; welcome"));
        assert!(html.contains("March 5, 2024"));
    }

    #[test]
    fn test_blog_index_links_posts() {
        let html = blog_index(&site(), &[post()]);
        assert!(html.contains("href=\"/blog/p1\""));
        assert!(html.contains("1 min read"));

        assert!(blog_index(&site(), &[]).contains("No posts yet."));
    }
}
