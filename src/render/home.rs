//! Home page: hero carousel, services, gallery and contact sections.

use super::{escape_html, layout, safe_url, SiteMeta};
use crate::content::models::{GalleryItem, HeroSlide, Service, ServiceCategory, SiteConfig};

/// Everything the home page shows, already loaded.
#[derive(Debug, Clone, Default)]
pub struct HomeContent {
    pub slides: Vec<HeroSlide>,
    pub categories: Vec<ServiceCategory>,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideView {
    pub image_url: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub cta_label: String,
    pub cta_href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceGroupView {
    pub title: String,
    pub subtitle: String,
    pub image_url: Option<String>,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceView {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

/// Slides from the collection, or the ones saved in the site configuration
/// when the collection is empty. Ordered by `order`.
pub fn hero_slides(config: &SiteConfig, slides: &[HeroSlide]) -> Vec<SlideView> {
    let mut source: Vec<&HeroSlide> = if slides.is_empty() {
        config.hero_slides.iter().collect()
    } else {
        slides.iter().collect()
    };
    source.sort_by_key(|s| s.order);

    source
        .into_iter()
        .map(|s| SlideView {
            image_url: safe_url(&s.image_url),
            title: s.title.clone(),
            subtitle: s.subtitle.clone(),
            cta_label: s.cta_label.clone(),
            cta_href: s.cta_href.clone(),
        })
        .collect()
}

/// Services grouped under their category. Services whose category has no
/// document form a trailing group of their own.
pub fn service_groups(categories: &[ServiceCategory], services: &[Service]) -> Vec<ServiceGroupView> {
    let view = |s: &Service| ServiceView {
        title: s.title.clone(),
        description: s.description.clone(),
        image_url: safe_url(&s.image_url),
    };

    let mut groups: Vec<ServiceGroupView> = categories
        .iter()
        .map(|c| ServiceGroupView {
            title: c.title.clone(),
            subtitle: c.subtitle.clone(),
            image_url: safe_url(&c.image_url),
            services: services
                .iter()
                .filter(|s| s.category.eq_ignore_ascii_case(&c.title))
                .map(view)
                .collect(),
        })
        .collect();

    for service in services {
        if categories
            .iter()
            .any(|c| c.title.eq_ignore_ascii_case(&service.category))
        {
            continue;
        }
        match groups
            .iter_mut()
            .find(|g| g.title.eq_ignore_ascii_case(&service.category))
        {
            Some(group) => group.services.push(view(service)),
            None => groups.push(ServiceGroupView {
                title: service.category.clone(),
                subtitle: String::new(),
                image_url: None,
                services: vec![view(service)],
            }),
        }
    }

    groups
}

fn hero_section(slides: &[SlideView]) -> String {
    if slides.is_empty() {
        return String::new();
    }
    let items: String = slides
        .iter()
        .map(|s| {
            let image = s
                .image_url
                .as_ref()
                .map(|src| format!(r#"<img src="{}" alt="{}">"#, src, escape_html(&s.title)))
                .unwrap_or_default();
            let href = safe_url(&s.cta_href).unwrap_or_else(|| "#contact".to_string());
            format!(
                r#"  <div class="slide">{}<h1>{}</h1><p>{}</p><a class="cta" href="{}">{}</a></div>
"#,
                image,
                escape_html(&s.title),
                escape_html(&s.subtitle),
                href,
                escape_html(&s.cta_label)
            )
        })
        .collect();
    format!("<section class=\"hero\">\n{}</section>\n", items)
}

fn services_section(groups: &[ServiceGroupView]) -> String {
    if groups.is_empty() {
        return String::new();
    }
    let mut html = String::from("<section id=\"services\">\n<h2>Services</h2>\n");
    for group in groups {
        html.push_str(&format!(
            "<div class=\"category\"><h3>{}</h3><p>{}</p>\n<ul>\n",
            escape_html(&group.title),
            escape_html(&group.subtitle)
        ));
        for service in &group.services {
            html.push_str(&format!(
                "  <li><strong>{}</strong> {}</li>\n",
                escape_html(&service.title),
                escape_html(&service.description)
            ));
        }
        html.push_str("</ul></div>\n");
    }
    html.push_str("</section>\n");
    html
}

fn gallery_section(items: &[GalleryItem]) -> String {
    let figures: String = items
        .iter()
        .filter_map(|item| {
            let src = safe_url(&item.image_url)?;
            Some(format!(
                "  <figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>\n",
                src,
                escape_html(&item.caption),
                escape_html(&item.caption)
            ))
        })
        .collect();
    if figures.is_empty() {
        return String::new();
    }
    format!("<section id=\"gallery\">\n<h2>Gallery</h2>\n{}</section>\n", figures)
}

fn contact_section(config: &SiteConfig) -> String {
    let email = config
        .contact_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    match email {
        Some(email) => format!(
            "<section id=\"contact\">\n<h2>Contact</h2>\n<p><a href=\"mailto:{}\">{}</a></p>\n</section>\n",
            escape_html(email),
            escape_html(email)
        ),
        None => "<section id=\"contact\">\n<h2>Contact</h2>\n</section>\n".to_string(),
    }
}

pub fn home_page(site: &SiteMeta, config: &SiteConfig, content: &HomeContent) -> String {
    let body = [
        hero_section(&hero_slides(config, &content.slides)),
        services_section(&service_groups(&content.categories, &content.services)),
        gallery_section(&config.gallery),
        contact_section(config),
    ]
    .concat();

    layout(site, &site.name, &format!("<main>\n{}</main>", body))
}
