//! Content Models - documents stored in the document store, serialized the
//! way the admin UI reads and writes them (camelCase).

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::timestamp;

pub const POSTS: &str = "posts";
pub const SERVICE_CATEGORIES: &str = "serviceCategories";
pub const SERVICES: &str = "services";
pub const HERO_SLIDES: &str = "heroSlides";
pub const SITE_CONFIG: &str = "siteConfig";

/// Id of the singleton configuration document.
pub const SITE_CONFIG_ID: &str = "main";

pub const DEFAULT_CTA_LABEL: &str = "Get Started Today";
pub const DEFAULT_CTA_HREF: &str = "#contact";
pub const DEFAULT_SERVICE_CATEGORY: &str = "General";

/// Publication state of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default, with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub read_time: String,
}

/// Grouping shown in the services section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategory {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// A single offered service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_service_category")]
    pub category: String,
    #[serde(default, with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_service_category() -> String {
    DEFAULT_SERVICE_CATEGORY.to_string()
}

/// Slide in the hero carousel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroSlide {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default = "default_cta_label")]
    pub cta_label: String,
    #[serde(default = "default_cta_href")]
    pub cta_href: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_cta_label() -> String {
    DEFAULT_CTA_LABEL.to_string()
}

fn default_cta_href() -> String {
    DEFAULT_CTA_HREF.to_string()
}

/// Gallery entry held in the site configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
}

/// Site-wide settings, stored as one document.
///
/// Fields the backend does not know about are kept in `extra` so they
/// survive a read-modify-write by this service. Decoding never fails on a
/// known field: malformed slides and gallery items are dropped and odd
/// scalar types read as unset, so `maintenanceMode` is always honored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub maintenance_mode: bool,
    #[serde(default, deserialize_with = "lenient_list")]
    pub hero_slides: Vec<HeroSlide>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub gallery: Vec<GalleryItem>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub contact_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub site_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `true`, or the string "true" in any case. Anything else is off.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed site configuration entry");
                None
            }
        })
        .collect())
}

/// Catalog product. Declared for the admin UI; no routes manage it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default, with = "timestamp")]
    pub created_at: DateTime<Utc>,
}
