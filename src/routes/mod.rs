/**
 * Routes Module
 * API route handlers and public pages
 */

pub mod auth;
pub mod categories;
pub mod health;
pub mod pages;
pub mod posts;
pub mod rss;
pub mod services;
pub mod site_config;
pub mod slides;
pub mod upload;

use serde_json::{Map, Value};

use crate::content::{reject_inline_image, require_text};
use crate::error::ApiError;
use crate::store::Document;

pub use crate::error::{ErrorResponse, SuccessResponse};

/// Fields written by an update, built up one validated value at a time.
#[derive(Debug, Default)]
pub(crate) struct Changes(Document);

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Required text: present and non-blank after trimming.
    pub fn required(&mut self, field: &str, label: &str, value: Option<&str>) -> Result<&mut Self, ApiError> {
        let text = require_text(value, label)?;
        Ok(self.set(field, text))
    }

    /// Optional text, only written when the caller sent it.
    pub fn text(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.set(field, v.trim());
        }
        self
    }

    /// Image URL, only written when sent; inline data is refused.
    pub fn image(&mut self, field: &str, value: Option<&str>) -> Result<&mut Self, ApiError> {
        reject_inline_image(value, field)?;
        Ok(self.text(field, value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// `{ "id": ..., ...fields }` as returned by create and update handlers.
pub(crate) fn with_id(id: &str, fields: Document) -> Value {
    let mut body = Map::new();
    body.insert("id".to_string(), Value::String(id.to_string()));
    body.extend(fields);
    Value::Object(body)
}
