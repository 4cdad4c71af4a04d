/*!
 * Document Store
 * Collection/document storage behind a single trait, with hosted and
 * self-hosted backends
 */
pub mod firestore;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// A stored document body: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Errors raised by a document store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("authentication with the store failed: {0}")]
    Auth(String),

    #[error("invalid document: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Sort direction for collection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Collection query: equality filters, one sort key and an optional limit.
///
/// Like the hosted store, documents that do not carry the `order_by` field
/// are left out of ordered results.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A document together with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    /// Decode into a typed model. The document id is injected as `id`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, StoreError> {
        let mut data = self.data;
        data.insert("id".to_string(), Value::String(self.id));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Storage operations every backend provides.
///
/// Write semantics:
/// - `set` replaces the whole document, creating it when missing.
/// - `merge` writes the given top-level fields, preserving the others, and
///   creates the document when missing.
/// - `update` overwrites the given top-level fields of an existing document
///   and fails with [`StoreError::NotFound`] otherwise.
/// - `delete` is idempotent.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create a document under a generated id and return that id.
    async fn add(&self, collection: &str, data: Document) -> Result<String, StoreError>;

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    async fn merge(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    async fn update(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query)
        -> Result<Vec<StoredDocument>, StoreError>;

    /// Atomically add `by` to an integer field of an existing document.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Serialize a model into a document body.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Invalid(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Fetch a single document and decode it, injecting its id.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(data) => StoredDocument {
            id: id.to_string(),
            data,
        }
        .decode()
        .map(Some),
        None => Ok(None),
    }
}

/// Run a query and decode every result, skipping documents that do not fit
/// the model.
pub async fn query_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    let docs = store.query(collection, query).await?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc.id.clone();
        match doc.decode::<T>() {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!(collection = %collection, id = %id, error = %e, "skipping malformed document");
            }
        }
    }
    Ok(items)
}

/// Ordering used when sorting field values in process: numbers numerically,
/// strings lexically, then by type rank (null < bool < number < string <
/// array < object).
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Named {
        id: String,
        name: String,
    }

    #[test]
    fn test_decode_injects_id() {
        let doc = StoredDocument {
            id: "abc".to_string(),
            data: json!({ "name": "x" }).as_object().cloned().unwrap(),
        };
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "abc");
        assert_eq!(named.name, "x");
    }

    #[test]
    fn test_to_document_rejects_non_objects() {
        assert!(to_document(&vec![1, 2]).is_err());
        assert!(to_document(&json!({ "a": 1 })).is_ok());
    }

    #[test]
    fn test_compare_values_orders_numbers_and_strings() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(
            compare_values(&json!("2024-01-02"), &json!("2024-01-01")),
            Ordering::Greater
        );
        assert_eq!(compare_values(&json!(null), &json!("a")), Ordering::Less);
    }
}
