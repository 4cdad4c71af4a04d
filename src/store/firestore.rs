//! Hosted document store over the Firestore REST API.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{Direction, Document, DocumentStore, Query, StoreError, StoredDocument};
use crate::gateway::service_account::{ServiceAccount, TokenError};

const API_ROOT: &str = "https://firestore.googleapis.com/v1";

/// Characters left as-is inside a document path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

impl From<TokenError> for StoreError {
    fn from(err: TokenError) -> Self {
        StoreError::Auth(err.to_string())
    }
}

pub struct FirestoreStore {
    http: reqwest::Client,
    auth: Arc<ServiceAccount>,
    /// `projects/{project}/databases/(default)/documents`
    root: String,
}

impl FirestoreStore {
    pub fn new(project_id: &str, auth: Arc<ServiceAccount>, http: reqwest::Client) -> Self {
        Self {
            http,
            auth,
            root: format!("projects/{}/databases/(default)/documents", project_id),
        }
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.root,
            utf8_percent_encode(collection, SEGMENT),
            utf8_percent_encode(id, SEGMENT)
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", API_ROOT, path)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.auth.access_token().await?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    /// Write fields to a document. `mask` restricts the write to the given
    /// top-level fields; `must_exist` adds an existence precondition.
    async fn patch(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        mask: bool,
        must_exist: bool,
    ) -> Result<(), StoreError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if mask {
            for field in data.keys() {
                params.push(("updateMask.fieldPaths", field_path(field)));
            }
        }
        if must_exist {
            params.push(("currentDocument.exists", "true".to_string()));
        }

        let response = self
            .request(Method::PATCH, &self.document_name(collection, id))
            .await?
            .query(&params)
            .json(&json!({ "fields": encode_fields(&data) }))
            .send()
            .await?;

        if must_exist && response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(collection, id));
        }
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .request(Method::GET, &self.document_name(collection, id))
            .await?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = check(response).await?.json().await?;
        Ok(Some(decode_document_fields(&body)))
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String, StoreError> {
        let path = format!("{}/{}", self.root, utf8_percent_encode(collection, SEGMENT));
        let response = self
            .request(Method::POST, &path)
            .await?
            .json(&json!({ "fields": encode_fields(&data) }))
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;
        body.get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Invalid("created document has no name".to_string()))
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.patch(collection, id, data, false, false).await
    }

    async fn merge(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.patch(collection, id, data, true, false).await
    }

    async fn update(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.patch(collection, id, data, true, true).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &self.document_name(collection, id))
            .await?
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let response = self
            .request(Method::POST, &format!("{}:runQuery", self.root))
            .await?
            .json(&json!({ "structuredQuery": structured_query(collection, query) }))
            .send()
            .await?;

        let rows: Vec<Value> = check(response).await?.json().await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(|doc| {
                let id = doc.get("name")?.as_str()?.rsplit('/').next()?.to_string();
                Some(StoredDocument {
                    id,
                    data: decode_document_fields(doc),
                })
            })
            .collect())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError> {
        let write = json!({
            "transform": {
                "document": self.document_name(collection, id),
                "fieldTransforms": [{
                    "fieldPath": field_path(field),
                    "increment": { "integerValue": by.to_string() }
                }]
            },
            "currentDocument": { "exists": true }
        });

        let response = self
            .request(Method::POST, &format!("{}:commit", self.root))
            .await?
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(collection, id));
        }
        check(response).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.get("siteConfig", "main").await.map(|_| ())
    }
}

/// Quote a field path unless it is a plain identifier.
fn field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = Map::new();
    structured.insert("from".into(), json!([{ "collectionId": collection }]));

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|(field, value)| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(field) },
                    "op": "EQUAL",
                    "value": encode_value(value)
                }
            })
        })
        .collect();

    match filters.len() {
        0 => {}
        1 => {
            structured.insert("where".into(), filters.into_iter().next().unwrap_or(Value::Null));
        }
        _ => {
            structured.insert(
                "where".into(),
                json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
            );
        }
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured.insert(
            "orderBy".into(),
            json!([{ "field": { "fieldPath": field_path(&order.field) }, "direction": direction }]),
        );
    }

    if let Some(limit) = query.limit {
        structured.insert("limit".into(), json!(limit));
    }

    Value::Object(structured)
}

// ============================================================================
// Value encoding
// ============================================================================

pub(crate) fn encode_fields(doc: &Document) -> Map<String, Value> {
    doc.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_document_fields(doc: &Value) -> Document {
    doc.get("fields")
        .and_then(Value::as_object)
        .map(decode_fields)
        .unwrap_or_default()
}

pub(crate) fn decode_fields(fields: &Map<String, Value>) -> Document {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

pub(crate) fn decode_value(value: &Value) -> Value {
    let Some(typed) = value.as_object() else {
        return Value::Null;
    };

    if let Some(v) = typed.get("stringValue") {
        return v.clone();
    }
    if let Some(v) = typed.get("integerValue") {
        return match v {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }
    if let Some(v) = typed.get("doubleValue") {
        return match v {
            Value::Number(_) => v.clone(),
            _ => Value::Null,
        };
    }
    if let Some(v) = typed.get("booleanValue") {
        return v.clone();
    }
    if let Some(array) = typed.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(map) = typed.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_default();
        return Value::Object(fields);
    }
    for key in ["timestampValue", "referenceValue", "bytesValue", "geoPointValue"] {
        if let Some(v) = typed.get(key) {
            return v.clone();
        }
    }
    Value::Null
}
