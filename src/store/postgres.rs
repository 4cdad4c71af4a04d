//! Postgres-backed document store.
//!
//! Every collection lives in a single `documents` table with a JSONB body,
//! which gives the same collection/document model as the hosted store.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::{Direction, Document, DocumentStore, Query, StoreError, StoredDocument};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl DbConfig {
    /// Pool settings from `DB_POOL_MAX`, `DB_POOL_MIN`, `DB_CONNECT_TIMEOUT`
    /// and `DB_IDLE_TIMEOUT`, for the given connection URL.
    pub fn from_env(url: String) -> Self {
        Self {
            url,
            max_connections: env_or("DB_POOL_MAX", 10),
            min_connections: env_or("DB_POOL_MIN", 1),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 300),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Open the pool, check the connection and apply migrations.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        tracing::info!("Initializing database connection pool...");
        tracing::debug!(
            "Database URL: {}",
            config.url.replace(
                |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
                "*"
            )
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;
        run_migrations(&pool).await?;

        tracing::info!("Database connection pool initialized successfully");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (collection, id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_data
            ON documents USING GIN (data)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(data,)| match data {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Value::Object(data))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                data = documents.data || EXCLUDED.data,
                updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3, updated_at = now()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let (sql, binds) = build_select(query);

        let mut statement = sqlx::query_as::<_, (String, Value)>(&sql).bind(collection);
        for bind in binds {
            statement = match bind {
                Bind::Text(text) => statement.bind(text),
                Bind::Json(json) => statement.bind(json),
                Bind::Limit(limit) => statement.bind(limit),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, data)| match data {
                Value::Object(data) => Some(StoredDocument { id, data }),
                _ => None,
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
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = jsonb_set(
                    data,
                    ARRAY[$3::text],
                    to_jsonb(COALESCE((data ->> $3)::bigint, 0) + $4)
                ),
                updated_at = now()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Bind {
    Text(String),
    Json(Value),
    Limit(i64),
}

/// Build the SELECT for a query. `$1` is always the collection name; field
/// names travel as bind parameters so they never reach the SQL text.
fn build_select(query: &Query) -> (String, Vec<Bind>) {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = $1");
    let mut binds = Vec::new();
    let mut next = 2;

    for (field, value) in &query.filters {
        sql.push_str(&format!(" AND data -> ${} = ${}", next, next + 1));
        binds.push(Bind::Text(field.clone()));
        binds.push(Bind::Json(value.clone()));
        next += 2;
    }

    if let Some(order) = &query.order_by {
        sql.push_str(&format!(" AND jsonb_exists(data, ${})", next));
        binds.push(Bind::Text(order.field.clone()));
        let direction = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        sql.push_str(&format!(" ORDER BY data -> ${} {}, id {}", next, direction, direction));
        next += 1;
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT ${}", next));
        binds.push(Bind::Limit(limit as i64));
    }

    (sql, binds)
}
