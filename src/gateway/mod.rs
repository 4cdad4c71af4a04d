/*!
 * Admin Data Gateway
 * Privileged connection to the document store and identity provider,
 * opened once at startup and shared through the application state
 */
pub mod identity;
pub mod service_account;

use std::{fmt, sync::Arc, sync::Mutex, time::Duration};
use tokio::sync::OnceCell;

use crate::store::{
    postgres::DbConfig, DocumentStore, FirestoreStore, PgDocumentStore, StoreError,
};
use identity::{AuthError, FirebaseIdentity, IdentityClaims, IdentityVerifier};
use service_account::ServiceAccount;

pub const PROJECT_ID_VAR: &str = "FIREBASE_PROJECT_ID";
pub const CLIENT_EMAIL_VAR: &str = "FIREBASE_CLIENT_EMAIL";
pub const PRIVATE_KEY_VAR: &str = "FIREBASE_PRIVATE_KEY";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("DATABASE_URL must be set when STORE_BACKEND=postgres")]
    MissingDatabaseUrl,

    #[error("failed to open document store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("admin data gateway is not configured ({0})")]
    NotConfigured(String),
}

/// Service account credentials for the hosted project.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Which backend holds the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Postgres,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firestore" => Some(StoreBackend::Firestore),
            "postgres" | "postgresql" => Some(StoreBackend::Postgres),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub credentials: Option<GatewayCredentials>,
    /// Names of the credential variables that were absent or empty.
    pub missing: Vec<&'static str>,
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub upstream_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let project_id = read(PROJECT_ID_VAR);
        let client_email = read(CLIENT_EMAIL_VAR);
        let private_key = read(PRIVATE_KEY_VAR).map(|k| unescape_private_key(&k));

        let backend = match read("STORE_BACKEND") {
            Some(value) => StoreBackend::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown STORE_BACKEND, using firestore");
                StoreBackend::Firestore
            }),
            None => StoreBackend::Firestore,
        };

        let upstream_timeout = Duration::from_secs(
            read("UPSTREAM_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
        );

        Self::from_parts(
            project_id,
            client_email,
            private_key,
            backend,
            read("DATABASE_URL"),
            upstream_timeout,
        )
    }

    pub fn from_parts(
        project_id: Option<String>,
        client_email: Option<String>,
        private_key: Option<String>,
        backend: StoreBackend,
        database_url: Option<String>,
        upstream_timeout: Duration,
    ) -> Self {
        let mut missing = Vec::new();
        if project_id.is_none() {
            missing.push(PROJECT_ID_VAR);
        }
        if client_email.is_none() {
            missing.push(CLIENT_EMAIL_VAR);
        }
        if private_key.is_none() {
            missing.push(PRIVATE_KEY_VAR);
        }

        let credentials = match (project_id, client_email, private_key) {
            (Some(project_id), Some(client_email), Some(private_key)) => Some(GatewayCredentials {
                project_id,
                client_email,
                private_key,
            }),
            _ => None,
        };

        Self {
            credentials,
            missing,
            backend,
            database_url,
            upstream_timeout,
        }
    }
}

/// Private keys are usually stored in env files with literal `\n` escapes.
pub fn unescape_private_key(raw: &str) -> String {
    raw.trim_matches('"').replace("\\n", "\n")
}

/// Live handles produced by a successful connect.
pub struct Connection {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub service_account: Option<Arc<ServiceAccount>>,
}

impl Connection {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            store,
            identity,
            service_account: None,
        }
    }

    async fn open(config: GatewayConfig) -> Result<Self, GatewayError> {
        let credentials = config.credentials.ok_or_else(|| {
            GatewayError::MissingCredentials(config.missing.join(", "))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;

        let service_account = Arc::new(ServiceAccount::new(&credentials, http.clone())?);

        let store: Arc<dyn DocumentStore> = match config.backend {
            StoreBackend::Firestore => Arc::new(FirestoreStore::new(
                &credentials.project_id,
                service_account.clone(),
                http.clone(),
            )),
            StoreBackend::Postgres => {
                let url = config.database_url.ok_or(GatewayError::MissingDatabaseUrl)?;
                Arc::new(PgDocumentStore::connect(&DbConfig::from_env(url)).await?)
            }
        };

        let identity = Arc::new(FirebaseIdentity::new(&credentials.project_id, http));

        Ok(Self {
            store,
            identity,
            service_account: Some(service_account),
        })
    }
}

/// Process-wide gateway. Construct once, connect once, pass by handle.
#[derive(Default)]
pub struct AdminGateway {
    connection: OnceCell<Connection>,
    unavailable: Mutex<Option<String>>,
}

impl AdminGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that is already connected to the given handles.
    pub fn with_connection(connection: Connection) -> Self {
        Self {
            connection: OnceCell::new_with(Some(connection)),
            unavailable: Mutex::new(None),
        }
    }

    /// Connect using credentials from the environment.
    pub async fn connect(&self) -> bool {
        self.connect_with(GatewayConfig::from_env()).await
    }

    /// Open the connection. Missing or invalid credentials leave the gateway
    /// uninitialized with a logged warning; calling again once connected does
    /// nothing.
    pub async fn connect_with(&self, config: GatewayConfig) -> bool {
        if self.connection.initialized() {
            tracing::debug!("Admin data gateway already connected");
            return true;
        }

        let backend = config.backend;
        match self
            .connection
            .get_or_try_init(|| Connection::open(config))
            .await
        {
            Ok(_) => {
                self.set_unavailable(None);
                tracing::info!(backend = ?backend, "Admin data gateway connected");
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Admin data gateway not initialized: {}. Admin routes will report a configuration error.",
                    e
                );
                self.set_unavailable(Some(e.to_string()));
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    pub fn connection(&self) -> Result<&Connection, GatewayError> {
        self.connection.get().ok_or_else(|| {
            let reason = self
                .unavailable
                .lock()
                .ok()
                .and_then(|r| r.clone())
                .unwrap_or_else(|| "connect() has not been called".to_string());
            GatewayError::NotConfigured(reason)
        })
    }

    pub fn store(&self) -> Result<Arc<dyn DocumentStore>, GatewayError> {
        Ok(self.connection()?.store.clone())
    }

    pub fn identity(&self) -> Result<Arc<dyn IdentityVerifier>, GatewayError> {
        Ok(self.connection()?.identity.clone())
    }

    pub fn service_account(&self) -> Option<Arc<ServiceAccount>> {
        self.connection
            .get()
            .and_then(|c| c.service_account.clone())
    }

    /// Verify an identity token with the provider.
    pub async fn verify_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let identity = self.identity().map_err(AuthError::Unavailable)?;
        identity.verify_token(token).await
    }

    fn set_unavailable(&self, reason: Option<String>) {
        if let Ok(mut slot) = self.unavailable.lock() {
            *slot = reason;
        }
    }
}
