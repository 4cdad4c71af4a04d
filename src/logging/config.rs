use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "logs";

/// Deployment environment, read from `ENVIRONMENT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: Environment,
    pub log_dir: PathBuf,
    /// Level for this crate's targets; `RUST_LOG` overrides the whole filter.
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let environment = Environment::parse(
            &std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        );
        let log_dir = std::env::var("LOG_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| Self::default_level(environment).to_string());

        Self {
            environment,
            log_dir: PathBuf::from(log_dir),
            level,
        }
    }

    fn default_level(environment: Environment) -> &'static str {
        match environment {
            Environment::Production => "info",
            Environment::Development => "debug",
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        format!(
            "site_backend={},tower_http=debug,axum=debug",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn test_filter_directives_use_crate_target() {
        let config = LoggingConfig {
            environment: Environment::Development,
            log_dir: PathBuf::from("logs"),
            level: "warn".to_string(),
        };
        assert!(config.filter_directives().starts_with("site_backend=warn"));
    }
}
