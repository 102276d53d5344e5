//! Application configuration loaded from environment variables.
//!
//! Everything is resolved once at startup; a missing required key is a
//! typed error, never a silent placeholder substituted at the point of use.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Shared secret the billing provider sends in the Authorization header
    pub revenuecat_webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            revenuecat_webhook_secret: env::var("REVENUECAT_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("REVENUECAT_WEBHOOK_SECRET"))?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:8081".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            revenuecat_webhook_secret: "test_webhook_secret".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("REVENUECAT_WEBHOOK_SECRET", "test_secret");
        env::remove_var("PORT");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.revenuecat_webhook_secret, "test_secret");
        assert_eq!(config.port, 8080);

        // A malformed value is a typed error, not a silent fallback.
        env::set_var("PORT", "not-a-port");
        let err = Config::from_env().expect_err("bad PORT must fail loudly");
        assert!(matches!(err, ConfigError::Invalid("PORT")));
        env::remove_var("PORT");
    }
}
