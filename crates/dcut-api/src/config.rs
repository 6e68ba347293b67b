//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Public base URL used to build provider callback URLs
    pub app_base_url: String,
    /// Requested durations above this trigger an auto-extend
    pub extend_threshold_secs: f64,
    /// TTL for signed asset URLs
    pub signed_url_ttl: Duration,
    /// Timeout for downloading provider-hosted assets
    pub archive_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 2 * 1024 * 1024, // 2MB, callbacks are small JSON
            environment: "development".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            extend_threshold_secs: 6.0,
            signed_url_ttl: Duration::from_secs(60 * 60 * 24),
            archive_timeout: Duration::from_secs(120),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            app_base_url: std::env::var("APP_BASE_URL").unwrap_or(defaults.app_base_url),
            extend_threshold_secs: std::env::var("EXTEND_THRESHOLD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.extend_threshold_secs),
            signed_url_ttl: Duration::from_secs(
                std::env::var("SIGNED_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60 * 60 * 24),
            ),
            archive_timeout: Duration::from_secs(
                std::env::var("ARCHIVE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// The callback URL the provider should notify when a job finishes.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/api/kie/veo/callback",
            self.app_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url_trims_trailing_slash() {
        let config = ApiConfig {
            app_base_url: "https://app.dreamcut.ai/".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(
            config.callback_url(),
            "https://app.dreamcut.ai/api/kie/veo/callback"
        );
    }
}
