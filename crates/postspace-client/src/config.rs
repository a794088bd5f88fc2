//! Client configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the postspace API.
    /// Env: `POSTSPACE_API_URL`
    pub api_url: String,

    /// Base URL of the identity provider.
    /// Env: `POSTSPACE_AUTH_URL`
    pub auth_url: String,

    /// Public API key of the identity provider.
    /// Env: `POSTSPACE_AUTH_API_KEY`
    pub auth_api_key: Option<String>,

    /// Media host account used for profile pictures and post images.
    /// Env: `POSTSPACE_MEDIA_CLOUD_NAME`
    pub media_cloud_name: Option<String>,

    /// Unsigned upload preset on the media host.
    /// Env: `POSTSPACE_MEDIA_UPLOAD_PRESET`
    pub media_upload_preset: String,

    /// Upper bound for every HTTP request made by the client.
    /// Env: `POSTSPACE_REQUEST_TIMEOUT_SECS`
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            auth_url: "http://localhost:9999".to_string(),
            auth_api_key: None,
            media_cloud_name: None,
            media_upload_preset: "ml_default".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("POSTSPACE_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty("POSTSPACE_AUTH_URL") {
            config.auth_url = url.trim_end_matches('/').to_string();
        }
        config.auth_api_key = non_empty("POSTSPACE_AUTH_API_KEY");
        config.media_cloud_name = non_empty("POSTSPACE_MEDIA_CLOUD_NAME");
        if let Some(preset) = non_empty("POSTSPACE_MEDIA_UPLOAD_PRESET") {
            config.media_upload_preset = preset;
        }

        if let Some(raw) = non_empty("POSTSPACE_REQUEST_TIMEOUT_SECS") {
            match u64::from_str(raw.trim()) {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(
                    value = %raw,
                    "Invalid POSTSPACE_REQUEST_TIMEOUT_SECS, using default"
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.media_upload_preset, "ml_default");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.media_cloud_name.is_none());
    }

    #[test]
    fn test_overrides_and_bad_timeout() {
        let config = ClientConfig::from_lookup(|key| match key {
            "POSTSPACE_API_URL" => Some("https://forum.example/".into()),
            "POSTSPACE_MEDIA_CLOUD_NAME" => Some("demo".into()),
            "POSTSPACE_REQUEST_TIMEOUT_SECS" => Some("soon".into()),
            _ => None,
        });
        assert_eq!(config.api_url, "https://forum.example");
        assert_eq!(config.media_cloud_name.as_deref(), Some("demo"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }
}
