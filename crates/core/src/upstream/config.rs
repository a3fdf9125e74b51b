//! Configuration for the upstream client.

use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://li.quest/";

/// Configuration for [`super::HttpUpstream`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API. A trailing slash is added if missing.
    pub base_url: Url,
    /// API key sent as `x-api-key`. Absent means unauthenticated calls,
    /// which the upstream may reject.
    pub api_key: Option<String>,
    /// Integrator identity attached to every call.
    pub integrator: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Parse `base_url` and build a config with defaults for the rest.
    pub fn parse(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            api_key: None,
            integrator: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_integrator(mut self, integrator: Option<String>) -> Self {
        self.integrator = integrator.filter(|i| !i.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_added() {
        let config = UpstreamConfig::new(Url::parse("http://localhost:8080/api").unwrap());
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/api/");
        assert_eq!(
            config.base_url.join("v1/chains").unwrap().as_str(),
            "http://localhost:8080/api/v1/chains"
        );
    }

    #[test]
    fn test_empty_credentials_are_dropped() {
        let config = UpstreamConfig::parse(DEFAULT_BASE_URL)
            .unwrap()
            .with_api_key(Some(String::new()))
            .with_integrator(Some("routegate".to_string()));
        assert!(config.api_key.is_none());
        assert_eq!(config.integrator.as_deref(), Some("routegate"));
    }
}
