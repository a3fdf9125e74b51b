//! HTTP implementation of [`UpstreamApi`].

use super::{Endpoint, UpstreamApi, UpstreamConfig};
use crate::error::{UpstreamError, UpstreamResult};
use reqwest::{header, Client, Method};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upstream client over HTTPS. One failed call is one error: there are no
/// retries at this layer.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    config: Arc<UpstreamConfig>,
}

impl HttpUpstream {
    /// Create a client with the given configuration.
    pub fn new(config: UpstreamConfig) -> UpstreamResult<Self> {
        let mut headers = header::HeaderMap::new();

        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::HeaderName::from_static("x-api-key"),
                header::HeaderValue::from_str(api_key)
                    .map_err(|_| UpstreamError::Config("Invalid API key format".to_string()))?,
            );
        }

        let client = Client::builder()
            .user_agent(concat!("routegate/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn build_url(&self, path: &str) -> UpstreamResult<url::Url> {
        Ok(self.config.base_url.join(path)?)
    }

    /// Flatten a params object into query pairs, adding the integrator.
    fn query_pairs(&self, params: &Value) -> UpstreamResult<Vec<(String, String)>> {
        let mut pairs = Vec::new();

        match params {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    if let Some(encoded) = encode_query_value(key, value)? {
                        pairs.push((key.clone(), encoded));
                    }
                }
            }
            other => {
                return Err(UpstreamError::InvalidParams(format!(
                    "expected an object, got {}",
                    json_type(other)
                )))
            }
        }

        if let Some(ref integrator) = self.config.integrator {
            if !pairs.iter().any(|(k, _)| k == "integrator") {
                pairs.push(("integrator".to_string(), integrator.clone()));
            }
        }

        Ok(pairs)
    }

    /// Attach the integrator to a POST body.
    fn body(&self, params: Value) -> UpstreamResult<Value> {
        let mut map = match params {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(UpstreamError::InvalidParams(format!(
                    "expected an object, got {}",
                    json_type(&other)
                )))
            }
        };

        if let Some(ref integrator) = self.config.integrator {
            map.entry("integrator")
                .or_insert_with(|| Value::String(integrator.clone()));
        }

        Ok(Value::Object(map))
    }
}

#[async_trait::async_trait]
impl UpstreamApi for HttpUpstream {
    async fn call(&self, endpoint: Endpoint, params: Value) -> UpstreamResult<Value> {
        let url = self.build_url(endpoint.path())?;

        let request = if endpoint.method() == Method::POST {
            debug!(endpoint = %endpoint, url = %url, "POST request");
            self.client.post(url).json(&self.body(params)?)
        } else {
            debug!(endpoint = %endpoint, url = %url, "GET request");
            self.client.get(url).query(&self.query_pairs(&params)?)
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %endpoint, status = status.as_u16(), "Upstream call failed");
            return Err(UpstreamError::from_response(status.as_u16(), &body));
        }

        // Parse from text so large integers keep full precision
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn encode_query_value(key: &str, value: &Value) -> UpstreamResult<Option<String>> {
    let encoded = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(UpstreamError::InvalidParams(format!(
                    "{key}: unsupported list item of type {}",
                    json_type(other)
                ))),
            })
            .collect::<UpstreamResult<Vec<_>>>()?
            .join(","),
        Value::Object(_) => {
            return Err(UpstreamError::InvalidParams(format!(
                "{key}: nested objects cannot be sent as query parameters"
            )))
        }
    };
    Ok(Some(encoded))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
