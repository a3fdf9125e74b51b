//! In-memory upstream for tests in this and dependent crates.

use crate::error::{UpstreamError, UpstreamResult};
use crate::upstream::{Endpoint, UpstreamApi};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Canned responses per endpoint, with a log of every call made.
#[derive(Default)]
pub struct MockUpstream {
    responses: Mutex<HashMap<Endpoint, Result<Value, (u16, String)>>>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `endpoint` with `value`
    pub fn respond(&self, endpoint: Endpoint, value: Value) -> &Self {
        self.responses.lock().insert(endpoint, Ok(value));
        self
    }

    /// Fail `endpoint` with an API error
    pub fn fail(&self, endpoint: Endpoint, status: u16, message: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .insert(endpoint, Err((status, message.into())));
        self
    }

    /// Number of calls made to `endpoint`
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.lock().iter().filter(|(e, _)| *e == endpoint).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Params of the most recent call to `endpoint`
    pub fn last_params(&self, endpoint: Endpoint) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(e, _)| *e == endpoint)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait::async_trait]
impl UpstreamApi for MockUpstream {
    async fn call(&self, endpoint: Endpoint, params: Value) -> UpstreamResult<Value> {
        self.calls.lock().push((endpoint, params));

        match self.responses.lock().get(&endpoint) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err((status, message))) => Err(UpstreamError::Api {
                status: *status,
                message: message.clone(),
                code: None,
            }),
            None => Err(UpstreamError::Api {
                status: 404,
                message: format!("no mock response for {endpoint}"),
                code: None,
            }),
        }
    }
}
