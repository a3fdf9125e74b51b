//! Client side of the remote quoting/routing/balance service.
//!
//! Everything the gateway needs from the upstream goes through
//! [`UpstreamApi::call`], an opaque `endpoint + params -> JSON` function.

mod config;
mod http;

pub use config::{UpstreamConfig, DEFAULT_BASE_URL};
pub use http::HttpUpstream;

use crate::error::UpstreamResult;
use reqwest::Method;

/// Operations exposed by the upstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Chains,
    Tokens,
    Token,
    Connections,
    Tools,
    Quote,
    Routes,
    StepTransaction,
    Status,
    GasPrices,
    TokenBalance,
    NativeBalance,
    Allowance,
}

impl Endpoint {
    /// Path relative to the configured base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Chains => "v1/chains",
            Self::Tokens => "v1/tokens",
            Self::Token => "v1/token",
            Self::Connections => "v1/connections",
            Self::Tools => "v1/tools",
            Self::Quote => "v1/quote",
            Self::Routes => "v1/advanced/routes",
            Self::StepTransaction => "v1/advanced/stepTransaction",
            Self::Status => "v1/status",
            Self::GasPrices => "v1/gas/prices",
            Self::TokenBalance => "v1/balances/token",
            Self::NativeBalance => "v1/balances/native",
            Self::Allowance => "v1/allowance",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Routes | Self::StepTransaction => Method::POST,
            _ => Method::GET,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chains => "chains",
            Self::Tokens => "tokens",
            Self::Token => "token",
            Self::Connections => "connections",
            Self::Tools => "tools",
            Self::Quote => "quote",
            Self::Routes => "routes",
            Self::StepTransaction => "step_transaction",
            Self::Status => "status",
            Self::GasPrices => "gas_prices",
            Self::TokenBalance => "token_balance",
            Self::NativeBalance => "native_balance",
            Self::Allowance => "allowance",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The remote service as seen by the tool layer.
///
/// `params` is a JSON object. For GET endpoints its fields become query
/// parameters, for POST endpoints it is sent as the body.
#[async_trait::async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn call(&self, endpoint: Endpoint, params: serde_json::Value) -> UpstreamResult<serde_json::Value>;
}
