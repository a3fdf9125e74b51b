// Uniform entry point for tool invocations

use super::ToolCall;
use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use routegate_core::{CachePolicy, Endpoint, TtlCache, UpstreamApi, UpstreamError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can go wrong inside a tool. Never leaves the adapter: it is
/// folded into [`ToolEnvelope::Error`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Invalid arguments: {0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Failed to serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolEnvelope {
    Result { result: Value },
    Error { error: String },
}

impl ToolEnvelope {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Render as an MCP tool result; the JSON result becomes pretty-printed text
    pub fn into_call_tool_result(self) -> CallToolResult {
        match self {
            Self::Result { result } => match serde_json::to_string_pretty(&result) {
                Ok(text) => CallToolResult {
                    content: vec![ToolContent::text(text)],
                    is_error: None,
                },
                Err(e) => CallToolResult {
                    content: vec![ToolContent::error(format!("Failed to serialize result: {e}"))],
                    is_error: Some(true),
                },
            },
            Self::Error { error } => CallToolResult {
                content: vec![ToolContent::error(error)],
                is_error: Some(true),
            },
        }
    }
}

/// Wraps the upstream service and the response cache behind `invoke`.
///
/// Failures never propagate: every call yields a [`ToolEnvelope`]. There are
/// no retries; one failed upstream call is one error result.
pub struct ToolAdapter {
    upstream: Arc<dyn UpstreamApi>,
    cache: Arc<TtlCache<Value>>,
    policy: CachePolicy,
}

impl ToolAdapter {
    pub fn new(upstream: Arc<dyn UpstreamApi>, cache: Arc<TtlCache<Value>>, policy: CachePolicy) -> Self {
        Self {
            upstream,
            cache,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<TtlCache<Value>> {
        &self.cache
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        super::tool_schemas()
    }

    /// Load the chain list into the cache, returning how many chains it holds.
    /// Startup treats a failure here as fatal.
    pub async fn prefetch_chains(&self) -> Result<usize, ToolError> {
        let chains = self.chains().await?;
        match chains.get("chains").and_then(Value::as_array) {
            Some(list) => Ok(list.len()),
            None => Err(ToolError::invalid("chain list response has no `chains` array")),
        }
    }

    /// Invoke a tool by name
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolEnvelope {
        let call = match ToolCall::parse(name, arguments) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Rejected tool call");
                return ToolEnvelope::Error { error: e.to_string() };
            }
        };

        match self.dispatch(call).await {
            Ok(result) => ToolEnvelope::Result { result },
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool invocation failed");
                ToolEnvelope::Error { error: e.to_string() }
            }
        }
    }

    /// Run an already-parsed call
    pub async fn dispatch(&self, call: ToolCall) -> Result<Value, ToolError> {
        tracing::debug!(tool = call.name(), live = call.is_live(), "Dispatching tool");

        match call {
            ToolCall::GetChains(args) => self.get_chains(args).await,
            ToolCall::GetChainById(args) => self.get_chain_by_id(args).await,
            ToolCall::GetChainByName(args) => self.get_chain_by_name(args).await,
            ToolCall::GetTokens(args) => self.get_tokens(args).await,
            ToolCall::GetToken(args) => self.get_token(args).await,
            ToolCall::GetConnections(args) => self.get_connections(args).await,
            ToolCall::GetTools(args) => self.get_tools(args).await,
            ToolCall::GetQuote(args) => self.get_quote(args).await,
            ToolCall::GetRoutes(args) => self.get_routes(args).await,
            ToolCall::GetStepTransaction(args) => self.get_step_transaction(args).await,
            ToolCall::GetStatus(args) => self.get_status(args).await,
            ToolCall::GetGasPrices(args) => self.get_gas_prices(args).await,
            ToolCall::GetTokenBalance(args) => self.get_token_balance(args).await,
            ToolCall::GetNativeTokenBalance(args) => self.get_native_token_balance(args).await,
            ToolCall::GetAllowance(args) => self.get_allowance(args).await,
        }
    }

    /// Fetch through the cache
    pub(crate) async fn cached(
        &self,
        key: String,
        ttl: Duration,
        endpoint: Endpoint,
        params: Value,
    ) -> Result<Value, ToolError> {
        let upstream = &self.upstream;
        self.cache
            .get_or_compute(&key, ttl, || async move {
                upstream.call(endpoint, params).await.map_err(ToolError::from)
            })
            .await
    }

    /// Always fetch fresh
    pub(crate) async fn live(&self, endpoint: Endpoint, params: Value) -> Result<Value, ToolError> {
        Ok(self.upstream.call(endpoint, params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routegate_core::testing::MockUpstream;
    use serde_json::json;

    fn chains_fixture() -> Value {
        json!({
            "chains": [
                {"id": 1, "key": "eth", "name": "Ethereum", "chainType": "EVM"},
                {"id": 137, "key": "pol", "name": "Polygon", "chainType": "EVM"},
                {"id": 1151111081099710u64, "key": "sol", "name": "Solana", "chainType": "SVM"}
            ]
        })
    }

    fn adapter_with(upstream: Arc<MockUpstream>) -> ToolAdapter {
        ToolAdapter::new(upstream, Arc::new(TtlCache::new()), CachePolicy::default())
    }

    fn result_of(envelope: ToolEnvelope) -> Value {
        match envelope {
            ToolEnvelope::Result { result } => result,
            ToolEnvelope::Error { error } => panic!("unexpected error envelope: {error}"),
        }
    }

    #[tokio::test]
    async fn test_chains_fetched_once_within_ttl() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Chains, chains_fixture());
        let adapter = adapter_with(upstream.clone());

        let first = result_of(adapter.invoke("get-chains", json!({})).await);
        let second = result_of(adapter.invoke("get-chains", json!({})).await);

        assert_eq!(first, second);
        assert_eq!(upstream.calls(Endpoint::Chains), 1);
        assert_eq!(adapter.cache().keys_with_prefix("chains"), vec!["chains".to_string()]);
    }

    #[tokio::test]
    async fn test_prefetch_warms_cache() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Chains, chains_fixture());
        let adapter = adapter_with(upstream.clone());

        assert_eq!(adapter.prefetch_chains().await.unwrap(), 3);
        result_of(adapter.invoke("get-chain-by-name", json!({"name": "eth"})).await);
        assert_eq!(upstream.calls(Endpoint::Chains), 1);
    }

    #[tokio::test]
    async fn test_prefetch_failure_is_reported() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.fail(Endpoint::Chains, 401, "invalid api key");
        let adapter = adapter_with(upstream);

        let err = adapter.prefetch_chains().await.unwrap_err();
        assert!(matches!(err, ToolError::Upstream(_)));
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_chain_lookups_share_cached_list() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Chains, chains_fixture());
        let adapter = adapter_with(upstream.clone());

        let by_id = result_of(adapter.invoke("get-chain-by-id", json!({"id": 137})).await);
        assert_eq!(by_id["key"], "pol");

        let by_name = result_of(adapter.invoke("get-chain-by-name", json!({"name": "SOL"})).await);
        assert_eq!(by_name["name"], "Solana");

        let svm = result_of(adapter.invoke("get-chains", json!({"chainTypes": "svm"})).await);
        assert_eq!(svm["chains"].as_array().unwrap().len(), 1);

        assert_eq!(upstream.calls(Endpoint::Chains), 1);
    }

    #[tokio::test]
    async fn test_unknown_chain_is_error_envelope() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Chains, chains_fixture());
        let adapter = adapter_with(upstream);

        let envelope = adapter.invoke("get-chain-by-id", json!({"id": 999})).await;
        assert_eq!(
            envelope,
            ToolEnvelope::Error {
                error: "Chain with ID 999 not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_token_cached_per_chain_and_token() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Token, json!({"symbol": "USDC", "decimals": 6}));
        let adapter = adapter_with(upstream.clone());

        adapter.invoke("get-token", json!({"chain": "1", "token": "USDC"})).await;
        adapter.invoke("get-token", json!({"chain": "1", "token": "USDC"})).await;
        adapter.invoke("get-token", json!({"chain": "10", "token": "USDC"})).await;

        assert_eq!(upstream.calls(Endpoint::Token), 2);
        assert_eq!(
            adapter.cache().keys_with_prefix("token:"),
            vec!["token:1-USDC".to_string(), "token:10-USDC".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listings_expire_before_reference_data() {
        let upstream = Arc::new(MockUpstream::new());
        upstream
            .respond(Endpoint::Chains, chains_fixture())
            .respond(Endpoint::Token, json!({"symbol": "USDC", "decimals": 6}))
            .respond(Endpoint::Tokens, json!({"tokens": {}}))
            .respond(Endpoint::Connections, json!({"connections": []}))
            .respond(Endpoint::Tools, json!({"bridges": [], "exchanges": []}));
        let adapter = adapter_with(upstream.clone());

        let calls = [
            ("get-chains", json!({})),
            ("get-token", json!({"chain": "1", "token": "USDC"})),
            ("get-tokens", json!({"chains": ["1"]})),
            ("get-connections", json!({"fromChain": "1", "toChain": "137"})),
            ("get-tools", json!({})),
        ];

        for (name, arguments) in &calls {
            result_of(adapter.invoke(name, arguments.clone()).await);
        }
        tokio::time::advance(Duration::from_secs(301)).await;
        for (name, arguments) in &calls {
            result_of(adapter.invoke(name, arguments.clone()).await);
        }

        assert_eq!(upstream.calls(Endpoint::Chains), 1);
        assert_eq!(upstream.calls(Endpoint::Token), 1);
        assert_eq!(upstream.calls(Endpoint::Tokens), 2);
        assert_eq!(upstream.calls(Endpoint::Connections), 2);
        assert_eq!(upstream.calls(Endpoint::Tools), 2);

        assert_eq!(
            adapter.cache().keys_with_prefix("connections:"),
            vec!["connections:1-137-*-*".to_string()]
        );
        assert_eq!(adapter.cache().keys_with_prefix("tools:"), vec!["tools:*".to_string()]);
        assert_eq!(
            upstream.last_params(Endpoint::Connections),
            Some(json!({"fromChain": "1", "toChain": "137"}))
        );
    }

    #[tokio::test]
    async fn test_live_state_never_cached() {
        let upstream = Arc::new(MockUpstream::new());
        upstream
            .respond(Endpoint::TokenBalance, json!({"amount": "42"}))
            .respond(Endpoint::NativeBalance, json!({"amount": "1"}))
            .respond(Endpoint::Allowance, json!({"allowance": "0"}))
            .respond(Endpoint::Status, json!({"status": "PENDING"}))
            .respond(Endpoint::GasPrices, json!({"1": {"standard": 12}}));
        let adapter = adapter_with(upstream.clone());

        let balance = json!({"chain": "1", "tokenAddress": "0xa0b8", "walletAddress": "0xabc"});
        let native = json!({"chain": "1", "walletAddress": "0xabc"});
        let allowance = json!({
            "chain": "1",
            "tokenAddress": "0xa0b8",
            "ownerAddress": "0xabc",
            "spenderAddress": "0xdef"
        });
        let status = json!({"txHash": "0x123"});

        for _ in 0..2 {
            result_of(adapter.invoke("get-token-balance", balance.clone()).await);
            result_of(adapter.invoke("get-native-token-balance", native.clone()).await);
            result_of(adapter.invoke("get-allowance", allowance.clone()).await);
            result_of(adapter.invoke("get-status", status.clone()).await);
            result_of(adapter.invoke("get-gas-prices", json!({})).await);
        }

        assert_eq!(upstream.calls(Endpoint::TokenBalance), 2);
        assert_eq!(upstream.calls(Endpoint::NativeBalance), 2);
        assert_eq!(upstream.calls(Endpoint::Allowance), 2);
        assert_eq!(upstream.calls(Endpoint::Status), 2);
        assert_eq!(upstream.calls(Endpoint::GasPrices), 2);
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_error_envelope() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.fail(Endpoint::TokenBalance, 503, "RPC unavailable");
        let adapter = adapter_with(upstream.clone());

        let envelope = adapter
            .invoke(
                "get-token-balance",
                json!({"chain": "1", "tokenAddress": "0xa0b8", "walletAddress": "0xabc"}),
            )
            .await;

        assert!(envelope.is_error());
        let rendered = envelope.into_call_tool_result();
        assert_eq!(rendered.is_error, Some(true));
        assert_eq!(upstream.calls(Endpoint::TokenBalance), 1);
    }

    #[tokio::test]
    async fn test_failed_reference_fetch_not_cached() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.fail(Endpoint::Chains, 500, "boom");
        let adapter = adapter_with(upstream.clone());

        assert!(adapter.invoke("get-chains", json!({})).await.is_error());

        upstream.respond(Endpoint::Chains, chains_fixture());
        result_of(adapter.invoke("get-chains", json!({})).await);
        assert_eq!(upstream.calls(Endpoint::Chains), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_upstream() {
        let upstream = Arc::new(MockUpstream::new());
        let adapter = adapter_with(upstream.clone());

        let envelope = adapter.invoke("get-status", json!({"txHash": 5})).await;
        assert!(envelope.is_error());
        let envelope = adapter.invoke("no-such-tool", json!({})).await;
        assert_eq!(
            envelope,
            ToolEnvelope::Error {
                error: "Unknown tool: no-such-tool".to_string()
            }
        );
        assert_eq!(upstream.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_forwards_typed_params() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.respond(Endpoint::Quote, json!({"estimate": {"toAmount": "999000"}}));
        let adapter = adapter_with(upstream.clone());

        result_of(
            adapter
                .invoke(
                    "get-quote",
                    json!({
                        "fromChain": "1",
                        "toChain": "10",
                        "fromToken": "USDC",
                        "toToken": "USDC",
                        "fromAddress": "0xabc",
                        "fromAmount": "1000000",
                        "slippage": 0.005
                    }),
                )
                .await,
        );

        let params = upstream.last_params(Endpoint::Quote).unwrap();
        assert_eq!(params["toChain"], "10");
        assert_eq!(params["slippage"].as_f64(), Some(0.005));
    }

    #[test]
    fn test_result_rendered_as_pretty_json() {
        let envelope = ToolEnvelope::Result {
            result: json!({"ok": true}),
        };
        let rendered = envelope.into_call_tool_result();
        assert_eq!(rendered.is_error, None);
        match &rendered.content[0] {
            ToolContent::Text { text } => assert_eq!(text, "{\n  \"ok\": true\n}"),
        }
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = ToolEnvelope::Result { result: json!(1) };
        let err = ToolEnvelope::Error {
            error: "nope".to_string(),
        };
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"result": 1}));
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "nope"}));
    }
}
