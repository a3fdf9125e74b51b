// Reference and listing lookups: chains, tokens, connections, tools.
// All of these go through the response cache.

use super::{
    json_schema_array, json_schema_integer, json_schema_object, json_schema_string,
    require_non_empty, schema, ToolAdapter, ToolError,
};
use crate::protocol::ToolSchema;
use routegate_core::{CacheKey, Endpoint};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChainsArgs {
    /// Comma-separated chain types to keep, e.g. "EVM,SVM"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_types: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChainByIdArgs {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChainByNameArgs {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTokensArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_types: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTokenArgs {
    pub chain: String,
    pub token: String,
}

impl GetTokenArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("chain", &self.chain)?;
        require_non_empty("token", &self.token)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConnectionsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetToolsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<String>>,
}

impl ToolAdapter {
    /// Full chain list, cached for the reference TTL
    pub async fn chains(&self) -> Result<Value, ToolError> {
        let ttl = self.policy().reference_ttl;
        self.cached(CacheKey::chains(), ttl, Endpoint::Chains, json!({}))
            .await
    }

    pub(crate) async fn get_chains(&self, args: GetChainsArgs) -> Result<Value, ToolError> {
        let all = self.chains().await?;

        let Some(filter) = args.chain_types else {
            return Ok(all);
        };
        let wanted: Vec<String> = filter
            .split(',')
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        let chains: Vec<Value> = chain_list(&all)
            .iter()
            .filter(|chain| {
                chain
                    .get("chainType")
                    .and_then(Value::as_str)
                    .is_some_and(|t| wanted.iter().any(|w| w.eq_ignore_ascii_case(t)))
            })
            .cloned()
            .collect();

        Ok(json!({ "chains": chains }))
    }

    pub(crate) async fn get_chain_by_id(&self, args: GetChainByIdArgs) -> Result<Value, ToolError> {
        let all = self.chains().await?;
        chain_list(&all)
            .iter()
            .find(|chain| chain.get("id").and_then(Value::as_u64) == Some(args.id))
            .cloned()
            .ok_or_else(|| ToolError::NotFound(format!("Chain with ID {} not found", args.id)))
    }

    pub(crate) async fn get_chain_by_name(&self, args: GetChainByNameArgs) -> Result<Value, ToolError> {
        let all = self.chains().await?;
        let needle = args.name.trim();

        chain_list(&all)
            .iter()
            .find(|chain| {
                ["name", "key"].iter().any(|field| {
                    chain
                        .get(*field)
                        .and_then(Value::as_str)
                        .is_some_and(|v| v.eq_ignore_ascii_case(needle))
                })
            })
            .cloned()
            .ok_or_else(|| ToolError::NotFound(format!("Chain with name {needle} not found")))
    }

    pub(crate) async fn get_tokens(&self, args: GetTokensArgs) -> Result<Value, ToolError> {
        let key = CacheKey::tokens(args.chains.as_deref(), args.chain_types.as_deref());
        let ttl = self.policy().listing_ttl;
        self.cached(key, ttl, Endpoint::Tokens, serde_json::to_value(&args)?)
            .await
    }

    pub(crate) async fn get_token(&self, args: GetTokenArgs) -> Result<Value, ToolError> {
        let key = CacheKey::token(&args.chain, &args.token);
        let ttl = self.policy().reference_ttl;
        self.cached(key, ttl, Endpoint::Token, serde_json::to_value(&args)?)
            .await
    }

    pub(crate) async fn get_connections(&self, args: GetConnectionsArgs) -> Result<Value, ToolError> {
        let key = CacheKey::connections(&[
            args.from_chain.as_deref(),
            args.to_chain.as_deref(),
            args.from_token.as_deref(),
            args.to_token.as_deref(),
        ]);
        let ttl = self.policy().listing_ttl;
        self.cached(key, ttl, Endpoint::Connections, serde_json::to_value(&args)?)
            .await
    }

    pub(crate) async fn get_tools(&self, args: GetToolsArgs) -> Result<Value, ToolError> {
        let key = CacheKey::tools(args.chains.as_deref());
        let ttl = self.policy().listing_ttl;
        self.cached(key, ttl, Endpoint::Tools, serde_json::to_value(&args)?)
            .await
    }
}

fn chain_list(chains: &Value) -> &[Value] {
    chains
        .get("chains")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn schemas() -> Vec<ToolSchema> {
    let chain_list = json_schema_array(
        json_schema_string("Chain id or key"),
        "Restrict to these chains (ids like \"1\" or keys like \"eth\")",
    );

    vec![
        schema(
            "get-chains",
            "List all supported chains, optionally filtered by chain type",
            json_schema_object(
                json!({ "chainTypes": json_schema_string("Comma-separated chain types, e.g. \"EVM,SVM\"") }),
                vec![],
            ),
        ),
        schema(
            "get-chain-by-id",
            "Look up a supported chain by its numeric id",
            json_schema_object(json!({ "id": json_schema_integer("Numeric chain id, e.g. 1 for Ethereum") }), vec!["id"]),
        ),
        schema(
            "get-chain-by-name",
            "Look up a supported chain by name or key (case-insensitive)",
            json_schema_object(json!({ "name": json_schema_string("Chain name or key, e.g. \"Polygon\" or \"pol\"") }), vec!["name"]),
        ),
        schema(
            "get-tokens",
            "List tokens known on the given chains",
            json_schema_object(
                json!({
                    "chains": chain_list.clone(),
                    "chainTypes": json_schema_string("Comma-separated chain types")
                }),
                vec![],
            ),
        ),
        schema(
            "get-token",
            "Resolve a token on a chain by address or symbol",
            json_schema_object(
                json!({
                    "chain": json_schema_string("Chain id or key"),
                    "token": json_schema_string("Token address or symbol")
                }),
                vec!["chain", "token"],
            ),
        ),
        schema(
            "get-connections",
            "List possible transfer connections between chains and tokens",
            json_schema_object(
                json!({
                    "fromChain": json_schema_string("Source chain id or key"),
                    "toChain": json_schema_string("Destination chain id or key"),
                    "fromToken": json_schema_string("Source token address or symbol"),
                    "toToken": json_schema_string("Destination token address or symbol")
                }),
                vec![],
            ),
        ),
        schema(
            "get-tools",
            "List available bridges and exchanges",
            json_schema_object(json!({ "chains": chain_list }), vec![]),
        ),
    ]
}
