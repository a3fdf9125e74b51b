// Balance and allowance lookups. Live state, never cached.

use super::{json_schema_object, json_schema_string, require_non_empty, schema, ToolAdapter, ToolError};
use crate::protocol::ToolSchema;
use routegate_core::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTokenBalanceArgs {
    pub chain: String,
    pub token_address: String,
    pub wallet_address: String,
}

impl GetTokenBalanceArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("chain", &self.chain)?;
        require_non_empty("tokenAddress", &self.token_address)?;
        require_non_empty("walletAddress", &self.wallet_address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNativeTokenBalanceArgs {
    pub chain: String,
    pub wallet_address: String,
}

impl GetNativeTokenBalanceArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("chain", &self.chain)?;
        require_non_empty("walletAddress", &self.wallet_address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllowanceArgs {
    pub chain: String,
    pub token_address: String,
    pub owner_address: String,
    pub spender_address: String,
}

impl GetAllowanceArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("chain", &self.chain)?;
        require_non_empty("tokenAddress", &self.token_address)?;
        require_non_empty("ownerAddress", &self.owner_address)?;
        require_non_empty("spenderAddress", &self.spender_address)
    }
}

impl ToolAdapter {
    pub(crate) async fn get_token_balance(&self, args: GetTokenBalanceArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::TokenBalance, serde_json::to_value(&args)?).await
    }

    pub(crate) async fn get_native_token_balance(
        &self,
        args: GetNativeTokenBalanceArgs,
    ) -> Result<Value, ToolError> {
        self.live(Endpoint::NativeBalance, serde_json::to_value(&args)?).await
    }

    pub(crate) async fn get_allowance(&self, args: GetAllowanceArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::Allowance, serde_json::to_value(&args)?).await
    }
}

pub(crate) fn schemas() -> Vec<ToolSchema> {
    vec![
        schema(
            "get-token-balance",
            "Get a wallet's balance of a token. Always fetched fresh.",
            json_schema_object(
                json!({
                    "chain": json_schema_string("Chain id or key"),
                    "tokenAddress": json_schema_string("Token contract address"),
                    "walletAddress": json_schema_string("Wallet address to inspect")
                }),
                vec!["chain", "tokenAddress", "walletAddress"],
            ),
        ),
        schema(
            "get-native-token-balance",
            "Get a wallet's native gas token balance. Always fetched fresh.",
            json_schema_object(
                json!({
                    "chain": json_schema_string("Chain id or key"),
                    "walletAddress": json_schema_string("Wallet address to inspect")
                }),
                vec!["chain", "walletAddress"],
            ),
        ),
        schema(
            "get-allowance",
            "Get the amount a spender may transfer from an owner's token balance",
            json_schema_object(
                json!({
                    "chain": json_schema_string("Chain id or key"),
                    "tokenAddress": json_schema_string("Token contract address"),
                    "ownerAddress": json_schema_string("Token owner address"),
                    "spenderAddress": json_schema_string("Spender (usually a contract) address")
                }),
                vec!["chain", "tokenAddress", "ownerAddress", "spenderAddress"],
            ),
        ),
    ]
}
