// Quotes, routes, transaction status and gas prices. Live state, never cached.

use super::{
    json_schema_any_object, json_schema_integer, json_schema_number, json_schema_object,
    json_schema_string, require_base_units, require_non_empty, schema, ToolAdapter, ToolError,
};
use crate::protocol::ToolSchema;
use routegate_core::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQuoteArgs {
    pub from_chain: String,
    pub to_chain: String,
    pub from_token: String,
    pub to_token: String,
    pub from_address: String,
    pub from_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl GetQuoteArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("fromChain", &self.from_chain)?;
        require_non_empty("toChain", &self.to_chain)?;
        require_non_empty("fromToken", &self.from_token)?;
        require_non_empty("toToken", &self.to_token)?;
        require_non_empty("fromAddress", &self.from_address)?;
        require_base_units("fromAmount", &self.from_amount)?;
        validate_slippage(self.slippage)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRoutesArgs {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub from_token_address: String,
    pub to_token_address: String,
    pub from_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    /// Passed through untouched (slippage, order, bridge allow/deny lists...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl GetRoutesArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        require_non_empty("fromTokenAddress", &self.from_token_address)?;
        require_non_empty("toTokenAddress", &self.to_token_address)?;
        require_base_units("fromAmount", &self.from_amount)?;
        match self.options {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(ToolError::invalid("options must be an object")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStepTransactionArgs {
    /// A step as returned inside a route
    pub step: Value,
}

impl GetStepTransactionArgs {
    pub(crate) fn validate(&self) -> Result<(), ToolError> {
        if !self.step.is_object() {
            return Err(ToolError::invalid("step must be an object taken from a route"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatusArgs {
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_chain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetGasPricesArgs {}

fn validate_slippage(slippage: Option<f64>) -> Result<(), ToolError> {
    match slippage {
        Some(s) if !(0.0..=1.0).contains(&s) => Err(ToolError::invalid(format!(
            "slippage must be a fraction between 0 and 1, got {s}"
        ))),
        _ => Ok(()),
    }
}

impl ToolAdapter {
    pub(crate) async fn get_quote(&self, args: GetQuoteArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::Quote, serde_json::to_value(&args)?).await
    }

    pub(crate) async fn get_routes(&self, args: GetRoutesArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::Routes, serde_json::to_value(&args)?).await
    }

    pub(crate) async fn get_step_transaction(&self, args: GetStepTransactionArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::StepTransaction, args.step).await
    }

    pub(crate) async fn get_status(&self, args: GetStatusArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::Status, serde_json::to_value(&args)?).await
    }

    pub(crate) async fn get_gas_prices(&self, _args: GetGasPricesArgs) -> Result<Value, ToolError> {
        self.live(Endpoint::GasPrices, json!({})).await
    }
}

pub(crate) fn schemas() -> Vec<ToolSchema> {
    vec![
        schema(
            "get-quote",
            "Get a quote for a token transfer, possibly cross-chain. Amounts are in the token's smallest unit.",
            json_schema_object(
                json!({
                    "fromChain": json_schema_string("Source chain id or key"),
                    "toChain": json_schema_string("Destination chain id or key"),
                    "fromToken": json_schema_string("Source token address or symbol"),
                    "toToken": json_schema_string("Destination token address or symbol"),
                    "fromAddress": json_schema_string("Sending wallet address"),
                    "fromAmount": json_schema_string("Amount to send, in base units"),
                    "toAddress": json_schema_string("Receiving wallet address (defaults to fromAddress)"),
                    "slippage": json_schema_number("Maximum slippage as a fraction, e.g. 0.005"),
                    "order": json_schema_string("Route preference: FASTEST or CHEAPEST")
                }),
                vec!["fromChain", "toChain", "fromToken", "toToken", "fromAddress", "fromAmount"],
            ),
        ),
        schema(
            "get-routes",
            "Get multiple route options for a transfer between two chains",
            json_schema_object(
                json!({
                    "fromChainId": json_schema_integer("Source chain id"),
                    "toChainId": json_schema_integer("Destination chain id"),
                    "fromTokenAddress": json_schema_string("Source token address"),
                    "toTokenAddress": json_schema_string("Destination token address"),
                    "fromAmount": json_schema_string("Amount to send, in base units"),
                    "fromAddress": json_schema_string("Sending wallet address"),
                    "toAddress": json_schema_string("Receiving wallet address"),
                    "options": json_schema_any_object("Route options such as slippage and order")
                }),
                vec!["fromChainId", "toChainId", "fromTokenAddress", "toTokenAddress", "fromAmount"],
            ),
        ),
        schema(
            "get-step-transaction",
            "Get the unsigned transaction data for one step of a route",
            json_schema_object(
                json!({ "step": json_schema_any_object("Step object taken from a route") }),
                vec!["step"],
            ),
        ),
        schema(
            "get-status",
            "Check the status of a cross-chain transfer",
            json_schema_object(
                json!({
                    "txHash": json_schema_string("Transaction hash of the sending transaction"),
                    "bridge": json_schema_string("Bridge used, if known"),
                    "fromChain": json_schema_string("Source chain id or key"),
                    "toChain": json_schema_string("Destination chain id or key")
                }),
                vec!["txHash"],
            ),
        ),
        schema(
            "get-gas-prices",
            "Current gas prices for all supported chains",
            json_schema_object(json!({}), vec![]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slippage_bounds() {
        assert!(validate_slippage(None).is_ok());
        assert!(validate_slippage(Some(0.005)).is_ok());
        assert!(validate_slippage(Some(1.5)).is_err());
        assert!(validate_slippage(Some(-0.1)).is_err());
    }

    #[test]
    fn test_quote_params_use_upstream_names() {
        let args: GetQuoteArgs = serde_json::from_value(json!({
            "fromChain": "1",
            "toChain": "10",
            "fromToken": "USDC",
            "toToken": "USDC",
            "fromAddress": "0xabc",
            "fromAmount": "1000000"
        }))
        .unwrap();

        let params = serde_json::to_value(&args).unwrap();
        assert_eq!(params["fromAmount"], "1000000");
        assert!(params.get("slippage").is_none());
    }

    #[test]
    fn test_routes_options_must_be_object() {
        let args: GetRoutesArgs = serde_json::from_value(json!({
            "fromChainId": 1,
            "toChainId": 10,
            "fromTokenAddress": "0xa",
            "toTokenAddress": "0xb",
            "fromAmount": "100",
            "options": "fast"
        }))
        .unwrap();
        assert!(args.validate().is_err());
    }
}
