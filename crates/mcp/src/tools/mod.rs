//! The closed set of tools exposed to clients.
//!
//! Every tool is one [`ToolCall`] variant carrying typed arguments. Calls are
//! dispatched through [`ToolAdapter::invoke`], which always answers with a
//! [`ToolEnvelope`].

mod adapter;
mod market;
mod reference;
mod schema;
mod wallet;

pub use adapter::{ToolAdapter, ToolEnvelope, ToolError};
pub use market::{GetGasPricesArgs, GetQuoteArgs, GetRoutesArgs, GetStatusArgs, GetStepTransactionArgs};
pub use reference::{
    GetChainByIdArgs, GetChainByNameArgs, GetChainsArgs, GetConnectionsArgs, GetTokenArgs,
    GetTokensArgs, GetToolsArgs,
};
pub use schema::{
    json_schema_any_object, json_schema_array, json_schema_integer, json_schema_number,
    json_schema_object, json_schema_string,
};
pub use wallet::{GetAllowanceArgs, GetNativeTokenBalanceArgs, GetTokenBalanceArgs};

use crate::protocol::ToolSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A parsed tool invocation
#[derive(Debug, Clone)]
pub enum ToolCall {
    GetChains(GetChainsArgs),
    GetChainById(GetChainByIdArgs),
    GetChainByName(GetChainByNameArgs),
    GetTokens(GetTokensArgs),
    GetToken(GetTokenArgs),
    GetConnections(GetConnectionsArgs),
    GetTools(GetToolsArgs),
    GetQuote(GetQuoteArgs),
    GetRoutes(GetRoutesArgs),
    GetStepTransaction(GetStepTransactionArgs),
    GetStatus(GetStatusArgs),
    GetGasPrices(GetGasPricesArgs),
    GetTokenBalance(GetTokenBalanceArgs),
    GetNativeTokenBalance(GetNativeTokenBalanceArgs),
    GetAllowance(GetAllowanceArgs),
}

impl ToolCall {
    /// Parse a tool name and its raw arguments
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };

        let call = match name {
            "get-chains" => Self::GetChains(args(name, arguments)?),
            "get-chain-by-id" => Self::GetChainById(args(name, arguments)?),
            "get-chain-by-name" => Self::GetChainByName(args(name, arguments)?),
            "get-tokens" => Self::GetTokens(args(name, arguments)?),
            "get-token" => Self::GetToken(args(name, arguments)?),
            "get-connections" => Self::GetConnections(args(name, arguments)?),
            "get-tools" => Self::GetTools(args(name, arguments)?),
            "get-quote" => Self::GetQuote(args(name, arguments)?),
            "get-routes" => Self::GetRoutes(args(name, arguments)?),
            "get-step-transaction" => Self::GetStepTransaction(args(name, arguments)?),
            "get-status" => Self::GetStatus(args(name, arguments)?),
            "get-gas-prices" => Self::GetGasPrices(args(name, arguments)?),
            "get-token-balance" => Self::GetTokenBalance(args(name, arguments)?),
            "get-native-token-balance" => Self::GetNativeTokenBalance(args(name, arguments)?),
            "get-allowance" => Self::GetAllowance(args(name, arguments)?),
            _ => return Err(ToolError::UnknownTool(name.to_string())),
        };

        call.validate()?;
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetChains(_) => "get-chains",
            Self::GetChainById(_) => "get-chain-by-id",
            Self::GetChainByName(_) => "get-chain-by-name",
            Self::GetTokens(_) => "get-tokens",
            Self::GetToken(_) => "get-token",
            Self::GetConnections(_) => "get-connections",
            Self::GetTools(_) => "get-tools",
            Self::GetQuote(_) => "get-quote",
            Self::GetRoutes(_) => "get-routes",
            Self::GetStepTransaction(_) => "get-step-transaction",
            Self::GetStatus(_) => "get-status",
            Self::GetGasPrices(_) => "get-gas-prices",
            Self::GetTokenBalance(_) => "get-token-balance",
            Self::GetNativeTokenBalance(_) => "get-native-token-balance",
            Self::GetAllowance(_) => "get-allowance",
        }
    }

    /// Live-state tools always reach the upstream
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Self::GetQuote(_)
                | Self::GetRoutes(_)
                | Self::GetStepTransaction(_)
                | Self::GetStatus(_)
                | Self::GetGasPrices(_)
                | Self::GetTokenBalance(_)
                | Self::GetNativeTokenBalance(_)
                | Self::GetAllowance(_)
        )
    }

    fn validate(&self) -> Result<(), ToolError> {
        match self {
            Self::GetChainByName(a) => require_non_empty("name", &a.name),
            Self::GetToken(a) => a.validate(),
            Self::GetQuote(a) => a.validate(),
            Self::GetRoutes(a) => a.validate(),
            Self::GetStepTransaction(a) => a.validate(),
            Self::GetStatus(a) => require_non_empty("txHash", &a.tx_hash),
            Self::GetTokenBalance(a) => a.validate(),
            Self::GetNativeTokenBalance(a) => a.validate(),
            Self::GetAllowance(a) => a.validate(),
            _ => Ok(()),
        }
    }
}

/// Schemas for every tool, in a stable order
pub fn tool_schemas() -> Vec<ToolSchema> {
    let mut schemas = reference::schemas();
    schemas.extend(market::schemas());
    schemas.extend(wallet::schemas());
    schemas
}

fn args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Amounts are integers in the token's smallest unit
pub(crate) fn require_base_units(field: &str, value: &str) -> Result<(), ToolError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ToolError::invalid(format!(
            "{field} must be an integer amount in the token's smallest unit, got {value:?}"
        )));
    }
    Ok(())
}

/// Build a name -> schema entry from its parts
pub(crate) fn schema(name: &str, description: &str, input_schema: Value) -> ToolSchema {
    ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_schema_parses_back_to_its_tool() {
        for schema in tool_schemas() {
            let err = ToolCall::parse(&schema.name, json!({}));
            // Tools with required arguments reject an empty object, but never as unknown
            if let Err(e) = err {
                assert!(
                    !matches!(e, ToolError::UnknownTool(_)),
                    "{} is listed but not dispatchable",
                    schema.name
                );
            }
        }
    }

    #[test]
    fn test_schema_names_are_unique() {
        let schemas = tool_schemas();
        let mut names: Vec<_> = schemas.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), schemas.len());
        assert_eq!(schemas.len(), 15);
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolCall::parse("get-weather", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: get-weather");
    }

    #[test]
    fn test_null_arguments_treated_as_empty() {
        let call = ToolCall::parse("get-chains", Value::Null).unwrap();
        assert_eq!(call.name(), "get-chains");
        assert!(!call.is_live());
    }

    #[test]
    fn test_missing_required_argument() {
        let err = ToolCall::parse("get-token", json!({"chain": "1"})).unwrap_err();
        assert!(err.to_string().contains("missing field `token`"), "{err}");
    }

    #[test]
    fn test_amount_must_be_base_units() {
        let err = ToolCall::parse(
            "get-quote",
            json!({
                "fromChain": "1",
                "toChain": "10",
                "fromToken": "USDC",
                "toToken": "USDC",
                "fromAddress": "0x552008c0f6870c2f77e5cC1d2eb9bdff03e30Ea0",
                "fromAmount": "1.5"
            }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("smallest unit"), "{err}");
    }
}
