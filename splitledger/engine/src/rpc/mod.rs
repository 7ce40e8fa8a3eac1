//! HTTP-backed implementations of the wallet and ledger services.

mod ledger_client;
mod wallet_client;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use ledger_client::{LedgerClientError, LedgerRestClient};
pub use wallet_client::{WalletRpcClient, WalletRpcClientError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Executor refused the inputs.
pub const REJECTED_INPUT_CODE: i32 = -32004;
/// Record could not be decrypted by the caller.
pub const DECRYPT_ERROR_CODE: i32 = -32005;
/// Standard JSON-RPC "method not found".
pub const METHOD_NOT_FOUND_CODE: i32 = -32601;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}
