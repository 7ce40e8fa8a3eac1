use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use splitledger_wallet_interface::{
    ExecutionRequest, ExecutionResponse, StatusReport, WalletRecord, WalletService,
    WalletServiceError, WalletServiceResult, WalletTransaction,
};
use tracing::debug;

use super::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, DECRYPT_ERROR_CODE, JSONRPC_VERSION,
    METHOD_NOT_FOUND_CODE, REJECTED_INPUT_CODE,
};
use crate::config::EndpointConfig;

const RECORDS_METHOD: &str = "wallet_records";
const DECRYPT_METHOD: &str = "wallet_decrypt";
const EXECUTE_METHOD: &str = "wallet_execute";
const STATUS_METHOD: &str = "wallet_transaction_status";
const HISTORY_METHOD: &str = "wallet_transaction_history";

#[derive(Debug, thiserror::Error)]
pub enum WalletRpcClientError {
    #[error("invalid RPC endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("wallet RPC JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wallet RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("wallet RPC transport error: HTTP status {0}")]
    HttpStatus(StatusCode),
    #[error("wallet RPC returned an empty response")]
    EmptyResponse,
    #[error("wallet RPC error [{code}]: {message}")]
    Rpc { code: i32, message: String },
}

impl WalletRpcClientError {
    fn into_service_error(self, method: &'static str) -> WalletServiceError {
        match self {
            WalletRpcClientError::Transport(error) => WalletServiceError::network(error),
            WalletRpcClientError::HttpStatus(status) => {
                WalletServiceError::network_with_message(format!("wallet answered HTTP {status}"))
            }
            WalletRpcClientError::Rpc { code, message } => match code {
                REJECTED_INPUT_CODE => WalletServiceError::rejected_input(message),
                DECRYPT_ERROR_CODE => WalletServiceError::decrypt(message),
                METHOD_NOT_FOUND_CODE => WalletServiceError::Unsupported { capability: method },
                _ => WalletServiceError::Other(format!("{method} failed: {message}")),
            },
            other => WalletServiceError::Other(other.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgramParams<'a> {
    program_id: &'a str,
}

#[derive(Serialize)]
struct DecryptParams<'a> {
    ciphertext: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams<'a> {
    transaction_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DecryptResponse {
    Bare(String),
    Wrapped { plaintext: String },
}

/// JSON-RPC client for a browser-extension style wallet bridge.
#[derive(Clone)]
pub struct WalletRpcClient {
    inner: Client,
    url: Url,
    auth_token: Option<String>,
}

impl WalletRpcClient {
    /// Builds a new client from a string endpoint, normalising the `/rpc` suffix if needed.
    pub fn from_endpoint(
        endpoint: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, WalletRpcClientError> {
        let url = Url::parse(endpoint)
            .map_err(|err| WalletRpcClientError::InvalidEndpoint(err.to_string()))?;
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            url: normalize_url(url),
            auth_token,
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, WalletRpcClientError> {
        Self::from_endpoint(&config.wallet_rpc, config.auth_token.clone(), config.timeout())
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    /// Issues a raw JSON-RPC call returning the untyped [`Value`] payload.
    pub async fn request<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<Value, WalletRpcClientError> {
        let payload = JsonRpcRequest {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id: Some(Value::from(1)),
            method: method.to_owned(),
            params: params.map(serde_json::to_value).transpose()?,
        };

        let mut request = self.inner.post(self.url.clone()).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WalletRpcClientError::HttpStatus(response.status()));
        }

        let response: JsonRpcResponse = response.json().await?;
        unpack(response)
    }

    pub async fn call<P, R>(&self, method: &str, params: Option<P>) -> Result<R, WalletRpcClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Calls an optional wallet capability; a missing method is `Ok(None)`.
    async fn call_optional<P, R>(
        &self,
        method: &'static str,
        params: P,
    ) -> WalletServiceResult<Option<R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        match self.call::<P, Option<R>>(method, Some(params)).await {
            Ok(value) => Ok(value),
            Err(WalletRpcClientError::Rpc { code, .. }) if code == METHOD_NOT_FOUND_CODE => {
                debug!(method, "wallet does not implement optional method");
                Ok(None)
            }
            Err(WalletRpcClientError::EmptyResponse) => Ok(None),
            Err(error) => Err(error.into_service_error(method)),
        }
    }
}

fn unpack(response: JsonRpcResponse) -> Result<Value, WalletRpcClientError> {
    if let Some(JsonRpcError { code, message, .. }) = response.error {
        return Err(WalletRpcClientError::Rpc { code, message });
    }
    response.result.ok_or(WalletRpcClientError::EmptyResponse)
}

fn normalize_url(mut url: Url) -> Url {
    let mut path = url.path().to_string();
    if path.is_empty() || path == "/" {
        url.set_path("/rpc");
    } else if !path.ends_with("/rpc") {
        if path.ends_with('/') {
            path.truncate(path.len() - 1);
        }
        path.push_str("/rpc");
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl WalletService for WalletRpcClient {
    async fn records(&self, program_id: &str) -> WalletServiceResult<Vec<WalletRecord>> {
        self.call(RECORDS_METHOD, Some(ProgramParams { program_id }))
            .await
            .map_err(|error| error.into_service_error(RECORDS_METHOD))
    }

    async fn decrypt(&self, ciphertext: &str) -> WalletServiceResult<String> {
        let response: DecryptResponse = self
            .call(DECRYPT_METHOD, Some(DecryptParams { ciphertext }))
            .await
            .map_err(|error| error.into_service_error(DECRYPT_METHOD))?;
        Ok(match response {
            DecryptResponse::Bare(plaintext) | DecryptResponse::Wrapped { plaintext } => plaintext,
        })
    }

    async fn execute(&self, request: &ExecutionRequest) -> WalletServiceResult<ExecutionResponse> {
        self.call(EXECUTE_METHOD, Some(request))
            .await
            .map_err(|error| error.into_service_error(EXECUTE_METHOD))
    }

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> WalletServiceResult<Option<StatusReport>> {
        self.call_optional(STATUS_METHOD, StatusParams { transaction_id })
            .await
    }

    async fn transaction_history(
        &self,
        program_id: &str,
    ) -> WalletServiceResult<Option<Vec<WalletTransaction>>> {
        self.call_optional(HISTORY_METHOD, ProgramParams { program_id })
            .await
    }
}
