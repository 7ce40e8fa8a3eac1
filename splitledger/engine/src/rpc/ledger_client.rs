use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use splitledger_wallet_interface::{
    LedgerQueryError, LedgerQueryResult, LedgerQueryService, LedgerTransaction,
};
use tracing::debug;

use crate::config::{EndpointConfig, Network};

/// Status assumed for a transaction the explorer serves without one; it is
/// only served once included in a block.
const INCLUDED_STATUS: &str = "accepted";

#[derive(Debug, thiserror::Error)]
pub enum LedgerClientError {
    #[error("invalid ledger endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("ledger transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// REST client for a public block explorer.
#[derive(Clone)]
pub struct LedgerRestClient {
    inner: Client,
    base: Url,
    network: Network,
}

impl LedgerRestClient {
    pub fn new(base: &str, network: Network, timeout: Duration) -> Result<Self, LedgerClientError> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|err| LedgerClientError::InvalidEndpoint(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(LedgerClientError::InvalidEndpoint(base.to_string()));
        }
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            base,
            network,
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, LedgerClientError> {
        Self::new(&config.ledger_api, config.network, config.timeout())
    }

    pub fn mapping_url(&self, program_id: &str, mapping: &str, key: &str) -> Url {
        self.url(&["program", program_id, "mapping", mapping, key])
    }

    pub fn transaction_url(&self, id: &str) -> Url {
        self.url(&["transaction", id])
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(self.network.as_str()).extend(segments);
        }
        url
    }

    /// GET a JSON document; 404 is `Ok(None)`.
    async fn get_json(&self, url: Url) -> LedgerQueryResult<Option<Value>> {
        debug!(%url, "ledger query");
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|error| LedgerQueryError::Network(error.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|error| LedgerQueryError::Decode(error.to_string())),
            status => Err(LedgerQueryError::Status {
                status: status.as_u16(),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TransactionDto {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    execution: Option<ExecutionDto>,
    /// Confirmed-transaction envelopes nest the transaction one level down.
    #[serde(default)]
    transaction: Option<Box<TransactionDto>>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutionDto {
    #[serde(default)]
    transitions: Vec<TransitionDto>,
}

#[derive(Debug, Default, Deserialize)]
struct TransitionDto {
    #[serde(default)]
    outputs: Vec<OutputDto>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputDto {
    #[serde(default)]
    value: Option<String>,
}

impl TransactionDto {
    fn into_transaction(self) -> LedgerTransaction {
        let status = self
            .status
            .filter(|status| !status.trim().is_empty())
            .unwrap_or_else(|| INCLUDED_STATUS.to_string());
        let (id, execution) = match self.transaction {
            Some(inner) if self.id.is_empty() => (inner.id, inner.execution),
            Some(inner) => (self.id, self.execution.or(inner.execution)),
            None => (self.id, self.execution),
        };
        let outputs = execution
            .map(|execution| {
                execution
                    .transitions
                    .into_iter()
                    .flat_map(|transition| transition.outputs)
                    .filter_map(|output| output.value)
                    .collect()
            })
            .unwrap_or_default();
        LedgerTransaction {
            id,
            status,
            outputs,
        }
    }
}

fn mapping_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl LedgerQueryService for LedgerRestClient {
    async fn read_mapping(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> LedgerQueryResult<Option<String>> {
        let value = self
            .get_json(self.mapping_url(program_id, mapping, key))
            .await?;
        Ok(value.and_then(mapping_value))
    }

    async fn read_transaction(&self, id: &str) -> LedgerQueryResult<Option<LedgerTransaction>> {
        let Some(value) = self.get_json(self.transaction_url(id)).await? else {
            return Ok(None);
        };
        let dto: TransactionDto = serde_json::from_value(value)
            .map_err(|error| LedgerQueryError::Decode(error.to_string()))?;
        Ok(Some(dto.into_transaction()))
    }
}
