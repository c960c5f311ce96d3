//! Read-only contract calls through a Stacks node's RPC API

use crate::clarity::ClarityValue;
use crate::config::ChainConfig;
use crate::core::{ChainError, ChainReader, IndexerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CallReadRequest<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CallReadResponse {
    okay: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

pub struct StacksNodeClient {
    http: reqwest::Client,
    node_url: String,
    contract_address: String,
    contract_name: String,
    admins_function: String,
    threshold_function: String,
}

impl StacksNodeClient {
    pub fn new(config: &ChainConfig) -> IndexerResult<Self> {
        let (contract_address, contract_name) = config
            .treasury_contract
            .split_once('.')
            .ok_or_else(|| ChainError::Request(format!("invalid contract id {}", config.treasury_contract)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            node_url: config.node_url.trim_end_matches('/').to_string(),
            contract_address: contract_address.to_string(),
            contract_name: contract_name.to_string(),
            admins_function: config.admins_function.clone(),
            threshold_function: config.threshold_function.clone(),
        })
    }

    /// Call a read-only function without arguments and decode its result
    async fn call_read(&self, function: &str) -> IndexerResult<ClarityValue> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.node_url, self.contract_address, self.contract_name, function
        );
        let request = CallReadRequest {
            sender: &self.contract_address,
            arguments: Vec::new(),
        };

        let response: CallReadResponse = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(function, okay = response.okay, "call-read response");
        Ok(decode_call_result(function, response)?)
    }
}

fn decode_call_result(function: &str, response: CallReadResponse) -> Result<ClarityValue, ChainError> {
    if !response.okay {
        return Err(ChainError::CallFailed {
            function: function.to_string(),
            cause: response.cause.unwrap_or_else(|| "no cause given".to_string()),
        });
    }
    let hex = response
        .result
        .ok_or_else(|| ChainError::UnexpectedValue(format!("{} returned no result", function)))?;
    ClarityValue::from_hex(&hex)?.into_ok()
}

/// Accept `(list principal)` optionally wrapped in `(some ..)`
fn principals(value: ClarityValue) -> Result<Vec<String>, ChainError> {
    match value {
        ClarityValue::OptionalSome(inner) => principals(*inner),
        ClarityValue::OptionalNone => Ok(Vec::new()),
        ClarityValue::List(items) => items
            .into_iter()
            .map(|item| match item {
                ClarityValue::Principal(p) => Ok(p),
                other => Err(ChainError::UnexpectedValue(format!("expected principal, got {}", other.to_json()))),
            })
            .collect(),
        other => Err(ChainError::UnexpectedValue(format!("expected a list, got {}", other.to_json()))),
    }
}

fn threshold(value: ClarityValue) -> Result<u64, ChainError> {
    value
        .as_uint()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| ChainError::UnexpectedValue(format!("expected a uint threshold, got {}", value.to_json())))
}

#[async_trait]
impl ChainReader for StacksNodeClient {
    async fn admins(&self) -> IndexerResult<Vec<String>> {
        let value = self.call_read(&self.admins_function).await?;
        Ok(principals(value)?)
    }

    async fn approval_threshold(&self) -> IndexerResult<u64> {
        let value = self.call_read(&self.threshold_function).await?;
        Ok(threshold(value)?)
    }
}
