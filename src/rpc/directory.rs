//! On-chain collaborators
//!
//! The SovereignRPC registry and the stream validator are opaque contracts;
//! the gateway only ever performs read-only `eth_call`s against them. The
//! traits here are the seam: the selector validates its choice through a
//! [`ConsensusProbe`] and the stream routes go through a [`StreamValidator`],
//! both implemented by [`ChainDirectory`] in production and by mocks in
//! tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::abi;
use crate::types::{Result, SwitchboardError};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// The registry contract's own view of the best node
#[derive(Debug, Clone)]
pub struct BestNode {
    /// Node operator address
    pub operator: String,
    /// Node endpoint URL
    pub endpoint: String,
}

impl BestNode {
    /// A usable answer names a real operator and a non-empty endpoint
    pub fn is_usable(&self) -> bool {
        !self.endpoint.trim().is_empty() && self.operator != ZERO_ADDRESS
    }
}

/// Consensus read used to validate a node selection
#[async_trait]
pub trait ConsensusProbe: Send + Sync {
    /// Read the registry contract's `getBestNode()` through `endpoint`.
    ///
    /// Routing the read through the candidate is the point: a node that
    /// cannot serve the registry's own consensus view fails validation.
    async fn best_node_via(&self, endpoint: &str) -> Result<BestNode>;
}

/// Stream validation reads against the validator contract
#[async_trait]
pub trait StreamValidator: Send + Sync {
    async fn validate_stream(&self, stream_id: &str) -> Result<bool>;
    async fn stream_data(&self, stream_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

/// eth_call client for the gateway's contract reads
pub struct ChainDirectory {
    client: reqwest::Client,
    /// Endpoint used for stream-validation reads
    rpc_url: String,
    /// SovereignRPC registry contract
    registry_address: String,
    /// Stream validator contract, when configured
    validator_address: Option<String>,
}

impl ChainDirectory {
    pub fn new(
        rpc_url: String,
        registry_address: String,
        validator_address: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            rpc_url,
            registry_address,
            validator_address,
        }
    }

    /// Whether stream validation reads are configured
    pub fn has_stream_validator(&self) -> bool {
        self.validator_address.is_some()
    }

    /// Perform a read-only eth_call through `endpoint`
    async fn eth_call(&self, endpoint: &str, to: &str, call: Vec<u8>) -> Result<Vec<u8>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{"to": to, "data": abi::to_hex_data(&call)}, "latest"],
        });

        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SwitchboardError::Directory(format!("eth_call transport: {e}")))?;

        if !response.status().is_success() {
            return Err(SwitchboardError::Directory(format!(
                "eth_call returned status {}",
                response.status()
            )));
        }

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| SwitchboardError::Directory(format!("eth_call response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(SwitchboardError::Directory(format!(
                "eth_call error: {error}"
            )));
        }

        let result = parsed
            .result
            .ok_or_else(|| SwitchboardError::Directory("eth_call returned no result".to_string()))?;

        abi::from_hex_result(&result)
    }
}

#[async_trait]
impl ConsensusProbe for ChainDirectory {
    async fn best_node_via(&self, endpoint: &str) -> Result<BestNode> {
        let raw = self
            .eth_call(endpoint, &self.registry_address, abi::encode_call("getBestNode()"))
            .await?;
        let (operator, node_endpoint) = abi::decode_address_string(&raw)?;

        debug!(
            via = %endpoint,
            operator = %operator,
            endpoint = %node_endpoint,
            "Consensus read: registry best node"
        );

        Ok(BestNode {
            operator,
            endpoint: node_endpoint,
        })
    }
}

#[async_trait]
impl StreamValidator for ChainDirectory {
    async fn validate_stream(&self, stream_id: &str) -> Result<bool> {
        let Some(ref validator) = self.validator_address else {
            return Err(SwitchboardError::StreamValidation(
                "stream validator address not configured".to_string(),
            ));
        };

        let call = abi::encode_call_string("validateStreamId(string)", stream_id);
        let raw = self
            .eth_call(&self.rpc_url, validator, call)
            .await
            .map_err(|e| SwitchboardError::StreamValidation(e.to_string()))?;

        abi::decode_bool(&raw).map_err(|e| SwitchboardError::StreamValidation(e.to_string()))
    }

    async fn stream_data(&self, stream_id: &str) -> Result<String> {
        let Some(ref validator) = self.validator_address else {
            return Err(SwitchboardError::StreamValidation(
                "stream validator address not configured".to_string(),
            ));
        };

        let call = abi::encode_call_string("getStreamData(string)", stream_id);
        let raw = self.eth_call(&self.rpc_url, validator, call).await?;
        abi::decode_string(&raw)
    }
}
