//! Ethereum JSON-RPC balance source
//!
//! Reads native balances via `eth_getBalance` and ERC-20 balances via
//! `eth_call` to `balanceOf(address)`. Raw 256-bit results are scaled by the
//! token's decimals into `Decimal`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::debug;

use crate::adapters::errors::{SourceError, SourceResult};
use crate::adapters::traits::BalanceSource;
use crate::config::constants::{HTTP_CONNECT_TIMEOUT, HTTP_POOL_MAX_IDLE};
use crate::config::{TokenContract, NATIVE_DECIMALS, NATIVE_TOKEN};
use crate::core::logging::sanitize;
use crate::core::metrics::MetricsRegistry;

/// ERC-20 `balanceOf(address)` function selector
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

const METHOD_GET_BALANCE: &str = "eth_getBalance";
const METHOD_CALL: &str = "eth_call";

// =============================================================================
// JSON-RPC wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

// =============================================================================
// EthRpcSource
// =============================================================================

/// Balance source backed by an Ethereum JSON-RPC endpoint
pub struct EthRpcSource {
    rpc_url: String,
    http_client: reqwest::Client,
    token_contracts: BTreeMap<String, TokenContract>,
    metrics: Option<Arc<MetricsRegistry>>,
}

/// One prepared JSON-RPC call
struct RpcRequest {
    method: &'static str,
    body: Value,
    decimals: u32,
}

impl EthRpcSource {
    /// Create a source for `rpc_url` that knows the given ERC-20 contracts
    ///
    /// `token_contracts` keys must be lowercase symbols (as produced by
    /// `AppConfig::validate`).
    pub fn new(rpc_url: impl Into<String>, token_contracts: BTreeMap<String, TokenContract>) -> Self {
        let rpc_url = rpc_url.into();
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        tracing::info!(
            rpc_url = %sanitize(&rpc_url),
            tokens = token_contracts.len(),
            "[INIT] Ethereum RPC source configured"
        );

        Self {
            rpc_url,
            http_client,
            token_contracts,
            metrics: None,
        }
    }

    /// Count every request in `eth_rpc_request_total` by JSON-RPC method
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the JSON-RPC request body for one balance lookup
    fn build_request(&self, address: &str, token: &str) -> SourceResult<RpcRequest> {
        if token == NATIVE_TOKEN {
            let body = json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": METHOD_GET_BALANCE,
                "params": [address, "latest"],
            });
            return Ok(RpcRequest {
                method: METHOD_GET_BALANCE,
                body,
                decimals: NATIVE_DECIMALS,
            });
        }

        let contract = self
            .token_contracts
            .get(token)
            .ok_or_else(|| SourceError::InvalidResponse(format!("Unknown token: {}", token)))?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": METHOD_CALL,
            "params": [
                { "to": contract.contract, "data": balance_of_calldata(address)? },
                "latest"
            ],
        });
        Ok(RpcRequest {
            method: METHOD_CALL,
            body,
            decimals: contract.decimals,
        })
    }

    async fn post(&self, body: &Value, timeout: Duration) -> SourceResult<String> {
        let response = self
            .http_client
            .post(&self.rpc_url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        if !status.is_success() {
            return Err(SourceError::RpcError(format!("HTTP {}: {}", status, truncate(&text))));
        }

        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| SourceError::InvalidResponse(format!("Malformed JSON-RPC body: {}", e)))?;

        if let Some(err) = parsed.error {
            return Err(SourceError::RpcError(format!("{} (code {})", err.message, err.code)));
        }

        parsed
            .result
            .ok_or_else(|| SourceError::InvalidResponse("Missing result field".to_string()))
    }
}

#[async_trait]
impl BalanceSource for EthRpcSource {
    async fn check_balance(
        &self,
        address: &str,
        token: &str,
        timeout: Duration,
    ) -> SourceResult<Decimal> {
        let request = self.build_request(address, token)?;

        let start = Instant::now();
        let result = self.post(&request.body, timeout).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_rpc_request(request.method, start.elapsed(), result.is_ok());
        }

        let raw = result?;
        let balance = scale_quantity(&raw, request.decimals)?;

        debug!(address = %address, token = %token, raw = %raw, balance = %balance, "Balance fetched");
        Ok(balance)
    }

    fn source_name(&self) -> &'static str {
        "eth_rpc"
    }
}

// =============================================================================
// Encoding helpers
// =============================================================================

/// `balanceOf(address)` calldata: selector followed by the 32-byte padded address
pub fn balance_of_calldata(address: &str) -> SourceResult<String> {
    let hex_part = address.trim_start_matches("0x");
    let bytes = hex::decode(hex_part)
        .map_err(|e| SourceError::InvalidResponse(format!("Bad address '{}': {}", address, e)))?;
    if bytes.len() != 20 {
        return Err(SourceError::InvalidResponse(format!(
            "Bad address '{}': expected 20 bytes, got {}",
            address,
            bytes.len()
        )));
    }

    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(format!("0x{}{}", BALANCE_OF_SELECTOR, hex::encode(word)))
}

/// Parse a hex quantity and scale it by `decimals` into a `Decimal`
pub fn scale_quantity(raw: &str, decimals: u32) -> SourceResult<Decimal> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| SourceError::InvalidResponse(format!("Result is not hex: {}", raw)))?;
    if digits.is_empty() {
        return Err(SourceError::InvalidResponse("Empty result (no contract at address?)".to_string()));
    }

    let value = U256::from_str_radix(digits, 16)
        .map_err(|e| SourceError::InvalidResponse(format!("Bad hex '{}': {:?}", raw, e)))?;

    if value > U256::from(i128::MAX as u128) {
        return Err(SourceError::InvalidResponse(format!("Balance too large: {}", value)));
    }
    let mantissa = value.as_u128() as i128;

    Decimal::try_from_i128_with_scale(mantissa, decimals)
        .map(|d| d.normalize())
        .map_err(|e| SourceError::InvalidResponse(format!("Balance {} not representable: {}", value, e)))
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(timeout.as_millis() as u64)
    } else {
        // Drop the URL: it may embed the provider API key
        SourceError::ConnectionError(e.without_url().to_string())
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

// =============================================================================
// Tests
// =============================================================================
