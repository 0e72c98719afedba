//! EVM JSON-RPC adapter for read-only contract calls.
//!
//! Used for the `symbol()` fallback when no API knows a token, and for the
//! `token0()`/`token1()` probes that identify Uniswap-V2-compatible pools.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use signal_core::SignalError;

const DEFAULT_RPC_URL: &str = "https://eth.llamarpc.com";

// 4-byte function selectors.
const SELECTOR_SYMBOL: &str = "0x95d89b41";
const SELECTOR_TOKEN0: &str = "0x0dfe1681";
const SELECTOR_TOKEN1: &str = "0xd21220a7";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct EvmRpcClient {
    client: Client,
    rpc_url: String,
}

impl EvmRpcClient {
    pub fn new() -> Self {
        Self::with_rpc_url(DEFAULT_RPC_URL)
    }

    pub fn with_rpc_url(rpc_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            rpc_url: rpc_url.into(),
        }
    }

    async fn eth_call(&self, to: &str, data: &str) -> Result<Option<Vec<u8>>, SignalError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{"to": to, "data": data}, "latest"],
            "id": 1,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        if body.error.is_some() {
            return Ok(None);
        }

        let Some(result) = body.result else {
            return Ok(None);
        };
        let stripped = result.strip_prefix("0x").unwrap_or(&result);
        if stripped.is_empty() {
            return Ok(None);
        }
        let bytes = hex::decode(stripped).map_err(|e| SignalError::Decode(e.to_string()))?;
        Ok(Some(bytes))
    }

    /// Read the ERC-20 `symbol()`. Handles both ABI-encoded strings and the
    /// legacy bytes32 encoding some older tokens use.
    pub async fn read_symbol(&self, address: &str) -> Result<Option<String>, SignalError> {
        let Some(bytes) = self.eth_call(address, SELECTOR_SYMBOL).await? else {
            return Ok(None);
        };
        Ok(decode_abi_string(&bytes))
    }

    /// `token0()` on a suspected Uniswap-V2 pool contract.
    pub async fn token0(&self, address: &str) -> Result<Option<String>, SignalError> {
        let Some(bytes) = self.eth_call(address, SELECTOR_TOKEN0).await? else {
            return Ok(None);
        };
        Ok(decode_abi_address(&bytes))
    }

    /// `token1()` on a suspected Uniswap-V2 pool contract.
    pub async fn token1(&self, address: &str) -> Result<Option<String>, SignalError> {
        let Some(bytes) = self.eth_call(address, SELECTOR_TOKEN1).await? else {
            return Ok(None);
        };
        Ok(decode_abi_address(&bytes))
    }
}

impl Default for EvmRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a single 32-byte return word as an address (last 20 bytes).
fn decode_abi_address(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 32 {
        return None;
    }
    // A valid address word has 12 leading zero bytes.
    if bytes[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let addr = &bytes[12..32];
    if addr.iter().all(|b| *b == 0) {
        return None;
    }
    Some(format!("0x{}", hex::encode(addr)))
}

/// Decode an ABI-encoded `string` return value, falling back to a
/// null-padded bytes32 interpretation.
fn decode_abi_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() >= 64 {
        // Dynamic string: word 0 = offset, word at offset = length.
        let offset = u64::from_be_bytes(bytes[24..32].try_into().ok()?) as usize;
        if offset + 32 <= bytes.len() {
            let len = u64::from_be_bytes(bytes[offset + 24..offset + 32].try_into().ok()?) as usize;
            let start = offset + 32;
            if start + len <= bytes.len() {
                let s = String::from_utf8_lossy(&bytes[start..start + len]);
                let trimmed = s.trim_matches(char::from(0)).trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_uppercase());
                }
            }
        }
    }

    if bytes.len() == 32 {
        let s = String::from_utf8_lossy(bytes);
        let trimmed = s.trim_matches(char::from(0)).trim().to_string();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_graphic()) {
            return Some(trimmed.to_uppercase());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_address_word() {
        let mut word = vec![0u8; 32];
        word[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(
            decode_abi_address(&word),
            Some(format!("0x{}", "ab".repeat(20)))
        );

        // Garbage in the high bytes is not an address.
        let mut junk = vec![0u8; 32];
        junk[0] = 1;
        junk[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(decode_abi_address(&junk), None);

        assert_eq!(decode_abi_address(&[0u8; 32]), None);
        assert_eq!(decode_abi_address(&[0u8; 31]), None);
    }

    #[test]
    fn decodes_dynamic_string() {
        // offset = 32, length = 4, "WETH"
        let mut bytes = vec![0u8; 96];
        bytes[31] = 32;
        bytes[63] = 4;
        bytes[64..68].copy_from_slice(b"WETH");
        assert_eq!(decode_abi_string(&bytes), Some("WETH".to_string()));
    }

    #[test]
    fn decodes_bytes32_symbol() {
        let mut bytes = vec![0u8; 32];
        bytes[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_abi_string(&bytes), Some("MKR".to_string()));
    }
}
