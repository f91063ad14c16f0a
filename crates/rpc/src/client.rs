//! Minimal JSON-RPC 2.0 client over HTTP

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

use crate::{RpcError, RpcResult};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client shared by every endpoint
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(timeout: Duration) -> RpcResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method` on `url` and decode the `result` member
    pub async fn call<T: DeserializeOwned>(&self, url: &str, method: &str, params: Value) -> RpcResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(%url, method, id, "JSON-RPC request");

        let body: Value = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        decode(body)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> RpcResult<T> {
    let envelope: Envelope<T> = serde_json::from_value(body)?;
    if let Some(error) = envelope.error {
        return Err(RpcError::Call(format!("{} (code {})", error.message, error.code)));
    }
    envelope
        .result
        .ok_or_else(|| RpcError::InvalidResponse("response has neither result nor error".to_string()))
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(value: &str) -> RpcResult<u128> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| RpcError::InvalidResponse(format!("not a hex quantity: {}", value)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("bad hex quantity {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x3b9aca00").unwrap(), 1_000_000_000);
        assert!(parse_quantity("1234").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_decode_error_object() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}});
        match decode::<String>(body) {
            Err(RpcError::Call(message)) => assert!(message.contains("Method not found")),
            other => panic!("unexpected result: {:?}", other),
        }

        let body = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(decode::<String>(body), Err(RpcError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_call_posts_json_rpc_request() {
        let (addr, request) = serve_once(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#).await;
        let client = JsonRpcClient::new(Duration::from_secs(5)).unwrap();

        let result: String = client
            .call(&format!("http://{}", addr), "eth_gasPrice", json!([]))
            .await
            .unwrap();

        assert_eq!(result, "0x10");
        let request = request.await.unwrap();
        assert!(request.starts_with("POST / HTTP/1.1"));
        assert!(request.contains(r#""method":"eth_gasPrice""#));
    }
}
