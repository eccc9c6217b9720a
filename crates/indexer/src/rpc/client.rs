use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

use common::error::{IndexerError, NetworkError};

/// Status recorded when a failed call produced no HTTP response
pub const SENTINEL_STATUS: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    Timeout,
    NotFound,
    Transport,
    ServerError,
    /// 2xx response whose body or `result` could not be used
    InvalidResponse,
}

#[derive(Debug, Error)]
#[error("{method} failed ({kind:?}): {message}")]
pub struct RpcError {
    pub method: String,
    pub kind: RpcErrorKind,
    /// HTTP status of the response, when one was received
    pub status: Option<u16>,
    pub message: String,
}

impl IndexerError for RpcError {}

impl RpcError {
    fn new(
        method: &str,
        kind: RpcErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method: method.to_string(),
            kind,
            status,
            message: message.into(),
        }
    }

    fn from_reqwest(method: &str, error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());
        let kind = if error.is_timeout() {
            RpcErrorKind::Timeout
        } else if status.is_some() {
            RpcErrorKind::ServerError
        } else {
            RpcErrorKind::Transport
        };
        Self::new(method, kind, status, error.to_string())
    }

    /// Status code to record for a failed call
    pub fn status_or_sentinel(&self) -> u16 {
        self.status.unwrap_or(SENTINEL_STATUS)
    }
}

/// Successful JSON-RPC exchange
#[derive(Debug, Clone)]
pub struct JsonRpcResponse {
    pub status: u16,
    pub result: Value,
    /// Time from sending the request to decoding the body
    pub elapsed: Duration,
}

/// Outcome of an `eth_blockNumber` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeight {
    pub number: u64,
    pub status: u16,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::connection_failed("json-rpc client", e))?;
        Ok(Self { http })
    }

    /// POST `{"jsonrpc":"2.0","method":<method>,"id":1}` to `url`
    pub async fn call(&self, url: &str, method: &str) -> Result<JsonRpcResponse, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "id": 1,
        });

        let start = Instant::now();
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(method, e))?;

        let status = response.status();
        if !status.is_success() {
            let kind = if status == StatusCode::NOT_FOUND {
                RpcErrorKind::NotFound
            } else {
                RpcErrorKind::ServerError
            };
            return Err(RpcError::new(
                method,
                kind,
                Some(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }

        let payload: Value = response.json().await.map_err(|e| {
            let kind = if e.is_timeout() {
                RpcErrorKind::Timeout
            } else {
                RpcErrorKind::InvalidResponse
            };
            RpcError::new(method, kind, Some(status.as_u16()), e.to_string())
        })?;
        let elapsed = start.elapsed();

        let Some(result) = payload.get("result").cloned() else {
            let detail = payload
                .get("error")
                .map(|e| e.to_string())
                .unwrap_or_else(|| "response has no result".to_string());
            return Err(RpcError::new(
                method,
                RpcErrorKind::InvalidResponse,
                Some(status.as_u16()),
                detail,
            ));
        };

        Ok(JsonRpcResponse {
            status: status.as_u16(),
            result,
            elapsed,
        })
    }

    pub async fn block_number(&self, url: &str) -> Result<BlockHeight, RpcError> {
        const METHOD: &str = "eth_blockNumber";
        let response = self.call(url, METHOD).await?;
        let number = parse_hex_quantity(&response.result).ok_or_else(|| {
            RpcError::new(
                METHOD,
                RpcErrorKind::InvalidResponse,
                Some(response.status),
                format!("not a hex quantity: {}", response.result),
            )
        })?;
        Ok(BlockHeight {
            number,
            status: response.status,
            elapsed: response.elapsed,
        })
    }

    pub async fn syncing(&self, url: &str) -> Result<bool, RpcError> {
        let response = self.call(url, "eth_syncing").await?;
        Ok(json_truthy(&response.result))
    }
}

/// Decode an Ethereum hex quantity such as `"0x1b4"`
pub fn parse_hex_quantity(value: &Value) -> Option<u64> {
    let text = value.as_str()?.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// JSON truthiness: `null`, `false`, `0` and `""` are false
pub fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> JsonRpcClient {
        JsonRpcClient::new(Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity(&json!("0x1b4")), Some(436));
        assert_eq!(parse_hex_quantity(&json!("0x0")), Some(0));
        assert_eq!(parse_hex_quantity(&json!("ff")), Some(255));
        assert_eq!(parse_hex_quantity(&json!("0x")), None);
        assert_eq!(parse_hex_quantity(&json!("0xzz")), None);
        assert_eq!(parse_hex_quantity(&json!(12)), None);
        assert_eq!(parse_hex_quantity(&Value::Null), None);
    }

    #[test]
    fn test_json_truthy() {
        assert!(!json_truthy(&Value::Null));
        assert!(!json_truthy(&json!(false)));
        assert!(!json_truthy(&json!(0)));
        assert!(!json_truthy(&json!("")));
        assert!(json_truthy(&json!(true)));
        assert!(json_truthy(&json!({"currentBlock": "0x1"})));
        assert!(json_truthy(&json!([])));
    }

    #[tokio::test]
    async fn test_block_number_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(json!({"jsonrpc":"2.0","method":"eth_blockNumber","id":1})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc":"2.0","id":1,"result":"0x10"})),
            )
            .mount(&server)
            .await;

        let height = client().block_number(&server.uri()).await.unwrap();
        assert_eq!(height.number, 16);
        assert_eq!(height.status, 200);
    }

    #[tokio::test]
    async fn test_not_found_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client().call(&server.uri(), "eth_syncing").await.unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::NotFound);
        assert_eq!(err.status_or_sentinel(), 404);
    }

    #[tokio::test]
    async fn test_server_error_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client().call(&server.uri(), "eth_syncing").await.unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::ServerError);
        assert_eq!(err.status, Some(503));
    }

    #[tokio::test]
    async fn test_timeout_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result":"0x1"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client().call(&server.uri(), "eth_blockNumber").await.unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::Timeout);
        assert_eq!(err.status_or_sentinel(), SENTINEL_STATUS);
    }

    #[tokio::test]
    async fn test_transport_failure_uses_sentinel() {
        let err = client()
            .call("http://127.0.0.1:1", "eth_blockNumber")
            .await
            .unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::Transport);
        assert_eq!(err.status_or_sentinel(), 500);
    }

    #[tokio::test]
    async fn test_error_object_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}),
            ))
            .mount(&server)
            .await;

        let err = client().syncing(&server.uri()).await.unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::InvalidResponse);
        assert_eq!(err.status, Some(200));
    }
}
