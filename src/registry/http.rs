//! HTTP transport for registry calls
//!
//! Each call is a `POST` of `{"method": ..., "params": [...]}` to the
//! registry URI. The reply is a `[statusCode, message, value]` envelope.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{RegistryClient, RegistryError, RegistryHandle, SUCCESS_CODE};
use crate::{Error, Result};

/// Code reported for replies that could not be decoded at all
const MALFORMED_REPLY_CODE: i64 = -1;

/// Caller identity sent with liveness calls
const CALLER_ID: &str = "/rlaunch";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: Vec<Value>,
}

/// Registry client speaking the JSON envelope protocol over HTTP
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    endpoint: Option<Url>,
    client: reqwest::Client,
}

impl HttpRegistryClient {
    /// Create a client for `handle` with a per-call timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(handle: &RegistryHandle, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build registry client: {e}")))?;

        Ok(Self {
            endpoint: handle.url().cloned(),
            client,
        })
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> std::result::Result<Value, RegistryError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(RegistryError::Unreachable(
                "no registry uri configured".to_string(),
            ));
        };

        tracing::trace!(%endpoint, method, "registry call");

        let response = self
            .client
            .post(endpoint.clone())
            .json(&RpcRequest { method, params })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Protocol {
                code: MALFORMED_REPLY_CODE,
                message: format!("HTTP {status}"),
            });
        }

        let (code, message, value): (i64, String, Value) =
            response.json().await.map_err(|e| RegistryError::Protocol {
                code: MALFORMED_REPLY_CODE,
                message: format!("malformed reply: {e}"),
            })?;

        if code == SUCCESS_CODE {
            Ok(value)
        } else {
            Err(RegistryError::Protocol { code, message })
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn get_value(
        &self,
        namespace: &str,
        key: &str,
    ) -> std::result::Result<Value, RegistryError> {
        self.call(
            "getParam",
            vec![Value::from(namespace), Value::from(key)],
        )
        .await
    }

    async fn ping(&self) -> std::result::Result<u32, RegistryError> {
        let value = self.call("getPid", vec![Value::from(CALLER_ID)]).await?;
        value
            .as_u64()
            .and_then(|pid| u32::try_from(pid).ok())
            .ok_or_else(|| RegistryError::Protocol {
                code: MALFORMED_REPLY_CODE,
                message: format!("getPid returned a non-pid value: {value}"),
            })
    }
}

fn classify_transport_error(e: reqwest::Error) -> RegistryError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        RegistryError::Unreachable(e.to_string())
    } else {
        RegistryError::Protocol {
            code: MALFORMED_REPLY_CODE,
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn client_for(uri: &str) -> HttpRegistryClient {
        let handle = RegistryHandle::parse(uri).unwrap();
        HttpRegistryClient::new(&handle, Duration::from_secs(2)).unwrap()
    }

    /// URI of a local port with nothing listening on it
    fn dead_uri() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn get_value_returns_value_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "method": "getParam",
                "params": ["/rlaunch", "/run_id"],
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"[1, "Parameter [/run_id]", "abc-123"]"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let value = client.get_value("/rlaunch", "/run_id").await.unwrap();

        assert_eq!(value, json!("abc-123"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_code_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"[-1, "Parameter [/run_id] is not set", 0]"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.get_value("/rlaunch", "/run_id").await.unwrap_err();

        assert_eq!(
            err,
            RegistryError::Protocol {
                code: -1,
                message: "Parameter [/run_id] is not set".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn http_failure_status_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.get_value("/rlaunch", "/run_id").await.unwrap_err();
        assert!(!err.is_unreachable(), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_envelope_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.get_value("/rlaunch", "/run_id").await.unwrap_err();
        assert!(matches!(err, RegistryError::Protocol { code: -1, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let client = client_for(&dead_uri());
        let err = client.get_value("/rlaunch", "/run_id").await.unwrap_err();
        assert!(err.is_unreachable(), "{err:?}");
        assert!(!client.is_reachable().await);
    }

    #[tokio::test]
    async fn unset_handle_is_unreachable() {
        let client = HttpRegistryClient::new(&RegistryHandle::unset(), Duration::from_secs(1))
            .unwrap();
        let err = client.ping().await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn ping_parses_pid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getPid" })))
            .with_header("content-type", "application/json")
            .with_body(r#"[1, "", 4242]"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        assert_eq!(client.ping().await, Ok(4242));
        assert!(client.is_reachable().await);
    }
}
