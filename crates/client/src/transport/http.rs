//! GraphQL over HTTP: one POST per query or mutation.

use async_trait::async_trait;
use reqwest::Client;
use relieflink_shared::{GraphQLResponse, Operation, TransportError};
use url::Url;

use super::EphemeralChannel;
use crate::runtime;

/// HTTP channel for one-shot operations.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: Client,
    endpoint: Url,
    timeout_ms: u64,
}

impl HttpChannel {
    pub fn new(endpoint: Url, timeout_ms: u64) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            timeout_ms,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, operation: &Operation) -> Result<GraphQLResponse, TransportError> {
        let body = serde_json::to_vec(&operation.to_request())
            .map_err(|e| TransportError::Deserialize(e.to_string()))?;

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {e}")))?;

        decode_body(status, is_success, &text)
    }
}

/// Turn a raw HTTP exchange into a GraphQL result.
///
/// Non-2xx responses are transport failures even when they carry a GraphQL
/// body; a 2xx body must decode as a GraphQL response.
pub(crate) fn decode_body(
    status: u16,
    is_success: bool,
    text: &str,
) -> Result<GraphQLResponse, TransportError> {
    if !is_success {
        return Err(TransportError::Http {
            status,
            body: text.to_string(),
        });
    }
    serde_json::from_str(text).map_err(|e| TransportError::Deserialize(e.to_string()))
}

#[async_trait(?Send)]
impl EphemeralChannel for HttpChannel {
    async fn execute(&self, operation: &Operation) -> Result<GraphQLResponse, TransportError> {
        crate::log_debug!("POST {} ({} {})", self.endpoint, operation.kind(), operation.name());
        match runtime::timeout(self.timeout_ms, self.post(operation)).await {
            Some(result) => result,
            None => Err(TransportError::Timeout(self.timeout_ms)),
        }
    }
}
