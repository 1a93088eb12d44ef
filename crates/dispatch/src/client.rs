//! Delivery client for the external webhook endpoint.
//!
//! One call is one HTTP POST of `{"to", "content"}`. The response is
//! classified into [`DeliveryOutcome`]; retry decisions belong to the
//! [`DeliveryUnit`](crate::unit::DeliveryUnit), never to the client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use herald_core::Message;

/// Errors that make a delivery attempt fail without a usable response.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no response headers within {0:?}")]
    HeaderTimeout(Duration),

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Payload posted to the delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRequest {
    pub to: String,
    pub content: String,
}

impl DeliveryRequest {
    pub fn for_message(message: &Message) -> Self {
        Self {
            to: message.phone_number.clone(),
            content: message.content.clone(),
        }
    }
}

/// Classified response of a single delivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 200, 201 or 202 with a parseable body. `message_id` is the endpoint's
    /// correlation id, `None` when absent or empty.
    Accepted { message_id: Option<String> },
    /// Any other status.
    Rejected { status: u16 },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    #[serde(default)]
    message_id: Option<String>,
}

/// Decodes only the leading JSON value; anything after it is ignored and a
/// `null` counts as a body without an id. An empty body is malformed.
fn first_accepted_body(body: &[u8]) -> Result<AcceptedBody, DeliveryError> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<Option<AcceptedBody>>()
        .next()
        .ok_or_else(|| DeliveryError::MalformedBody("empty response body".to_string()))?
        .map(Option::unwrap_or_default)
        .map_err(|e| DeliveryError::MalformedBody(e.to_string()))
}

/// A transport able to hand one message to the delivery endpoint.
#[async_trait::async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError>;
}

/// Timeouts and pooling limits of [`HttpDeliveryClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Whole request, body included.
    pub total: Duration,
    /// TCP connect plus TLS handshake.
    pub connect: Duration,
    /// Wait for the status line and headers.
    pub response_header: Duration,
    /// How long an idle pooled connection is kept.
    pub pool_idle: Duration,
    pub max_idle_per_host: usize,
}

impl ClientTimeouts {
    /// Defaults for a scheduler polling every `send_interval`: idle
    /// connections survive one full interval.
    pub fn for_interval(send_interval: Duration) -> Self {
        Self {
            total: Duration::from_secs(10),
            connect: Duration::from_secs(5),
            response_header: Duration::from_secs(5),
            pool_idle: send_interval + Duration::from_secs(30),
            max_idle_per_host: 2,
        }
    }
}

/// Posts JSON to a single configured webhook URL over a pooled client.
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    url: reqwest::Url,
    response_header: Duration,
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    pub fn new(url: &str, timeouts: ClientTimeouts) -> Result<Self, DeliveryError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| DeliveryError::Config(format!("invalid webhook url {url:?}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeouts.total)
            .connect_timeout(timeouts.connect)
            .pool_idle_timeout(timeouts.pool_idle)
            .pool_max_idle_per_host(timeouts.max_idle_per_host)
            .build()?;

        Ok(Self {
            url,
            response_header: timeouts.response_header,
            client,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

fn is_accepted(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
    )
}

#[async_trait::async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError> {
        let send = self.client.post(self.url.clone()).json(request).send();
        let response = tokio::time::timeout(self.response_header, send)
            .await
            .map_err(|_| DeliveryError::HeaderTimeout(self.response_header))??;

        let status = response.status();
        if !is_accepted(status) {
            // Drain so the connection can go back to the pool.
            let _ = response.bytes().await;
            tracing::warn!(url = %self.url, %status, "delivery endpoint rejected message");
            return Ok(DeliveryOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed = first_accepted_body(&body)?;

        tracing::debug!(url = %self.url, %status, "delivery endpoint accepted message");

        Ok(DeliveryOutcome::Accepted {
            message_id: parsed.message_id.filter(|id| !id.is_empty()),
        })
    }
}
