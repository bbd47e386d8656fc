use std::{io::Write, time::Duration};

use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use http::header;
use prost::Message;

use crate::proto;

const TRACES_PATH: &str = "/api/ingress/traces";

#[derive(Debug, thiserror::Error)]
pub enum SendReportError {
    #[error("could not compress the report: {0}")]
    Compression(#[from] std::io::Error),
    #[error("could not reach the usage reporting ingress: {0}")]
    Network(#[from] reqwest::Error),
    #[error("usage reporting ingress failed with status {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("usage reporting ingress rejected the report with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl SendReportError {
    /// Network failures and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendReportError::Network(_) | SendReportError::ServerError { .. })
    }
}

/// What the ingress answered to a delivered report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// The graph only accepts statistics, traces are dropped by the ingress.
    pub traces_ignored: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngressResponse {
    #[serde(default)]
    traces_ignored: bool,
}

pub struct ReportSender {
    client: reqwest::Client,
    url: String,
    api_key: String,
    max_attempts: usize,
    minimum_retry_delay: Duration,
}

impl ReportSender {
    pub fn new(
        endpoint_url: &str,
        api_key: String,
        request_timeout: Duration,
        max_attempts: usize,
        minimum_retry_delay: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(ReportSender {
            client,
            url: format!("{}{TRACES_PATH}", endpoint_url.trim_end_matches('/')),
            api_key,
            max_attempts: max_attempts.max(1),
            minimum_retry_delay,
        })
    }

    pub async fn send(&self, report: &proto::Report) -> Result<Delivery, SendReportError> {
        let body = Bytes::from(compress(&report.encode_to_vec())?);

        again::RetryPolicy::exponential(self.minimum_retry_delay)
            .with_max_retries(self.max_attempts - 1)
            .with_jitter(false)
            .retry_if(|| self.post(body.clone()), |error: &SendReportError| {
                let retry = error.is_retryable();
                if retry {
                    tracing::debug!("retrying report delivery: {error}");
                }
                retry
            })
            .await
    }

    async fn post(&self, body: Bytes) -> Result<Delivery, SendReportError> {
        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/protobuf")
            .header(header::CONTENT_ENCODING, "gzip")
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, crate::AGENT_VERSION)
            .header("x-api-key", &self.api_key)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status.is_server_error() {
            return Err(SendReportError::ServerError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if !status.is_success() {
            return Err(SendReportError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        // Older ingresses answer with an empty or plain text body.
        let response: IngressResponse = serde_json::from_slice(&body).unwrap_or_default();

        Ok(Delivery {
            traces_ignored: response.traces_ignored,
        })
    }
}

pub(crate) fn compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}
