use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use crate::error::DeliveryError;

/// Path the collector accepts events on, appended to every cleaned target.
pub const COLLECTOR_EVENT_PATH: &str = "/services/collector/event";

/// Suffixes operators paste into target URLs, longest first. At most one is
/// stripped, so the event path above never gets doubled.
const COLLECTOR_SUFFIXES: &[&str] = &["/services/collector/event", "/services/collector"];

/// Collector responses longer than this are cut before they end up in an
/// outcome envelope.
const MAX_REPORTED_BODY: usize = 1024;

/// Removes one collector suffix from an operator-supplied target, if present.
pub fn clean_target_url(url: &str) -> &str {
    for suffix in COLLECTOR_SUFFIXES {
        if let Some(stripped) = url.strip_suffix(suffix) {
            return stripped;
        }
    }
    url
}

/// HTTP side of the forwarder. Both clients are built once at startup; the
/// trusting one accepts any certificate and is only picked for integrations
/// flagged `trustAll`.
pub struct HecClient {
    verifying: reqwest::Client,
    trusting: reqwest::Client,
}

impl HecClient {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            verifying: build_client(request_timeout, false)?,
            trusting: build_client(request_timeout, true)?,
        })
    }

    /// POSTs a delivery body to the collector event endpoint under `target`.
    /// Anything but a 2xx comes back as an error.
    pub async fn deliver(
        &self,
        target: &str,
        token: Option<&str>,
        trust_all: bool,
        body: String,
    ) -> Result<(), DeliveryError> {
        let url = Url::parse(&format!("{}{}", target, COLLECTOR_EVENT_PATH))?;

        let client = if trust_all {
            &self.trusting
        } else {
            &self.verifying
        };

        let mut request = client.post(url).body(body);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Splunk {token}"));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate(response.text().await.unwrap_or_default());
            return Err(DeliveryError::Status { status, body });
        }

        debug!("collector accepted delivery with {}", status);
        Ok(())
    }
}

fn build_client(
    request_timeout: Duration,
    trust_all: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .user_agent("splunk-forwarder")
        .timeout(request_timeout);
    if trust_all {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

fn truncate(text: String) -> String {
    if text.len() <= MAX_REPORTED_BODY {
        return text;
    }
    let mut end = MAX_REPORTED_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
