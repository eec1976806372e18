/// HTTP transport used to push readings to the collector
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Result of one POST. Transports never fail across this boundary; errors are reported
/// in the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub ok: bool,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl TransportResponse {
    /// The collector could not be reached at all
    pub fn unreachable(error: impl ToString) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, payload: String, headers: &[(String, String)])
        -> TransportResponse;
}

/// `reqwest` backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        payload: String,
        headers: &[(String, String)],
    ) -> TransportResponse {
        let mut request = self.client.post(url).body(payload);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return TransportResponse::unreachable(e),
        };

        let status = response.status();
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        TransportResponse {
            ok: status.is_success(),
            status: Some(status.as_u16()),
            body,
            error: None,
        }
    }
}
