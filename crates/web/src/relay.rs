use reqwest::multipart::Form;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Actions understood by the relay endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    WebSearch,
    SendEmail,
    Scrape,
    TestConnection,
}

impl RelayAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayAction::WebSearch => "websearch",
            RelayAction::SendEmail => "sendEmail",
            RelayAction::Scrape => "scrape",
            RelayAction::TestConnection => "testConnection",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or insecure relay URL. No request was attempted.
    #[error("Relay configuration error: {0}")]
    Config(String),

    #[error("Relay returned HTTP status {0}")]
    Status(u16),

    /// `success: false` envelope; displays the relay's own message
    #[error("{message}")]
    Rejected { code: Option<i64>, message: String },

    #[error("Relay network error: {0}")]
    Network(String),

    #[error("Invalid relay response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// One ranked search hit, field names as sent by the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSearchResult {
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub enlace: String,
    #[serde(default)]
    pub descripcion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchResults {
    #[serde(default)]
    pub count: usize,
    /// Absent results are treated like an empty list
    #[serde(default)]
    pub results: Vec<WebSearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(default)]
    message: String,
}

pub struct RelayClient {
    http_client: Client,
    relay_url: String,
    allow_plain_http: bool,
}

impl RelayClient {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            relay_url: relay_url.into(),
            allow_plain_http: false,
        }
    }

    /// Accept `http://` relay URLs, e.g. a relay running on localhost.
    pub fn allow_plain_http(mut self) -> Self {
        self.allow_plain_http = true;
        self
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    fn endpoint(&self) -> Result<Url, RelayError> {
        let raw = self.relay_url.trim();
        if raw.is_empty() {
            return Err(RelayError::Config("relay URL is not configured".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| RelayError::Config(format!("invalid relay URL '{raw}': {e}")))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_plain_http => Ok(url),
            scheme => Err(RelayError::Config(format!(
                "relay URL must use https, got '{scheme}'"
            ))),
        }
    }

    /// Posts `action` and `params` as multipart form fields and unwraps the
    /// `{success, data, error}` envelope. Returns `data` unchanged.
    pub async fn call(
        &self,
        action: RelayAction,
        params: &[(&str, String)],
    ) -> Result<Value, RelayError> {
        let url = self.endpoint()?;

        let form = params
            .iter()
            .fold(Form::new().text("action", action.as_str()), |form, (key, value)| {
                form.text(key.to_string(), value.clone())
            });

        debug!("Calling relay action '{}'", action.as_str());

        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            let error = envelope.error.unwrap_or(EnvelopeError {
                code: None,
                message: None,
            });
            return Err(RelayError::Rejected {
                code: error.code,
                message: error
                    .message
                    .unwrap_or_else(|| "Unknown relay error".to_string()),
            });
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }

    pub async fn web_search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<SearchResults, RelayError> {
        let data = self
            .call(
                RelayAction::WebSearch,
                &[
                    ("query", query.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;

        if data.is_null() {
            return Ok(SearchResults::default());
        }
        decode(data)
    }

    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, RelayError> {
        let data = self
            .call(RelayAction::Scrape, &[("url", url.to_string())])
            .await?;
        decode(data)
    }

    /// Returns the relay's confirmation message
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, RelayError> {
        let data = self
            .call(
                RelayAction::SendEmail,
                &[
                    ("to", to.to_string()),
                    ("subject", subject.to_string()),
                    ("body", body.to_string()),
                ],
            )
            .await?;
        decode::<MessageData>(data).map(|data| data.message)
    }

    pub async fn test_connection(&self) -> Result<String, RelayError> {
        let data = self.call(RelayAction::TestConnection, &[]).await?;
        decode::<MessageData>(data).map(|data| data.message)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, RelayError> {
    serde_json::from_value(data).map_err(|e| RelayError::InvalidResponse(e.to_string()))
}
