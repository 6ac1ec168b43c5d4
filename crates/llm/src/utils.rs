use crate::ApiError;
use reqwest::{RequestBuilder, Response};

/// Sends the request, mapping transport failures to `ApiError::Network`.
pub async fn send_request(request: RequestBuilder) -> Result<Response, ApiError> {
    request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))
}

/// Check the response status before any streaming starts.
/// Returns the response if successful, or a provider error carrying the status.
pub async fn check_response_error(
    provider: &'static str,
    response: Response,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .ok()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    Err(ApiError::Provider {
        provider,
        status: status.as_u16(),
        message,
    })
}

/// Fails fast when a required credential or URL is missing.
pub fn require_setting<'a>(value: &'a str, what: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ApiError::Config(format!("{what} is not configured")))
    } else {
        Ok(value)
    }
}
