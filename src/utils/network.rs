//! Network utilities and helpers

use reqwest::{Client, Response};
use std::time::Duration;

use crate::core::models::{AppError, AppResult};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an `AppError::Api` message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Get user agent string
pub fn get_user_agent() -> String {
    format!("{}/{}", crate::NAME, crate::VERSION)
}

pub fn build_client(user_agent: &str, timeout: Duration) -> AppResult<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()?)
}

/// Turns a non-success response into `AppError::Api` carrying a trimmed body
pub async fn ensure_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::Api {
        status: status.as_u16(),
        message: api_error_message(&body)
            .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect()),
    })
}

/// `error.message` of a Google-style JSON error body
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
