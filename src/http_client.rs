use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::{Client, Response, StatusCode};

use crate::error::ApiError;

const USER_AGENT: &str = "match-insight/0.1";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide client. The timeout of the first caller wins.
pub fn http_client(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}

/// Read a response body, mapping non-success statuses into [`ApiError`].
pub async fn read_body(resp: Response) -> Result<String, ApiError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: snippet(&body),
        });
    }
    Ok(body)
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(220)
        .collect()
}
