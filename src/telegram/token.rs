//! Live identity check of a user-supplied bot token (Bot API `getMe`)

use serde::Deserialize;
use thiserror::Error;

use crate::core::config;

/// Identity of the bot a token belongs to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenCheckError {
    /// Telegram answered `ok: false`
    #[error("{0}")]
    Rejected(String),

    /// No usable answer (network failure, garbage body)
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Deserialize)]
struct GetMeResponse {
    ok: bool,
    #[serde(default)]
    result: Option<BotIdentity>,
    #[serde(default)]
    description: Option<String>,
}

/// Client used for token checks, with the short check timeout
pub fn client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config::network::token_check_timeout())
        .build()
}

/// Calls `<api_url>/bot<token>/getMe`; accepts the token only on `ok: true`.
///
/// Error statuses (401 for a revoked token) still carry the JSON body with
/// a `description`, so the status code itself is not inspected.
pub async fn check_token(client: &reqwest::Client, api_url: &str, token: &str) -> Result<BotIdentity, TokenCheckError> {
    let url = format!("{}/bot{}/getMe", api_url.trim_end_matches('/'), token.trim());

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| TokenCheckError::Network(e.without_url().to_string()))?;
    let status = response.status();
    let body: GetMeResponse = response
        .json()
        .await
        .map_err(|_| TokenCheckError::Network(format!("unexpected response ({})", status)))?;

    match (body.ok, body.result) {
        (true, Some(identity)) => Ok(identity),
        (true, None) => Err(TokenCheckError::Network("getMe returned no bot".to_string())),
        (false, _) => Err(TokenCheckError::Rejected(
            body.description.unwrap_or_else(|| "Ошибка".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123456:ABC/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 123456, "is_bot": true, "first_name": "Test", "username": "test_bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = check_token(&client().unwrap(), &server.uri(), " 123456:ABC ").await.unwrap();
        assert_eq!(identity.id, 123456);
        assert_eq!(identity.username.as_deref(), Some("test_bot"));
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot1:bad/getMe"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = check_token(&client().unwrap(), &server.uri(), "1:bad").await.unwrap_err();
        assert_eq!(err, TokenCheckError::Rejected("Unauthorized".to_string()));
    }

    #[tokio::test]
    async fn test_garbage_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = check_token(&client().unwrap(), &server.uri(), "1:x").await.unwrap_err();
        assert!(matches!(err, TokenCheckError::Network(_)));
    }
}
