//! Authenticated JSON transport shared by the vendor adapters.
//!
//! Owns the bearer credential, extracts a readable message from each vendor's
//! error body and scrubs credential material before anything leaves this
//! module as an error.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::ProviderError;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error bodies longer than this are truncated when no structured message
/// could be extracted.
const MAX_RAW_ERROR_LEN: usize = 200;

const REDACTED: &str = "[REDACTED]";

static CREDENTIAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)authorization\s*[:=]\s*(bearer\s+)?[^\s,;]+").unwrap(),
        Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").unwrap(),
    ]
});

/// JSON shape a vendor uses for error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorShape {
    /// `{"message": "..."}` (DigitalOcean).
    MessageField,
    /// `{"error": {"message": "..."}}` (Hetzner).
    ErrorObject,
    /// `{"error": "..."}` (Vultr).
    ErrorString,
    /// `{"errors": [{"reason": "..."}]}` (Linode).
    ReasonArray,
}

/// Pull a human readable message out of a vendor error body.
#[must_use]
pub fn extract_error_message(shape: ErrorShape, body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let message = match shape {
        ErrorShape::MessageField => json.get("message")?.as_str()?.to_string(),
        ErrorShape::ErrorObject => json.get("error")?.get("message")?.as_str()?.to_string(),
        ErrorShape::ErrorString => json.get("error")?.as_str()?.to_string(),
        ErrorShape::ReasonArray => {
            let reasons: Vec<&str> = json
                .get("errors")?
                .as_array()?
                .iter()
                .filter_map(|e| e.get("reason").and_then(Value::as_str))
                .collect();
            if reasons.is_empty() {
                return None;
            }
            reasons.join("; ")
        }
    };
    let message = message.trim().to_string();
    (!message.is_empty()).then_some(message)
}

/// Remove the bearer token and any authorization header text from a message.
#[must_use]
pub fn scrub(message: &str, token: Option<&str>) -> String {
    let mut cleaned = match token {
        Some(t) if !t.is_empty() => message.replace(t, REDACTED),
        _ => message.to_string(),
    };
    for pattern in CREDENTIAL_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, REDACTED).into_owned();
    }
    cleaned
}

/// HTTP client bound to one vendor base URL and (optionally) one credential.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    shape: ErrorShape,
    vendor: &'static str,
}

impl ApiClient {
    /// Build a client for `base_url`.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(
        vendor: &'static str,
        base_url: impl Into<String>,
        token: Option<String>,
        shape: ErrorShape,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Http(e.without_url().to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            shape,
            vendor,
        })
    }

    /// Whether a credential was supplied.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(self.vendor.to_string()))?;
        Ok(builder.bearer_auth(token))
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        ProviderError::Http(scrub(&err.without_url().to_string(), self.token.as_deref()))
    }

    /// Make an authenticated GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let response = self
            .authorized(self.client.get(&url))?
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Make an authenticated POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(url = %url, "POST request");

        let response = self
            .authorized(self.client.post(&url))?
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.handle_response(response).await
    }

    /// Make an authenticated POST request whose response body is ignored.
    pub async fn post_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ProviderError> {
        let url = self.url(path);
        debug!(url = %url, "POST request (empty response)");

        let response = self
            .authorized(self.client.post(&url))?
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.error_from(status, response).await)
        }
    }

    /// Make an authenticated DELETE request. A 404 counts as already deleted.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let url = self.url(path);
        debug!(url = %url, "DELETE request");

        let response = self
            .authorized(self.client.delete(&url))?
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.error_from(status, response).await)
        }
    }

    /// GET `path` with an arbitrary credential and report whether it succeeded.
    pub async fn check_token(&self, path: &str, token: &str) -> bool {
        let url = self.url(path);
        debug!(url = %url, "Token check");

        match self.client.get(&url).bearer_auth(token).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                let error = scrub(&e.without_url().to_string(), Some(token));
                debug!(error = %error, "Token check failed");
                false
            }
        }
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from(status, response).await);
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(vendor = self.vendor, error = %e, "Failed to parse response");
            ProviderError::Serialization(e)
        })
    }

    async fn error_from(&self, status: StatusCode, response: reqwest::Response) -> ProviderError {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(self.shape, &body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.chars().take(MAX_RAW_ERROR_LEN).collect()
            }
        });
        let message = scrub(&message, self.token.as_deref());

        if status == StatusCode::NOT_FOUND {
            ProviderError::NotFound(message)
        } else {
            ProviderError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_each_shape() {
        assert_eq!(
            extract_error_message(
                ErrorShape::MessageField,
                r#"{"id":"unprocessable_entity","message":"Name is taken"}"#
            ),
            Some("Name is taken".to_string())
        );
        assert_eq!(
            extract_error_message(
                ErrorShape::ErrorObject,
                r#"{"error":{"code":"uniqueness_error","message":"server name is already used"}}"#
            ),
            Some("server name is already used".to_string())
        );
        assert_eq!(
            extract_error_message(
                ErrorShape::ErrorString,
                r#"{"error":"Plan is not available","status":400}"#
            ),
            Some("Plan is not available".to_string())
        );
        assert_eq!(
            extract_error_message(
                ErrorShape::ReasonArray,
                r#"{"errors":[{"field":"label","reason":"Label must be unique"},{"reason":"second"}]}"#
            ),
            Some("Label must be unique; second".to_string())
        );
    }

    #[test]
    fn test_extraction_rejects_wrong_shape() {
        assert_eq!(
            extract_error_message(ErrorShape::ErrorString, r#"{"error":{"message":"x"}}"#),
            None
        );
        assert_eq!(extract_error_message(ErrorShape::ReasonArray, r#"{"errors":[]}"#), None);
        assert_eq!(
            extract_error_message(ErrorShape::MessageField, "<html>bad gateway</html>"),
            None
        );
    }

    #[test]
    fn test_scrub_removes_token_and_headers() {
        let token = "dop_v1_abcdef123456";
        let msg = format!("request failed: Authorization: Bearer {token}; token={token}");
        let cleaned = scrub(&msg, Some(token));
        assert!(!cleaned.contains(token));
        assert!(!cleaned.to_lowercase().contains("bearer dop"));
        assert!(cleaned.contains(REDACTED));
    }

    #[test]
    fn test_scrub_without_token_still_strips_bearer() {
        let cleaned = scrub("header was bearer sk-live-999", None);
        assert_eq!(cleaned, format!("header was {REDACTED}"));
    }

    #[test]
    fn test_empty_token_is_treated_as_missing() {
        let client = ApiClient::new(
            "test",
            "http://localhost/",
            Some("  ".into()),
            ErrorShape::MessageField,
        )
        .unwrap();
        assert!(!client.has_token());
        assert_eq!(client.url("/x"), "http://localhost/x");
    }
}
