// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signed REST client for the cloud open API.

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use super::session::Session;
use super::signer::{SIGN_METHOD, Signer};
use crate::config::CloudConfig;
use crate::error::{AuthError, Error, TransportError};

/// Token endpoint.
pub const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";

/// API error code for an invalid or expired token.
const CODE_TOKEN_INVALID: i64 = 1010;

// ============================================================================
// Wire types
// ============================================================================

/// Common response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

impl ApiEnvelope {
    fn message(&self) -> String {
        match (&self.msg, self.code) {
            (Some(msg), _) => msg.clone(),
            (None, Some(code)) => format!("error code {code}"),
            (None, None) => "unknown error".to_string(),
        }
    }

    fn is_auth_failure(&self) -> bool {
        if self.code == Some(CODE_TOKEN_INVALID) {
            return true;
        }
        self.msg.as_deref().is_some_and(|msg| {
            let lower = msg.to_ascii_lowercase();
            lower.contains("token") || lower.contains("auth")
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: String,
}

/// Outcome of one signed attempt.
enum Attempt {
    Success(serde_json::Value),
    Unauthorized(String),
}

// ============================================================================
// CloudClient
// ============================================================================

/// Signed HTTP client bound to one device.
///
/// Requests obtain a token on first use. A call refused for authorization
/// reasons clears the token and is retried once with a new one; a second
/// refusal is returned as [`AuthError::Unauthorized`].
///
/// # Examples
///
/// ```no_run
/// use tuyapump_lib::cloud::CloudClient;
/// use tuyapump_lib::config::CloudConfig;
///
/// # async fn example() -> tuyapump_lib::Result<()> {
/// let client = CloudClient::new(&CloudConfig::new("id", "secret", "device"))?;
/// let path = client.device_path("/v1.0/devices/{device_id}");
/// let info = client.get(&path).await?;
/// println!("{info}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CloudClient {
    http: Client,
    base_url: String,
    signer: Signer,
    session: Session,
    device_id: String,
}

impl CloudClient {
    /// Creates a client from the cloud configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for empty credentials or an
    /// empty device id, and a transport error if the HTTP client cannot be
    /// built.
    pub fn new(config: &CloudConfig) -> Result<Self, Error> {
        if config.device_id().is_empty() {
            return Err(Error::InvalidConfiguration(
                "device id must not be empty".to_string(),
            ));
        }
        let signer = Signer::new(config.access_id(), config.access_secret())?;
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            http,
            base_url: config.region().endpoint().to_string(),
            signer,
            session: Session::new(),
            device_id: config.device_id().to_string(),
        })
    }

    /// Returns the device id this client addresses.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the token session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Substitutes the URL-encoded device id for `{device_id}` in a path.
    #[must_use]
    pub fn device_path(&self, template: &str) -> String {
        template.replace("{device_id}", &urlencoding::encode(&self.device_id))
    }

    /// Returns the cached token or requests a new one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the token endpoint refuses the credentials,
    /// or a transport error if it cannot be reached.
    pub async fn ensure_token(&self) -> Result<String, Error> {
        self.session.ensure_token(|| self.request_token()).await
    }

    /// Issues a signed `GET` and returns the `result` payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Api`] when the API answers `success: false`
    /// for reasons other than authorization, and [`AuthError`] when
    /// authorization fails twice.
    pub async fn get(&self, path: &str) -> Result<serde_json::Value, Error> {
        self.call(Method::GET, path, None).await
    }

    /// Issues a signed `POST` with a JSON body and returns the `result` payload.
    ///
    /// # Errors
    ///
    /// Same as [`CloudClient::get`].
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let body = serde_json::to_string(body).map_err(TransportError::Json)?;
        self.call(Method::POST, path, Some(body)).await
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<serde_json::Value, Error> {
        let token = self.ensure_token().await?;
        match self.attempt(&method, path, body.as_deref(), &token).await? {
            Attempt::Success(result) => Ok(result),
            Attempt::Unauthorized(reason) => {
                tracing::debug!(path = %path, reason = %reason, "Authorization failed, retrying once");
                self.session.invalidate_if(&token).await;

                let token = self.ensure_token().await?;
                match self.attempt(&method, path, body.as_deref(), &token).await? {
                    Attempt::Success(result) => Ok(result),
                    Attempt::Unauthorized(reason) => {
                        self.session.invalidate_if(&token).await;
                        Err(AuthError::Unauthorized(reason).into())
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        path: &str,
        body: Option<&str>,
        token: &str,
    ) -> Result<Attempt, Error> {
        let response = self.send(method, path, body, Some(token)).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(status_error(status).into());
        }

        let text = response.text().await.map_err(TransportError::Http)?;
        tracing::debug!(path = %path, body = %text, "Received cloud response");
        let envelope: ApiEnvelope = serde_json::from_str(&text).map_err(TransportError::Json)?;

        if envelope.success {
            return Ok(Attempt::Success(
                envelope.result.unwrap_or(serde_json::Value::Null),
            ));
        }
        if envelope.is_auth_failure() {
            return Ok(Attempt::Unauthorized(envelope.message()));
        }
        Err(TransportError::Api(envelope.message()).into())
    }

    async fn request_token(&self) -> Result<String, Error> {
        tracing::debug!(device_id = %self.device_id, "Requesting access token");

        let response = self.send(&Method::GET, TOKEN_PATH, None, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenStatus(status.as_u16()).into());
        }

        let envelope: ApiEnvelope = response.json().await.map_err(TransportError::Http)?;
        if !envelope.success {
            return Err(AuthError::TokenRejected(envelope.message()).into());
        }

        let result = envelope
            .result
            .ok_or_else(|| AuthError::TokenRejected("response has no result".to_string()))?;
        let token: TokenResult = serde_json::from_value(result)
            .map_err(|_| AuthError::TokenRejected("response has no access token".to_string()))?;

        tracing::debug!("Access token acquired");
        Ok(token.access_token)
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        body: Option<&str>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, TransportError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let sign = self
            .signer
            .sign(method.as_str(), path, timestamp, token, body.unwrap_or(""));
        let url = format!("{}{path}", self.base_url);

        tracing::debug!(method = %method, url = %url, "Sending cloud request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("client_id", self.signer.access_id())
            .header("sign", sign)
            .header("t", timestamp.to_string())
            .header("sign_method", SIGN_METHOD);
        if let Some(token) = token {
            request = request.header("access_token", token);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        Ok(request.send().await?)
    }
}

fn status_error(status: StatusCode) -> TransportError {
    TransportError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;

    fn client() -> CloudClient {
        let config = CloudConfig::new("id", "secret", "dev/1")
            .with_region(Region::Custom("http://127.0.0.1:9".to_string()));
        CloudClient::new(&config).unwrap()
    }

    #[test]
    fn device_path_encodes_id() {
        assert_eq!(
            client().device_path("/v1.0/devices/{device_id}/commands"),
            "/v1.0/devices/dev%2F1/commands"
        );
    }

    #[test]
    fn rejects_empty_device_id() {
        let config = CloudConfig::new("id", "secret", "");
        assert!(matches!(
            CloudClient::new(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn envelope_auth_detection() {
        let env: ApiEnvelope =
            serde_json::from_str(r#"{"success": false, "msg": "token invalid", "code": 1010}"#)
                .unwrap();
        assert!(env.is_auth_failure());

        let env: ApiEnvelope =
            serde_json::from_str(r#"{"success": false, "msg": "Permission deny (AUTH)"}"#)
                .unwrap();
        assert!(env.is_auth_failure());

        let env: ApiEnvelope =
            serde_json::from_str(r#"{"success": false, "msg": "param is illegal"}"#).unwrap();
        assert!(!env.is_auth_failure());
        assert_eq!(env.message(), "param is illegal");
    }

    #[test]
    fn envelope_message_falls_back_to_code() {
        let env: ApiEnvelope = serde_json::from_str(r#"{"success": false, "code": 2008}"#).unwrap();
        assert_eq!(env.message(), "error code 2008");
    }

    #[test]
    fn status_error_reason() {
        let err = status_error(StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "HTTP 502 - Bad Gateway");
    }
}
