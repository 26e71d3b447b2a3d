// Shared transport configuration for building reqwest::Client instances.
//
// Request/response calls and the long-lived event stream need different
// timeout behaviour but the same auth headers, so both clients are built
// from one config here.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

const USER_AGENT: &str = concat!("botlink/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout for request/response calls.
    pub timeout: Duration,
    /// TCP/TLS connect timeout, applied to both clients.
    pub connect_timeout: Duration,
    /// Bearer token sent as `Authorization` on every request.
    pub token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            token: None,
        }
    }
}

impl TransportConfig {
    /// Build the `reqwest::Client` used for command and status calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .default_headers(self.default_headers()?)
            .build()
            .map_err(Error::Transport)
    }

    /// Build the client used for the SSE stream.
    ///
    /// No whole-request timeout: the response body is expected to stay
    /// open indefinitely. Only the connect phase is bounded.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .default_headers(self.default_headers()?)
            .build()
            .map_err(Error::Transport)
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn default_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::InvalidHeader(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn token_becomes_sensitive_bearer_header() {
        let config = TransportConfig::default().with_token(SecretString::from("s3cret"));
        let headers = config.default_headers().unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer s3cret");
    }

    #[test]
    fn no_token_means_no_auth_header() {
        let headers = TransportConfig::default().default_headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn control_characters_in_token_are_rejected() {
        let config = TransportConfig::default().with_token(SecretString::from("bad\ntoken"));
        assert!(matches!(
            config.default_headers(),
            Err(Error::InvalidHeader(_))
        ));
    }
}
