// Command/status HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction and the status
// code mapping of the command API. The event stream uses a second client
// without a whole-request timeout (see `TransportConfig`).

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    CommandAccepted, CommandRequest, CommandStatus, ErrorBody, HealthStatus,
};
use crate::sse::{EventStream, event_stream};
use crate::transport::TransportConfig;

/// Raw HTTP client for the device's command API.
///
/// Every method issues exactly one request; retry and reconnection policy
/// live in `botlink-core`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://robot.local:8000` or
    /// `https://gateway/api/robot`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_stream_client()?,
            base_url,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`, used for both
    /// request/response calls and the event stream.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            stream_http: http.clone(),
            http,
            base_url,
        }
    }

    /// The API root this client targets.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{path}`, preserving any path prefix in the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Build `{base}/status/{request_id}` with the id percent-encoded as a
    /// single path segment.
    pub(crate) fn status_url(&self, request_id: &str) -> Result<Url, Error> {
        let mut url = self.endpoint("status")?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(request_id);
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /command`.
    ///
    /// 200/202 → accepted, 400 → [`Error::InvalidRequest`],
    /// 409 → [`Error::Busy`], anything else → [`Error::Server`].
    pub async fn submit_command(&self, request: &CommandRequest) -> Result<CommandAccepted, Error> {
        let url = self.endpoint("command")?;
        debug!("POST {}", url);

        let resp = self.http.post(url).json(request).send().await?;
        let status = resp.status();

        match status {
            StatusCode::OK | StatusCode::ACCEPTED => parse_json(resp).await,
            StatusCode::BAD_REQUEST => Err(Error::InvalidRequest {
                message: error_message(resp).await,
            }),
            StatusCode::CONFLICT => Err(Error::Busy {
                message: error_message(resp).await,
            }),
            _ => Err(Error::Server {
                status: status.as_u16(),
                message: error_message(resp).await,
            }),
        }
    }

    /// `GET /status/{request_id}`.
    ///
    /// 404 maps to [`Error::NotFound`]; callers polling a fresh or expired
    /// id are expected to ignore it.
    pub async fn command_status(&self, request_id: &str) -> Result<CommandStatus, Error> {
        let url = self.status_url(request_id)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                request_id: request_id.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(Error::Server {
                status: status.as_u16(),
                message: error_message(resp).await,
            });
        }
        parse_json(resp).await
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let url = self.endpoint("health")?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Server {
                status: status.as_u16(),
                message: error_message(resp).await,
            });
        }
        parse_json(resp).await
    }

    /// Open `GET /events` and return the decoded event stream.
    ///
    /// Resolves once the response headers arrive with a success status;
    /// any failure up to that point is an [`Error::StreamConnect`].
    pub async fn open_event_stream(&self) -> Result<EventStream, Error> {
        let url = self.endpoint("events")?;
        debug!("GET {} (stream)", url);

        let resp = self
            .stream_http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::StreamConnect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::StreamConnect(format!("HTTP {status}")));
        }

        Ok(event_stream(resp))
    }
}

// ── Response helpers ─────────────────────────────────────────────────

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) if !body.trim().is_empty() => ErrorBody::message_from(&body),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_owned(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let api = client("https://gateway.local/api/robot/");
        assert_eq!(
            api.endpoint("command").unwrap().as_str(),
            "https://gateway.local/api/robot/command"
        );
    }

    #[test]
    fn status_url_encodes_request_id() {
        let api = client("http://robot.local:8000");
        assert_eq!(
            api.status_url("a b/c").unwrap().as_str(),
            "http://robot.local:8000/status/a%20b%2Fc"
        );
    }
}
