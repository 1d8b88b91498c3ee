//! HTTP client wrapper for the portal and its download endpoints.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::constants::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, HEAD_TIMEOUT};
use super::error::DownloadError;

/// HTTP client shared by the crawler and the downloader.
///
/// Created once and reused so connections are pooled. Transparent gzip
/// decoding is left off: byte offsets must refer to the bytes on disk for
/// range resumes to line up.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeout and User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    /// Creates a client with an explicit timeout and User-Agent.
    ///
    /// The timeout bounds connecting and each read, not the whole transfer,
    /// so large archives are not cut off.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self { client })
    }

    /// Best-effort HEAD probe for the resource length.
    ///
    /// Any failure (network, non-success status, missing or unparsable
    /// header) yields `None`.
    #[instrument(level = "debug", skip(self))]
    pub async fn head_content_length(&self, url: &str) -> Option<u64> {
        let response = match self.client.head(url).timeout(HEAD_TIMEOUT).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "HEAD probe failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "HEAD probe rejected");
            return None;
        }
        header_content_length(&response)
    }

    /// Sends a GET, optionally asking for bytes from `range_start` onward.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`]/[`DownloadError::Timeout`] on
    /// transport failure and [`DownloadError::HttpStatus`] for any status
    /// other than 2xx.
    pub async fn get(
        &self,
        url: &str,
        range_start: Option<u64>,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut request = self.client.get(url);
        if let Some(offset) = range_start.filter(|offset| *offset > 0) {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get`], plus network errors while reading the body.
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.get(url, None).await?;
        response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }
}

/// Parses the `Content-Length` header, if present.
pub(crate) fn header_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Total resource length implied by a GET response.
///
/// For 206 responses the header counts only the remaining bytes, so the
/// resume offset is added back.
pub(crate) fn derive_total_content_length(
    response: &reqwest::Response,
    existing_bytes: u64,
) -> Option<u64> {
    let current = header_content_length(response);
    if response.status() == StatusCode::PARTIAL_CONTENT {
        current.map(|remaining| existing_bytes.saturating_add(remaining))
    } else {
        current
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_head_content_length_reads_header() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/a.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 42]))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let len = client
            .head_content_length(&format!("{}/a.json", server.uri()))
            .await;
        assert_eq!(len, Some(42));
    }

    #[tokio::test]
    async fn test_head_content_length_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        assert_eq!(
            client
                .head_content_length(&format!("{}/a.json", server.uri()))
                .await,
            None
        );
        assert_eq!(client.head_content_length("not a url").await, None);
    }

    #[tokio::test]
    async fn test_get_sends_range_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.zip"))
            .and(header("range", "bytes=5-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"tail".to_vec()))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client
            .get(&format!("{}/a.zip", server.uri()), Some(5))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(derive_total_content_length(&response, 5), Some(9));
    }

    #[tokio::test]
    async fn test_get_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let error = client
            .get(&format!("{}/missing.json", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            DownloadError::HttpStatus { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_get_text_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .get_text(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }
}
