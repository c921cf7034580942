//! HTTP client for the GitHub REST API
//!
//! Covers the two activity feeds (created / received events) and the
//! billing usage endpoint.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::types::{BillingUsage, EventSource, RawEvent};

use super::EventFeed;

/// HTTP client for the GitHub REST API
pub struct GithubClient {
    http_client: Client,
    base_url: String,
    username: String,
}

impl GithubClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &GithubConfig, timeout_secs: u64) -> Result<Self> {
        config.validate()?;

        let base_url = config.api_url.trim_end_matches('/').to_string();
        let username = config.username.clone().unwrap_or_default();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        if let Some(token) = config.resolved_token() {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid token: {}", e)))?,
            );
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .user_agent(concat!("ghsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            username,
        })
    }

    /// Fetch one page of an activity feed.
    ///
    /// A 422 means the feed has no more pages; any 5xx is logged and also
    /// mapped to an empty page. Both tell the caller to stop paging, which
    /// makes true outages indistinguishable from legitimate exhaustion --
    /// a known limitation of the upstream contract.
    fn fetch_events(&self, feed: &str, page: u32, per_page: u32) -> Result<Vec<RawEvent>> {
        let url = format!("{}/users/{}/{}", self.base_url, self.username, feed);

        let response = self
            .http_client
            .get(&url)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();

        match triage_status(status) {
            PageDisposition::Exhausted => {
                // No more pages available for this feed
                tracing::debug!(feed, page, "Feed exhausted (422)");
                Ok(vec![])
            }
            PageDisposition::ServerError => {
                tracing::error!(feed, page, %status, "Server error, treating as empty page");
                Ok(vec![])
            }
            PageDisposition::Failed => {
                let body = response.text().unwrap_or_else(|_| "unknown".to_string());
                Err(Error::Transport(format!("API error ({}): {}", status, body)))
            }
            PageDisposition::Parse => response
                .json()
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e))),
        }
    }

    /// Fetch the account's Actions billing usage
    pub fn billing_usage(&self) -> Result<BillingUsage> {
        let url = format!(
            "{}/users/{}/settings/billing/actions",
            self.base_url, self.username
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Transport(format!("API error ({}): {}", status, body)));
        }

        response
            .json()
            .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))
    }
}

impl EventFeed for GithubClient {
    fn list_events(&self, source: EventSource, page: u32, per_page: u32) -> Result<Vec<RawEvent>> {
        let feed = match source {
            EventSource::Created => "events",
            EventSource::Received => "received_events",
        };
        self.fetch_events(feed, page, per_page)
    }
}

/// How a feed response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageDisposition {
    /// Success; parse the body as a page of events
    Parse,
    /// 422; the feed has no more pages
    Exhausted,
    /// 5xx; logged and read as an empty page
    ServerError,
    /// Any other non-success status; surfaces as a transport error
    Failed,
}

/// Classify one feed response status.
///
/// Both 422 and 5xx tell the caller to stop paging; see `fetch_events`.
fn triage_status(status: StatusCode) -> PageDisposition {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        PageDisposition::Exhausted
    } else if status.is_server_error() {
        PageDisposition::ServerError
    } else if status.is_success() {
        PageDisposition::Parse
    } else {
        PageDisposition::Failed
    }
}

/// Map a reqwest failure to the error taxonomy: deadline overruns surface
/// as a distinct `Timeout`, everything else as `Transport`.
fn map_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GithubConfig {
        GithubConfig {
            username: Some("octocat".to_string()),
            token: Some("ghp_test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_requires_valid_config() {
        let config = GithubConfig::default();
        assert!(GithubClient::new(&config, 10).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        assert!(GithubClient::new(&valid_config(), 10).is_ok());
    }

    #[test]
    fn test_triage_422_exhausts_feed() {
        assert_eq!(
            triage_status(StatusCode::UNPROCESSABLE_ENTITY),
            PageDisposition::Exhausted
        );
    }

    #[test]
    fn test_triage_server_errors_read_as_empty_page() {
        assert_eq!(
            triage_status(StatusCode::INTERNAL_SERVER_ERROR),
            PageDisposition::ServerError
        );
        assert_eq!(
            triage_status(StatusCode::BAD_GATEWAY),
            PageDisposition::ServerError
        );
        assert_eq!(
            triage_status(StatusCode::SERVICE_UNAVAILABLE),
            PageDisposition::ServerError
        );
    }

    #[test]
    fn test_triage_client_errors_fail() {
        assert_eq!(
            triage_status(StatusCode::UNAUTHORIZED),
            PageDisposition::Failed
        );
        assert_eq!(
            triage_status(StatusCode::FORBIDDEN),
            PageDisposition::Failed
        );
        assert_eq!(
            triage_status(StatusCode::NOT_FOUND),
            PageDisposition::Failed
        );
    }

    #[test]
    fn test_triage_success_parses() {
        assert_eq!(triage_status(StatusCode::OK), PageDisposition::Parse);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = GithubConfig {
            api_url: "https://api.github.com/".to_string(),
            ..valid_config()
        };
        let client = GithubClient::new(&config, 10).unwrap();
        assert_eq!(client.base_url, "https://api.github.com");
    }
}
