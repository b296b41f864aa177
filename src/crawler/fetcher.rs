//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for gene pages
//! - Form-encoded POSTs for picker data and genotype pages
//! - Error classification

use crate::config::UserAgentConfig;
use crate::stages::CrawlRequest;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the response body
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Response body
        body: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Formats the user agent string sent with every request
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pharmgkb_harvest::config::UserAgentConfig;
/// use pharmgkb_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "PharmgkbHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Turns a request descriptor into a reqwest builder
///
/// Descriptors with form fields are posted form-encoded; the rest are GETs.
fn build_request(client: &Client, request: &CrawlRequest) -> RequestBuilder {
    if request.is_form_post() {
        client.post(&request.url).form(&request.form)
    } else {
        client.get(&request.url)
    }
}

/// Fetches one request descriptor
///
/// Failures are returned as values. A non-success status becomes
/// [`FetchResult::HttpError`]; connection, timeout and body read failures
/// become [`FetchResult::NetworkError`].
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `request` - The descriptor to fetch
pub async fn fetch(client: &Client, request: &CrawlRequest) -> FetchResult {
    let response = match build_request(client, request).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}

fn classify_error(e: &reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}
