//! Robinhood REST API client.

use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use super::types::Page;
use crate::error::BrokerError;

/// Raw outcome of a form POST: status plus body text.
pub struct Submission {
    pub status: StatusCode,
    pub body: String,
}

/// Blocking Robinhood REST client with token authentication.
pub struct RobinhoodClient {
    client: Client,
    base_url: String,
    token: Zeroizing<String>,
}

impl RobinhoodClient {
    /// Create a client; `base_url` is trimmed of any trailing slash.
    pub fn new(
        base_url: &str,
        token: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/quotes/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BrokerError> {
        self.get_url(&self.url(path), query)
    }

    /// GET an absolute URL (used for `next` page links).
    pub fn get_url<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BrokerError> {
        debug!("GET {url} {query:?}");
        let resp = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", format!("Token {}", self.token.as_str()))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| BrokerError::Connection(format!("GET {url} failed: {e}")))?;

        let resp = check_status(resp, url)?;
        resp.json::<T>()
            .map_err(|e| BrokerError::Parse(format!("GET {url}: {e}")))
    }

    /// Follow `next` links and collect every page's results.
    pub fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, BrokerError> {
        let mut page: Page<T> = self.get(path, query)?;
        let mut items = std::mem::take(&mut page.results);
        while let Some(next) = page.next.take() {
            page = self.get_url(&next, &[])?;
            items.append(&mut page.results);
        }
        Ok(items)
    }

    /// POST a form. Non-success statuses other than auth failures are
    /// returned to the caller, which decides whether they are rejections.
    pub fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Submission, BrokerError> {
        let url = self.url(path);
        debug!("POST {url} {form:?}");
        let resp = self
            .client
            .post(&url)
            .form(form)
            .header("Authorization", format!("Token {}", self.token.as_str()))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| BrokerError::Order(format!("POST {url} failed: {e}")))?;

        let status = resp.status();
        if is_auth_failure(status) {
            return Err(BrokerError::Auth(format!("POST {url} returned {status}")));
        }
        let body = resp
            .text()
            .map_err(|e| BrokerError::Connection(format!("POST {url}: {e}")))?;
        Ok(Submission { status, body })
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn check_status(resp: Response, url: &str) -> Result<Response, BrokerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    if is_auth_failure(status) {
        Err(BrokerError::Auth(format!("{url} returned {status}")))
    } else {
        Err(BrokerError::Connection(format!("{url} returned {status}: {body}")))
    }
}
