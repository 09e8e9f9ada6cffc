use std::fs;
use std::io;
use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::HttpConfig;
use crate::error::HarvestError;

pub trait HttpTransport: Send + Sync {
    /// Lightweight existence check. Transient failures degrade to `false`
    /// after the bounded retries are exhausted.
    fn exists(&self, url: &str) -> Result<bool, HarvestError>;
    fn get_text(&self, url: &str) -> Result<Option<String>, HarvestError>;
    fn get_json(&self, url: &str) -> Result<Option<Value>, HarvestError>;
    /// Downloads `url` to `destination`, replacing any existing file.
    /// Returns `false` when the remote resource is absent.
    fn download(&self, url: &str, destination: &Utf8Path) -> Result<bool, HarvestError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    max_retries: usize,
}

impl ReqwestTransport {
    pub fn new(config: HttpConfig) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("af-harvester/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .map_err(|err| HarvestError::Http(err.to_string()))?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<Option<reqwest::blocking::Response>, HarvestError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if is_retryable_status(status) {
                        if attempt < self.max_retries {
                            let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                            thread::sleep(Duration::from_millis(delay));
                            attempt += 1;
                            continue;
                        }
                        tracing::warn!(url = %resp.url(), status, "retries exhausted");
                        return Ok(None);
                    }
                    return Ok(Some(resp));
                }
                Err(err) => {
                    if is_retryable_error(&err) {
                        if attempt < self.max_retries {
                            let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                            thread::sleep(Duration::from_millis(delay));
                            attempt += 1;
                            continue;
                        }
                        tracing::warn!(error = %err, "retries exhausted");
                        return Ok(None);
                    }
                    return Err(HarvestError::Http(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<Option<reqwest::blocking::Response>, HarvestError> {
        if response.status().is_success() {
            return Ok(Some(response));
        }
        if is_absent_status(response.status()) {
            return Ok(None);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(HarvestError::HttpStatus { status, message })
    }
}

impl HttpTransport for ReqwestTransport {
    fn exists(&self, url: &str) -> Result<bool, HarvestError> {
        let Some(response) = self.send_with_retries(|| self.client.head(url))? else {
            return Ok(false);
        };
        if response.status().is_success() {
            return Ok(true);
        }
        if !is_absent_status(response.status()) {
            tracing::debug!(url, status = response.status().as_u16(), "probe rejected");
        }
        Ok(false)
    }

    fn get_text(&self, url: &str) -> Result<Option<String>, HarvestError> {
        let Some(response) = self.send_with_retries(|| self.client.get(url))? else {
            return Ok(None);
        };
        let Some(response) = Self::handle_status(response)? else {
            return Ok(None);
        };
        let text = response
            .text()
            .map_err(|err| HarvestError::Http(err.to_string()))?;
        Ok(Some(text))
    }

    fn get_json(&self, url: &str) -> Result<Option<Value>, HarvestError> {
        let Some(response) = self.send_with_retries(|| self.client.get(url))? else {
            return Ok(None);
        };
        let Some(response) = Self::handle_status(response)? else {
            return Ok(None);
        };
        let value: Value = response
            .json()
            .map_err(|err| HarvestError::MalformedResponse(err.to_string()))?;
        Ok(Some(value))
    }

    fn download(&self, url: &str, destination: &Utf8Path) -> Result<bool, HarvestError> {
        let Some(mut response) = self.send_with_retries(|| self.client.get(url))? else {
            return Ok(false);
        };
        if !response.status().is_success() {
            if !is_absent_status(response.status()) {
                tracing::warn!(url, status = response.status().as_u16(), "download rejected");
            }
            return Ok(false);
        }
        let parent = destination
            .parent()
            .ok_or_else(|| HarvestError::Filesystem("invalid destination path".to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".af-harvest")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| HarvestError::Http(err.to_string()))?;
        if destination.as_std_path().exists() {
            fs::remove_file(destination.as_std_path())
                .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        temp.persist(destination.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(true)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn is_absent_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
}
