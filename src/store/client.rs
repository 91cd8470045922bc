//! REST client for the unit/participant directory service

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// Upper bound for one directory request
pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated client for the directory API
#[derive(Clone)]
pub struct DirectoryClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl DirectoryClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| DirectoryError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(DIRECTORY_TIMEOUT)
            .build()
            .map_err(DirectoryError::Request)?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Resource URL with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a single resource; 404 maps to `Ok(None)`
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Option<T>, DirectoryError> {
        let mut request = self
            .client
            .get(self.url(segments))
            .query(query)
            .header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(DirectoryError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map(Some).map_err(DirectoryError::Parse)
    }
}

/// Directory API errors
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Invalid directory URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_escaped() {
        let client = DirectoryClient::new("http://dir.local/api/", None).unwrap();
        assert_eq!(
            client.url(&["units", "stolen?owner=1#"]).as_str(),
            "http://dir.local/api/units/stolen%3Fowner=1%23"
        );
        assert_eq!(
            client.url(&["units", "../admin/x"]).as_str(),
            "http://dir.local/api/units/..%2Fadmin%2Fx"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            DirectoryClient::new("not a url", None),
            Err(DirectoryError::InvalidUrl(_))
        ));
        assert!(matches!(
            DirectoryClient::new("mailto:dir@example.com", None),
            Err(DirectoryError::InvalidUrl(_))
        ));
    }
}
