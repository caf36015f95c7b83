//! Garmin Connect API client for authenticated requests
//!
//! Requests carry the OAuth2 bearer token passed by the caller. Transient
//! failures can optionally be retried a bounded number of times.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::client::tokens::OAuth2Token;
use crate::error::{GarminError, Result};

/// User agent for Connect API requests
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Pause between retry attempts
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Garmin Connect API client
#[derive(Clone)]
pub struct GarminClient {
    client: Client,
    base_url: String,
    retries: u32,
    retry_delay: Duration,
}

impl GarminClient {
    /// Create a new API client for the given domain
    pub fn new(domain: &str) -> Result<Self> {
        Self::new_with_base_url(&format!("https://connectapi.{}", domain))
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(GarminError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: 0,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Retry transient failures up to `retries` extra times.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[doc(hidden)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_headers(&self, token: &OAuth2Token) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let bearer = HeaderValue::from_str(&token.authorization_header())
            .map_err(|e| GarminError::auth(format!("Unusable access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the response
    pub async fn get(&self, token: &OAuth2Token, path: &str) -> Result<Response> {
        let url = self.build_url(path);
        let mut attempt = 0;

        loop {
            let result = match self
                .client
                .get(&url)
                .headers(self.build_headers(token)?)
                .send()
                .await
            {
                Ok(response) => handle_response_status(response).await,
                Err(e) => Err(GarminError::Http(e)),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(path, attempt, error = %e, "retrying request");
                    tokio::time::sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    /// Make an authenticated GET request and deserialize JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, token: &OAuth2Token, path: &str) -> Result<T> {
        let response = self.get(token, path).await?;
        response.json().await.map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }
}

/// Convert status codes to errors
async fn handle_response_status(response: Response) -> Result<Response> {
    let status = response.status();

    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(GarminError::NotAuthenticated),
        StatusCode::TOO_MANY_REQUESTS => Err(GarminError::RateLimited),
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(GarminError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
