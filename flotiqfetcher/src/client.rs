use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::{FlotiqError, Result};
use crate::models::ContentObject;
use crate::params::SyncOptions;

pub const AUTH_HEADER: &str = "X-AUTH-TOKEN";

/// Header set sent with every API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHeaders {
    pairs: Vec<(String, String)>,
}

impl ApiHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Builds the outbound header set. An empty token is passed through as is.
pub fn create_headers(options: &SyncOptions) -> ApiHeaders {
    ApiHeaders {
        pairs: vec![
            ("accept".to_string(), "application/json".to_string()),
            (AUTH_HEADER.to_string(), options.auth_token.clone()),
        ],
    }
}

/// Percent-encodes a query component the way browsers' `encodeURIComponent` does.
pub fn encode_component(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Performs GET requests. The seam between the engine and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &ApiHeaders, timeout: Duration) -> Result<RawResponse>;
}

#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &ApiHeaders, timeout: Duration) -> Result<RawResponse> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers.iter() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    header_map.insert(name, value);
                }
                _ => log::warn!("Dropping header '{}' with an invalid value", name),
            }
        }

        let response = self
            .http_client
            .get(url)
            .headers(header_map)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    FlotiqError::Timeout(url.to_string())
                } else {
                    FlotiqError::Http(err)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(RawResponse { status, body })
    }
}

/// Client for the Flotiq REST API, bound to one base URL and token.
#[derive(Clone)]
pub struct FlotiqClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    headers: ApiHeaders,
    timeout: Duration,
}

impl FlotiqClient {
    pub fn new(options: &SyncOptions, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: options.api_base().to_string(),
            headers: create_headers(options),
            timeout: options.request_timeout(),
        }
    }

    pub fn with_default_transport(options: &SyncOptions) -> Self {
        Self::new(options, Arc::new(ReqwestTransport::new()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn content_types_url(&self, hide_internal: bool) -> String {
        let mut url = format!(
            "{}/api/v1/internal/contenttype?limit=10000&order_by=label",
            self.base_url
        );
        if hide_internal {
            url.push_str("&internal=false");
        }
        url
    }

    /// Page URL without the `page` parameter; callers append `&page={n}`.
    pub fn content_url_prefix(&self, content_type: &str, limit: u64, since: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/v1/content/{}?limit={}",
            self.base_url, content_type, limit
        );
        if let Some(since) = since {
            let filters = serde_json::json!({
                "internal.updatedAt": {
                    "type": "greaterThan",
                    "filter": since
                }
            });
            url.push_str("&filters=");
            url.push_str(&encode_component(&filters.to_string()));
        }
        url
    }

    pub fn removed_url(&self, content_type: &str, since: &str) -> String {
        format!(
            "{}/api/v1/content/{}/removed?deletedAfter={}",
            self.base_url,
            content_type,
            encode_component(since)
        )
    }

    pub fn data_url(&self, data_url: &str) -> String {
        format!("{}{}", self.base_url, data_url)
    }

    /// Raw GET; status handling is up to the caller.
    pub async fn get(&self, url: &str) -> Result<RawResponse> {
        self.transport.get(url, &self.headers, self.timeout).await
    }

    /// GET that maps any non-2xx status to [`FlotiqError::Api`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(FlotiqError::Api {
                status: response.status,
                body: response.body,
            });
        }
        response.json()
    }

    /// Fetches a single object by its `dataUrl` pointer.
    pub async fn fetch_object(&self, data_url: &str) -> Result<ContentObject> {
        self.get_json(&self.data_url(data_url)).await
    }
}
