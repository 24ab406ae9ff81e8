//! HTTP access for tile fetching.
//!
//! Workers and the startup probe talk to tile servers through the
//! [`TileFetcher`] trait, and a [`Connector`] builds fetchers either direct
//! or through a proxy. [`ReqwestFetcher`] is the production implementation;
//! tests substitute in-memory fetchers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::error::{FetchError, TileSourceError};
use crate::tile::TileKey;

/// Default User-Agent sent when the configuration does not name one.
pub const DEFAULT_USER_AGENT: &str = concat!("slipmap-tiles/", env!("CARGO_PKG_VERSION"));

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Responses
// =============================================================================

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw `Content-Type` header, if present
    pub content_type: Option<String>,

    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Media type without parameters, lower-cased (`image/png; q=1` → `image/png`).
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
    }
}

// =============================================================================
// Fetcher seam
// =============================================================================

/// Performs HTTP GET requests for tiles.
///
/// Implementations must be cheap to share between workers.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// GET `url`. Non-success statuses are returned as responses, not errors;
    /// `Err` means the exchange itself failed.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Builds fetchers, optionally routed through an HTTP proxy.
pub trait Connector: Send + Sync {
    fn connect(&self, proxy: Option<&str>) -> Result<Arc<dyn TileFetcher>, TileSourceError>;
}

/// Settings shared by every request a source makes.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// =============================================================================
// reqwest implementation
// =============================================================================

/// [`TileFetcher`] backed by a `reqwest` client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client from settings, optionally through `proxy`.
    pub fn new(settings: &HttpSettings, proxy: Option<&str>) -> Result<Self, TileSourceError> {
        let user_agent = settings
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let builder = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(user_agent);

        // Only the configured proxy is used, never the environment's
        let builder = match proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
                    TileSourceError::Client(format!("invalid proxy '{}': {}", proxy, e))
                })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| TileSourceError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {}", e)))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// [`Connector`] producing [`ReqwestFetcher`]s.
#[derive(Debug, Clone, Default)]
pub struct ReqwestConnector {
    settings: HttpSettings,
}

impl ReqwestConnector {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl Connector for ReqwestConnector {
    fn connect(&self, proxy: Option<&str>) -> Result<Arc<dyn TileFetcher>, TileSourceError> {
        Ok(Arc::new(ReqwestFetcher::new(&self.settings, proxy)?))
    }
}

// =============================================================================
// URL templates
// =============================================================================

/// Build a tile URL from a server and a `{Z}/{X}/{Y}` path template.
pub fn tile_url(server: &str, url_path: &str, key: &TileKey) -> String {
    let path = url_path
        .replace("{Z}", &key.level.to_string())
        .replace("{X}", &key.x.to_string())
        .replace("{Y}", &key.y.to_string());
    format!("{}{}", server.trim_end_matches('/'), path)
}
