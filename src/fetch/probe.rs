//! Startup connectivity probe.
//!
//! Before any worker starts, a network source fetches tile `(0, 0, 0)` from
//! its first server. The outcome decides which fetcher the workers use:
//!
//! ```text
//! direct GET ──ok──────────────────────────────▶ direct fetcher
//!     │
//!     ├─HTTP error status──────────────────────▶ ServerStatus (fatal)
//!     │
//!     └─transport error─┬─no proxy─────────────▶ Unreachable (fatal)
//!                       │
//!                       └─proxy GET ──ok───────▶ proxied fetcher
//!                                   └─error────▶ ProxyFailed (fatal)
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{FetchError, TileSourceError};
use crate::tile::TileKey;

use super::http::{tile_url, Connector, TileFetcher};

/// Explanation appended to a fatal status error.
pub fn status_hint(status: u16) -> &'static str {
    match status {
        401 => "Looks like you need to be authorised for this server.",
        403 => "The tile server refused access; check its usage policy and the User-Agent.",
        404 => "You might need to check the tile addressing for this server.",
        429 => "You are asking for too many tiles.",
        500..=599 => "The tile server reported an internal error; try again later.",
        _ => "The tile server rejected the probe request.",
    }
}

/// Probe the first server and return the fetcher workers should use.
pub async fn probe(
    connector: &dyn Connector,
    server: &str,
    url_path: &str,
    http_proxy: Option<&str>,
) -> Result<Arc<dyn TileFetcher>, TileSourceError> {
    let url = tile_url(server, url_path, &TileKey::new(0, 0, 0));
    let direct = connector.connect(None)?;

    let message = match direct.get(&url).await {
        Ok(response) if response.is_success() => {
            info!(%url, "tile server reachable");
            return Ok(direct);
        }
        Ok(response) => {
            return Err(TileSourceError::ServerStatus {
                status: response.status,
                url,
                hint: status_hint(response.status).to_string(),
            })
        }
        Err(FetchError::Transport(message)) => message,
        Err(other) => other.to_string(),
    };

    let Some(proxy) = http_proxy else {
        return Err(TileSourceError::Unreachable { url, message });
    };

    warn!(%url, %proxy, error = %message, "direct probe failed, retrying through proxy");
    let proxied = connector.connect(Some(proxy))?;
    match proxied.get(&url).await {
        Ok(response) if response.is_success() => {
            info!(%url, %proxy, "tile server reachable through proxy");
            Ok(proxied)
        }
        Ok(response) => Err(TileSourceError::ProxyFailed {
            proxy: proxy.to_string(),
            url,
            message: format!("HTTP {}", response.status),
        }),
        Err(e) => Err(TileSourceError::ProxyFailed {
            proxy: proxy.to_string(),
            url,
            message: e.to_string(),
        }),
    }
}
