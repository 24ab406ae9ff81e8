//! Background fetch workers.
//!
//! Each worker is a tokio task bound to one server. It loops forever taking
//! requests from the shared [`RequestQueue`], fetching the tile and handing
//! the outcome to a [`Delivery`] sink. A failed fetch is never fatal to the
//! worker.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::tile::{TileFormat, TileImage, TileKey};

use super::http::{tile_url, TileFetcher};
use super::queue::RequestQueue;

/// Result of fetching one tile.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Tile decoded; `data` holds the bytes as served
    Fetched { image: TileImage, data: Bytes },
    /// Fetch or decode failed
    Failed { error: FetchError },
}

/// Receives fetch outcomes from workers.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, key: TileKey, outcome: FetchOutcome);
}

/// Fetch a single tile and validate it.
///
/// The response must be a success status carrying `format`'s content type,
/// and its body must decode as an image.
pub async fn fetch_tile(
    fetcher: &dyn TileFetcher,
    url: &str,
    format: TileFormat,
) -> Result<(TileImage, Bytes), FetchError> {
    let response = fetcher.get(url).await?;

    if !response.is_success() {
        return Err(FetchError::Status {
            status: response.status,
            url: url.to_string(),
        });
    }

    let expected = format.content_type();
    match response.mime_type() {
        Some(actual) if actual == expected => {}
        actual => {
            return Err(FetchError::ContentType {
                expected: expected.to_string(),
                actual: actual.unwrap_or_else(|| "none".to_string()),
            })
        }
    }

    let image = TileImage::decode(format, &response.body)?;
    Ok((image, response.body))
}

// =============================================================================
// Worker
// =============================================================================

/// State shared by all workers of one source.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<RequestQueue>,
    pub fetcher: Arc<dyn TileFetcher>,
    pub url_path: Arc<str>,
    pub format: TileFormat,
    pub delivery: Arc<dyn Delivery>,
}

/// One fetch worker bound to a server.
pub struct FetchWorker {
    id: usize,
    server: String,
    ctx: WorkerContext,
}

impl FetchWorker {
    pub fn new(id: usize, server: impl Into<String>, ctx: WorkerContext) -> Self {
        Self {
            id,
            server: server.into(),
            ctx,
        }
    }

    /// Run until the task is aborted.
    pub async fn run(self) {
        debug!(worker = self.id, server = %self.server, "fetch worker started");
        loop {
            let key = self.ctx.queue.next().await;
            let url = tile_url(&self.server, &self.ctx.url_path, &key);

            let outcome = match fetch_tile(self.ctx.fetcher.as_ref(), &url, self.ctx.format).await
            {
                Ok((image, data)) => {
                    debug!(worker = self.id, %key, bytes = data.len(), "tile fetched");
                    FetchOutcome::Fetched { image, data }
                }
                Err(error) => {
                    warn!(worker = self.id, %key, %url, error = %error, "tile fetch failed");
                    FetchOutcome::Failed { error }
                }
            };

            self.ctx.delivery.deliver(key, outcome).await;
        }
    }
}

// =============================================================================
// Pool
// =============================================================================

/// The set of running workers for one source.
///
/// Dropping the pool aborts every worker.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `per_server` workers for each server.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(servers: &[String], per_server: usize, ctx: WorkerContext) -> Self {
        let mut handles = Vec::with_capacity(servers.len() * per_server);
        for server in servers {
            for _ in 0..per_server {
                let worker = FetchWorker::new(handles.len(), server.clone(), ctx.clone());
                handles.push(tokio::spawn(worker.run()));
            }
        }
        debug!(workers = handles.len(), "fetch workers spawned");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort all workers. In-flight fetches are abandoned.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
