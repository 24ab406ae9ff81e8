//! Tile fetching from HTTP tile servers.
//!
//! # Architecture
//!
//! ```text
//!   get_tile miss
//!        │ enqueue (de-duplicated)
//!        ▼
//! ┌──────────────┐   next    ┌─────────────┐   GET    ┌─────────────┐
//! │ RequestQueue │ ────────▶ │ FetchWorker │ ───────▶ │ TileFetcher │
//! └──────────────┘           └──────┬──────┘          └─────────────┘
//!                                   │ FetchOutcome
//!                                   ▼
//!                             ┌──────────┐
//!                             │ Delivery │  (memory, disk, listener)
//!                             └──────────┘
//! ```
//!
//! Workers run `requests_per_server` per server and share one queue. The
//! [`TileFetcher`] trait is the seam tests use to replace HTTP.

mod http;
mod probe;
mod queue;
mod worker;

pub use http::{
    tile_url, Connector, HttpResponse, HttpSettings, ReqwestConnector, ReqwestFetcher,
    TileFetcher, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use probe::{probe, status_hint};
pub use queue::RequestQueue;
pub use worker::{fetch_tile, Delivery, FetchOutcome, FetchWorker, WorkerContext, WorkerPool};
