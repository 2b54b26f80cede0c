//! # Host Bridge Traits
//!
//! Abstractions the sync engine depends on without knowing which service or
//! platform sits behind them.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for the token file
//!
//! ### Services
//! - [`MediaServer`](media::MediaServer) - Library listing and collection writes
//! - [`WatchlistSource`](watchlist::WatchlistSource) - Remote list retrieval
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Service
//! connectors convert their own error enums into it so the engine can tell an
//! authentication refusal apart from an unexpected status or a transport failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds; the reconciliation driver
//! shares them across spawned tasks behind `Arc`.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod media;
pub mod storage;
pub mod watchlist;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use media::{CollectionSummary, ItemKind, LibraryItem, MediaServer, ServerInfo};
pub use storage::FileSystemAccess;
pub use watchlist::{RemoteListEntry, WatchlistSource};
