//! # Trakt Provider
//!
//! Implements `WatchlistSource` for the Trakt v2 API.
//!
//! ## Overview
//!
//! This module provides:
//! - List item retrieval with bearer authentication
//! - Mapping of movie and show entries to `RemoteListEntry`
//! - Status-to-error mapping (unauthorized, missing list)

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{TraktConnector, TRAKT_API_BASE};
pub use error::{Result, TraktError};
