//! # Emby Provider
//!
//! Implements `MediaServer` for the Emby REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Server reachability probe (`/System/Info`)
//! - Movie and series catalog listing with provider ids
//! - Box set listing and creation
//! - Additive collection membership updates

pub mod connector;
pub mod error;
pub mod types;

pub use connector::EmbyConnector;
pub use error::{EmbyError, Result};
