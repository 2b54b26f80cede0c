//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Environment-driven configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and event broadcasting mechanisms
//! used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
