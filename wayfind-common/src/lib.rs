//! # Wayfind Common Library
//!
//! Shared code for the Wayfind crates:
//! - Error type
//! - Configuration file resolution (CLI → ENV → TOML → default)
//! - Injectable clock
//! - Stable content hashing
//! - SQLite initialisation for the durable cache tier

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod hash;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
