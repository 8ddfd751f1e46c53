//! Database initialisation for the durable cache tier

pub mod init;

pub use init::*;
