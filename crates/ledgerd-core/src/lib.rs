//! `ledgerd-core`: configuration, shared errors and timestamp helpers used by
//! every other `ledgerd` crate.

pub mod config;
pub mod error;
pub mod time;

pub use config::LedgerdConfig;
pub use error::{CoreError, Result};
