//! knitkit Settings Crate
//!
//! Handles the configuration file: serial connection parameters and the
//! knitting job setup.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, KnittingSettings, CONFIG_FILE_NAME};
pub use error::{SettingsError, SettingsResult};
