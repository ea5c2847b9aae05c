//! ReqMind Core: configuration and the shared error type.

pub mod config;
pub mod error;

pub use config::{AppConfig, EnvLookup};
pub use error::{Error, Result};
