//! Support code for the `docqa` binary: environment configuration and
//! terminal rendering.

pub mod config;
pub mod render;

pub use config::{AppConfig, Backend};
