//! Configuration layer: TOML file storage with environment overrides.

pub mod data;
pub mod io;

pub use data::{Config, IdentityConfig};
pub use io::ConfigError;
