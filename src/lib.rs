pub mod config;
pub mod error;
pub mod pose;
pub mod protocol;
pub mod recording;
pub mod server;
pub mod tracker;

/// `git describe` at build time
pub const GIT_VERSION: &str = env!("GIT_VERSION");
