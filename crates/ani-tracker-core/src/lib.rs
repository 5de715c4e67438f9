pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod title;

pub use config::{AppConfig, Credentials};
pub use error::CoreError;
pub use models::{PlaybackSnapshot, TrackedTitle};
