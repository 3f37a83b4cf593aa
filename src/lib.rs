pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

// Re-export commonly used items for convenience
pub use app::{AppHandle, AppSnapshot, VoiceApp};
pub use config::ClientConfig;
pub use crate::core::*;
pub use domain::{Cart, DomainKind, DomainModule, Playlist};
