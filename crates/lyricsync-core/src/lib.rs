//! lyricsync-core: shared errors, configuration, and player events.
//!
//! This crate is the foundational dependency for all other lyricsync crates,
//! providing the unified error type, the configuration schema, and the
//! broadcast event bus that mirrors every player notification.

pub mod config;
pub mod error;
pub mod events;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorCategory, Result};
pub use events::{EventBus, PlayerEvent};
