//! Server services.

pub mod realtime;

pub use realtime::{FeedKind, RealtimeService};
