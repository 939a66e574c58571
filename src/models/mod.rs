//! Domain models for playlists, items and users.

pub mod metrics;
pub mod playlist;
pub mod user;

pub use metrics::{ItemMetrics, Metrics, PlaylistMetrics};
pub use playlist::*;
pub use user::{User, UserRoles};
