//! Playlist metrics engine for digital signage.

pub mod db;
pub mod metrics;
pub mod models;
