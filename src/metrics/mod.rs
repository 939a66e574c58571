//! Playlist metrics: aggregation, duration quotas and propagation.
//!
//! The pure parts ([`aggregator`], [`quota`], [`merge_zone`]) work on loaded
//! data. [`MetricsEngine`] binds them to a [`Store`] and keeps stored metrics
//! consistent across nested and multizone playlists.

pub mod aggregator;
mod editing;
mod engine;
pub mod error;
mod multizone;
mod propagation;
pub mod quota;
pub mod store;

pub use aggregator::{aggregate, check_time_limit, compute_metrics};
pub use engine::{DEFAULT_ITEM_DURATION, MetricsConfig, MetricsEngine, PlaylistSummary};
pub use error::MetricsError;
pub use multizone::merge_zone;
pub use propagation::CascadeReport;
pub use quota::allowed_duration;
pub use store::{
    ItemFilter, ItemSource, ItemWriter, PlaylistSource, QuotaPolicy, RepoResult, SizeAndCount,
    Store, UnitOfWork,
};
