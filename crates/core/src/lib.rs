//! Core domain types and shared logic for airlift.
//!
//! This crate defines the canonical data model used across all other crates:
//! - App identifiers and bundle version records
//! - Semver comparison policy for version names
//! - Retention planning over uploaded versions
//! - Channel records and progressive rollout transitions
//! - Project configuration
//!
//! Everything here is pure policy; network and filesystem access live in
//! the CLI crate.

pub mod app;
pub mod config;
pub mod error;
pub mod retention;
pub mod rollout;
pub mod version;

pub use app::AppId;
pub use error::{Error, Result};
pub use retention::{RangeFilter, RetentionAction, RetentionDecision};
pub use rollout::{Channel, PublishOutcome, RolloutState};
pub use version::{BundleVersion, VersionId};

/// Versions an unfiltered cleanup keeps by default.
pub const DEFAULT_KEEP_VERSIONS: usize = 4;

/// Fraction of traffic a freshly started progressive deploy sends to the
/// new bundle.
pub const PROGRESSIVE_START_PERCENTAGE: f64 = 0.1;
