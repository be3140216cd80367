//! Channel records and progressive rollout transitions.
//!
//! A channel always serves a baseline `version`. During a progressive
//! deploy a second version (the canary) takes `secondary_percentage` of
//! traffic. The rollout state is derived from those two fields rather
//! than stored, so a channel record can never claim a split it does not
//! have.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::app::AppId;
use crate::version::VersionId;

/// Rollout state derived from a channel record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutState {
    /// All traffic on the baseline version.
    Stable,
    /// A canary version is taking a fraction of traffic.
    Splitting,
    /// The canary reached 100% and awaits promotion to baseline.
    Complete,
}

impl RolloutState {
    /// Check if a progressive deploy is mid-flight.
    pub fn is_splitting(&self) -> bool {
        matches!(self, Self::Splitting)
    }

    /// Check if all traffic is on a single version.
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Splitting => write!(f, "splitting"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Outcome of publishing a bundle to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Rollout state after the publish.
    pub state: RolloutState,
    /// A previous progressive deploy was still mid-split and its canary
    /// was promoted to make room. Callers should warn about this.
    pub restarted_unfinished: bool,
}

/// A deployment channel as stored remotely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    /// App this channel belongs to.
    pub app_id: AppId,
    /// Channel name, unique per app.
    pub name: String,
    /// User id that owns the channel.
    pub created_by: String,
    /// Baseline version all non-canary traffic receives.
    pub version: VersionId,
    /// Canary version during a progressive deploy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_version: Option<VersionId>,
    /// Fraction of traffic on the canary, in [0, 1].
    #[serde(default)]
    pub secondary_percentage: f64,
    /// Whether publishes to this channel start a traffic split by default.
    #[serde(default)]
    pub enable_progressive_deploy: bool,
    /// Whether iOS devices receive updates from this channel.
    #[serde(default = "default_true")]
    pub ios: bool,
    /// Whether Android devices receive updates from this channel.
    #[serde(default = "default_true")]
    pub android: bool,
    /// Whether devices may assign themselves to this channel.
    #[serde(default)]
    pub allow_device_self_set: bool,
    /// Whether this is the default channel for new devices.
    #[serde(default)]
    pub public: bool,
    /// When the channel was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the channel was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn default_true() -> bool {
    true
}

impl Channel {
    /// Create a new channel pointing at `version`, serving both platforms.
    pub fn new(app_id: AppId, name: impl Into<String>, created_by: impl Into<String>, version: VersionId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            app_id,
            name: name.into(),
            created_by: created_by.into(),
            version,
            second_version: None,
            secondary_percentage: 0.0,
            enable_progressive_deploy: false,
            ios: true,
            android: true,
            allow_device_self_set: false,
            public: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the rollout state from the record.
    pub fn state(&self) -> RolloutState {
        match self.second_version {
            None => RolloutState::Stable,
            Some(_) if self.secondary_percentage >= 1.0 => RolloutState::Complete,
            Some(_) => RolloutState::Splitting,
        }
    }

    /// Validate that the record is complete enough to write back.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() || self.created_by.is_empty() {
            return Err(crate::Error::InvalidChannelRef(
                "missing app_id, name, or created_by".to_string(),
            ));
        }
        Ok(())
    }

    /// Point all traffic at `new` immediately, abandoning any split.
    pub fn cutover(&mut self, new: VersionId) {
        self.version = new;
        self.second_version = None;
        self.secondary_percentage = 0.0;
        self.touch();
    }

    /// Publish a bundle to the channel.
    ///
    /// Without `progressive` this is a plain cutover. With it, the new
    /// bundle becomes the canary at [`crate::PROGRESSIVE_START_PERCENTAGE`].
    /// A split still in flight gets its canary promoted first; the outcome
    /// reports that so callers can warn.
    pub fn publish(&mut self, new: VersionId, progressive: bool) -> crate::Result<PublishOutcome> {
        self.validate()?;

        if !progressive {
            self.cutover(new);
            return Ok(PublishOutcome {
                state: self.state(),
                restarted_unfinished: false,
            });
        }

        let restarted_unfinished = match self.state() {
            RolloutState::Stable => false,
            RolloutState::Splitting => {
                self.promote()?;
                true
            }
            RolloutState::Complete => {
                self.promote()?;
                false
            }
        };

        self.second_version = Some(new);
        self.secondary_percentage = crate::PROGRESSIVE_START_PERCENTAGE;
        self.touch();

        Ok(PublishOutcome {
            state: self.state(),
            restarted_unfinished,
        })
    }

    /// Move the traffic split to `percentage`, clamped to [0, 1].
    ///
    /// Reaching 1 promotes the canary to baseline and returns the channel
    /// to [`RolloutState::Stable`]. Fails with
    /// [`crate::Error::MissingBaseline`] when no split is in flight.
    pub fn advance(&mut self, percentage: f64) -> crate::Result<RolloutState> {
        self.validate()?;
        if self.second_version.is_none() {
            return Err(crate::Error::MissingBaseline);
        }

        // clamp passes NaN through; treat it as no traffic on the canary.
        self.secondary_percentage = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 1.0)
        };
        if self.state() == RolloutState::Complete {
            self.promote()?;
        }
        self.touch();
        Ok(self.state())
    }

    /// Collapse a completed split into its stable form.
    ///
    /// Records read back from the store can still carry a finished split
    /// (canary at 100%); writing one back unchanged would persist the stale
    /// split. Returns whether the record was rewritten.
    pub fn normalize(&mut self) -> bool {
        if self.state() != RolloutState::Complete {
            return false;
        }
        if let Some(canary) = self.second_version.take() {
            self.version = canary;
        }
        self.secondary_percentage = 0.0;
        self.touch();
        true
    }

    /// Promote the current canary to baseline.
    fn promote(&mut self) -> crate::Result<()> {
        let canary = self
            .second_version
            .take()
            .ok_or(crate::Error::MissingBaseline)?;
        self.version = canary;
        self.secondary_percentage = 0.0;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_channel() -> Channel {
        Channel::new(
            AppId::parse("com.example.app").unwrap(),
            "production",
            "usr_1",
            VersionId::new(10),
        )
    }

    #[test]
    fn test_new_channel_is_stable() {
        let channel = sample_channel();
        assert_eq!(channel.state(), RolloutState::Stable);
        assert!(channel.state().is_stable());
        assert!(channel.ios);
        assert!(channel.android);
        assert!(!channel.public);
    }

    #[test]
    fn test_plain_publish_cuts_over() {
        let mut channel = sample_channel();
        let outcome = channel.publish(VersionId::new(11), false).unwrap();

        assert_eq!(outcome.state, RolloutState::Stable);
        assert!(!outcome.restarted_unfinished);
        assert_eq!(channel.version, VersionId::new(11));
        assert!(channel.second_version.is_none());
    }

    #[test]
    fn test_progressive_publish_starts_ten_percent_canary() {
        let mut channel = sample_channel();
        let outcome = channel.publish(VersionId::new(11), true).unwrap();

        assert_eq!(outcome.state, RolloutState::Splitting);
        assert!(!outcome.restarted_unfinished);
        assert_eq!(channel.version, VersionId::new(10));
        assert_eq!(channel.second_version, Some(VersionId::new(11)));
        assert!((channel.secondary_percentage - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_publish_over_unfinished_split_promotes_and_warns() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();
        channel.advance(0.5).unwrap();

        let outcome = channel.publish(VersionId::new(12), true).unwrap();

        assert!(outcome.restarted_unfinished);
        assert_eq!(outcome.state, RolloutState::Splitting);
        // The abandoned canary became the baseline.
        assert_eq!(channel.version, VersionId::new(11));
        assert_eq!(channel.second_version, Some(VersionId::new(12)));
        assert!((channel.secondary_percentage - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_publish_over_complete_split_does_not_warn() {
        let mut channel = sample_channel();
        channel.second_version = Some(VersionId::new(11));
        channel.secondary_percentage = 1.0;
        assert_eq!(channel.state(), RolloutState::Complete);

        let outcome = channel.publish(VersionId::new(12), true).unwrap();

        assert!(!outcome.restarted_unfinished);
        assert_eq!(channel.version, VersionId::new(11));
        assert_eq!(channel.second_version, Some(VersionId::new(12)));
    }

    #[test]
    fn test_cutover_abandons_split() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();

        channel.cutover(VersionId::new(12));

        assert_eq!(channel.state(), RolloutState::Stable);
        assert_eq!(channel.version, VersionId::new(12));
        assert!(channel.second_version.is_none());
        assert_eq!(channel.secondary_percentage, 0.0);
    }

    #[test]
    fn test_advance_to_one_promotes_canary() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();

        let state = channel.advance(1.0).unwrap();

        assert_eq!(state, RolloutState::Stable);
        assert_eq!(channel.version, VersionId::new(11));
        assert!(channel.second_version.is_none());
        assert_eq!(channel.secondary_percentage, 0.0);
    }

    #[test]
    fn test_advance_clamps_out_of_range_percentages() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();

        channel.advance(-0.3).unwrap();
        assert_eq!(channel.secondary_percentage, 0.0);
        assert_eq!(channel.state(), RolloutState::Splitting);

        let state = channel.advance(1.7).unwrap();
        assert_eq!(state, RolloutState::Stable);
        assert_eq!(channel.version, VersionId::new(11));
    }

    #[test]
    fn test_advance_treats_nan_as_zero() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();

        let state = channel.advance(f64::NAN).unwrap();

        assert_eq!(state, RolloutState::Splitting);
        assert_eq!(channel.secondary_percentage, 0.0);
        assert_eq!(channel.second_version, Some(VersionId::new(11)));
    }

    #[test]
    fn test_normalize_collapses_complete_to_stable() {
        let mut channel = sample_channel();
        channel.second_version = Some(VersionId::new(11));
        channel.secondary_percentage = 1.0;
        assert_eq!(channel.state(), RolloutState::Complete);

        assert!(channel.normalize());

        assert_eq!(channel.state(), RolloutState::Stable);
        assert_eq!(channel.version, VersionId::new(11));
        assert!(channel.second_version.is_none());
        assert_eq!(channel.secondary_percentage, 0.0);
    }

    #[test]
    fn test_normalize_leaves_stable_and_splitting_untouched() {
        let mut channel = sample_channel();
        assert!(!channel.normalize());
        assert_eq!(channel.state(), RolloutState::Stable);

        channel.publish(VersionId::new(11), true).unwrap();
        assert!(!channel.normalize());
        assert_eq!(channel.state(), RolloutState::Splitting);
        assert_eq!(channel.second_version, Some(VersionId::new(11)));
    }

    #[test]
    fn test_advance_without_split_is_an_error() {
        let mut channel = sample_channel();
        let err = channel.advance(0.5).unwrap_err();
        assert!(matches!(err, crate::Error::MissingBaseline));
    }

    #[test]
    fn test_publish_rejects_incomplete_record() {
        let mut channel = sample_channel();
        channel.created_by = String::new();
        let err = channel.publish(VersionId::new(11), false).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidChannelRef(_)));
    }

    #[test]
    fn test_channel_round_trips_through_json() {
        let mut channel = sample_channel();
        channel.publish(VersionId::new(11), true).unwrap();

        let json = serde_json::to_string(&channel).unwrap();
        let back: Channel = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, channel.name);
        assert_eq!(back.version, channel.version);
        assert_eq!(back.second_version, channel.second_version);
        assert_eq!(back.state(), RolloutState::Splitting);
    }

    #[test]
    fn test_channel_deserializes_with_defaults() {
        let json = r#"{
            "app_id": "com.example.app",
            "name": "beta",
            "created_by": "usr_1",
            "version": 5,
            "created_at": "2026-02-01T08:00:00Z",
            "updated_at": "2026-02-01T08:00:00Z"
        }"#;
        let channel: Channel = serde_json::from_str(json).unwrap();

        assert_eq!(channel.state(), RolloutState::Stable);
        assert!(channel.ios);
        assert!(channel.android);
        assert!(!channel.enable_progressive_deploy);
        assert!(!channel.allow_device_self_set);
    }
}
