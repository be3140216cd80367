//! Retention planning over uploaded bundle versions.
//!
//! Planning is pure: it maps the current version list to a decision per
//! candidate and never talks to the store. Execution, including the
//! per-deletion re-check of channel links, belongs to the caller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::version::{self, BundleVersion, VersionId};

/// What to do with one version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionAction {
    /// Preserved by the keep-count as one of the newest unused versions.
    KeepRecent,
    /// Preserved because a channel references it. Consumes no keep slot.
    KeepInUse,
    /// Eligible for deletion.
    Remove,
}

impl RetentionAction {
    pub fn is_keep(&self) -> bool {
        !matches!(self, RetentionAction::Remove)
    }
}

/// Planned outcome for a single candidate version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionDecision {
    pub id: VersionId,
    pub name: String,
    pub action: RetentionAction,
}

/// Half-open semver bound: versions with `lower <= name < upper_exclusive`
/// are candidates, everything else is left untouched.
#[derive(Clone, Debug)]
pub struct RangeFilter {
    pub lower: String,
    pub upper_exclusive: String,
}

impl RangeFilter {
    /// Range covering `lower` up to, and excluding, its next major release.
    pub fn to_next_major(lower: &str) -> crate::Result<Self> {
        Ok(Self {
            lower: lower.to_string(),
            upper_exclusive: version::next_major(lower)?,
        })
    }
}

/// Plan retention over `versions`, which must be ordered newest first.
///
/// Versions outside the range filter receive no decision at all, and with
/// a filter active non-semver names are ignored rather than rejected.
/// In-use versions are always kept and never count against `keep`, so the
/// newest `keep` unused versions survive regardless of channel links.
pub fn plan(
    versions: &[BundleVersion],
    in_use: &HashSet<VersionId>,
    keep: usize,
    range: Option<&RangeFilter>,
) -> crate::Result<Vec<RetentionDecision>> {
    if let Some(range) = range {
        // Fail on unparseable bounds up front, even with no versions.
        version::compare(&range.lower, &range.upper_exclusive)?;
    }

    let mut decisions = Vec::new();
    let mut kept = 0usize;

    for version in versions {
        if let Some(range) = range {
            if !version::is_semver(&version.name)
                || !version::in_range(&version.name, &range.lower, &range.upper_exclusive)?
            {
                continue;
            }
        }

        let action = if in_use.contains(&version.id) {
            RetentionAction::KeepInUse
        } else if kept < keep {
            kept += 1;
            RetentionAction::KeepRecent
        } else {
            RetentionAction::Remove
        };

        decisions.push(RetentionDecision {
            id: version.id,
            name: version.name.clone(),
            action,
        });
    }

    Ok(decisions)
}
