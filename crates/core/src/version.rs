//! Bundle version records and semver comparison policy.
//!
//! Version names are semantic versions. Comparison uses semver precedence,
//! so build metadata (`1.0.0+build5`) never affects ordering while
//! pre-release tags (`1.0.0-beta.2`) do.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use time::OffsetDateTime;

use crate::app::AppId;

/// Sentinel version every app owns: the bundle shipped inside the native
/// binary. Created with `deleted` set so it never appears in listings.
pub const BUILTIN_VERSION: &str = "builtin";

/// Sentinel version every app owns: the placeholder for devices whose
/// bundle could not be determined. Created with `deleted` set.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Numeric id of a version row in the remote store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(i64);

impl VersionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded bundle version as stored remotely.
///
/// Deletion is soft: `deleted` rows keep their id so channels and history
/// never dangle, and re-uploading the same name revives the row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleVersion {
    pub id: VersionId,
    pub app_id: AppId,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub deleted: bool,
    /// SHA-256 of the uploaded payload, absent for externally hosted bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Download URL for bundles hosted outside the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl BundleVersion {
    /// Whether this is one of the reserved sentinel versions.
    pub fn is_sentinel(&self) -> bool {
        self.name == BUILTIN_VERSION || self.name == UNKNOWN_VERSION
    }
}

fn parse(name: &str) -> crate::Result<semver::Version> {
    semver::Version::parse(name).map_err(|e| crate::Error::InvalidVersion(format!("{name}: {e}")))
}

/// Compare two version names by semver precedence.
pub fn compare(a: &str, b: &str) -> crate::Result<Ordering> {
    Ok(parse(a)?.cmp_precedence(&parse(b)?))
}

/// Whether `name` falls in the half-open range `lower <= name < upper`.
pub fn in_range(name: &str, lower: &str, upper_exclusive: &str) -> crate::Result<bool> {
    let v = parse(name)?;
    Ok(v.cmp_precedence(&parse(lower)?) != Ordering::Less
        && v.cmp_precedence(&parse(upper_exclusive)?) == Ordering::Less)
}

/// The smallest release of the next major line: `1.2.3-rc.1` becomes `2.0.0`.
pub fn next_major(name: &str) -> crate::Result<String> {
    let v = parse(name)?;
    Ok(semver::Version::new(v.major + 1, 0, 0).to_string())
}

/// Whether `name` parses as a semantic version at all.
pub fn is_semver(name: &str) -> bool {
    semver::Version::parse(name).is_ok()
}
