//! Semantic versions and version ranges for module dependency resolution.

use crate::error::VersionParseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version with an optional snapshot flag.
///
/// Ordering is by the numeric fields; a snapshot sorts immediately before
/// the release it precedes (`1.2.0-SNAPSHOT < 1.2.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    snapshot: bool,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            snapshot: false,
        }
    }

    pub fn snapshot(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            snapshot: true,
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    /// The next major release (`1.4.2 -> 2.0.0`).
    pub fn next_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// The next minor release (`1.4.2 -> 1.5.0`).
    pub fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// The next patch release (`1.4.2 -> 1.4.3`).
    pub fn next_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    fn numeric(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric()
            .cmp(&other.numeric())
            // snapshot precedes its release
            .then_with(|| other.snapshot.cmp(&self.snapshot))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.snapshot {
            f.write_str("-SNAPSHOT")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || VersionParseError {
            input: s.to_string(),
        };

        let (numbers, snapshot) = match s.strip_suffix("-SNAPSHOT") {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        let mut parts = numbers.split('.');
        let mut next = |part: Option<&str>| -> Result<u32, VersionParseError> {
            part.ok_or_else(error)?.parse::<u32>().map_err(|_| error())
        };

        let major = next(parts.next())?;
        let minor = next(parts.next())?;
        let patch = next(parts.next())?;
        if parts.next().is_some() {
            return Err(error());
        }

        Ok(Self {
            major,
            minor,
            patch,
            snapshot,
        })
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A half-open version range `[lower, upper)`.
///
/// The upper bound is snapshot-aware: a snapshot of the excluded upper
/// version is itself excluded (`[1.0.0, 2.0.0)` does not admit
/// `2.0.0-SNAPSHOT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    lower: Version,
    upper: Version,
}

impl VersionRange {
    /// Creates `[lower, upper)`. `lower` must not exceed `upper`.
    pub fn new(lower: Version, upper: Version) -> Self {
        assert!(
            lower <= upper,
            "invalid version range: {lower} > {upper}"
        );
        Self { lower, upper }
    }

    /// The range of all versions compatible with `version`: `[version, nextMajor)`.
    pub fn compatible_with(version: Version) -> Self {
        Self::new(version, version.next_major())
    }

    pub fn lower_bound(&self) -> Version {
        self.lower
    }

    pub fn upper_bound(&self) -> Version {
        self.upper
    }

    pub fn contains(&self, version: Version) -> bool {
        version >= self.lower && version.numeric() < self.upper.numeric()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for input in ["0.1.0", "1.12.3", "2.0.0-SNAPSHOT"] {
            let version: Version = input.parse().unwrap();
            assert_eq!(version.to_string(), input);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in ["", "1", "1.2", "1.2.3.4", "a.b.c", "1.2.x", "1.2.3-snap"] {
            let err = input.parse::<Version>().unwrap_err();
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn test_ordering() {
        let v1: Version = "1.2.3".parse().unwrap();
        let v2: Version = "1.3.0".parse().unwrap();
        assert!(v1 < v2);
        assert!(Version::snapshot(1, 3, 0) < v2);
        assert!(Version::snapshot(1, 3, 0) > v1);
    }

    #[test]
    fn test_successor_versions() {
        let v = Version::snapshot(1, 4, 2);
        assert_eq!(v.next_major(), Version::new(2, 0, 0));
        assert_eq!(v.next_minor(), Version::new(1, 5, 0));
        assert_eq!(v.next_patch(), Version::new(1, 4, 3));
        assert!(!v.next_major().is_snapshot());
    }

    #[test]
    fn test_range_contains() {
        let range = VersionRange::new(Version::new(1, 0, 0), Version::new(2, 0, 0));
        assert!(range.contains(Version::new(1, 0, 0)));
        assert!(range.contains(Version::new(1, 9, 9)));
        assert!(range.contains(Version::snapshot(1, 9, 9)));
        assert!(!range.contains(Version::new(2, 0, 0)));
        // snapshot of the excluded upper bound is excluded too
        assert!(!range.contains(Version::snapshot(2, 0, 0)));
        // snapshot of the lower bound precedes it
        assert!(!range.contains(Version::snapshot(1, 0, 0)));
    }

    #[test]
    fn test_serde_round_trip() {
        let version = Version::snapshot(3, 1, 4);
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"3.1.4-SNAPSHOT\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
