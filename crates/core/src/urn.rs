//! Structured resource identifiers: `group:resource[#fragment][!instance]`.

use crate::error::UrnParseError;
use crate::name::Name;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const FRAGMENT_SEPARATOR: char = '#';
pub const INSTANCE_INDICATOR: &str = "!instance";

static URN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+):([^#!]+)(?:#([^!]+))?(!instance)?$").unwrap());

/// A typed resource identifier.
///
/// The qualified string form is computed once at construction; comparisons
/// go through the case-insensitive [`Name`] parts, never the raw string.
#[derive(Debug, Clone)]
pub struct ResourceUrn {
    group: Name,
    resource: Name,
    fragment: Name,
    instance: bool,
    qualified: String,
}

impl ResourceUrn {
    pub fn new(group: impl Into<Name>, resource: impl Into<Name>) -> Self {
        Self::build(group.into(), resource.into(), Name::empty(), false)
    }

    pub fn with_fragment(
        group: impl Into<Name>,
        resource: impl Into<Name>,
        fragment: impl Into<Name>,
    ) -> Self {
        Self::build(group.into(), resource.into(), fragment.into(), false)
    }

    pub(crate) fn build(group: Name, resource: Name, fragment: Name, instance: bool) -> Self {
        let mut qualified = format!("{group}:{resource}");
        if !fragment.is_empty() {
            qualified.push(FRAGMENT_SEPARATOR);
            qualified.push_str(fragment.as_str());
        }
        if instance {
            qualified.push_str(INSTANCE_INDICATOR);
        }
        Self {
            group,
            resource,
            fragment,
            instance,
            qualified,
        }
    }

    /// Whether `input` would parse as a urn, without constructing one.
    pub fn is_valid(input: &str) -> bool {
        URN_PATTERN.is_match(input)
    }

    pub fn group(&self) -> &Name {
        &self.group
    }

    pub fn resource(&self) -> &Name {
        &self.resource
    }

    /// The fragment part; [`Name::empty`] when absent.
    pub fn fragment(&self) -> &Name {
        &self.fragment
    }

    pub fn is_instance(&self) -> bool {
        self.instance
    }

    /// `group:resource` with fragment and instance stripped.
    pub fn root_urn(&self) -> Self {
        Self::build(
            self.group.clone(),
            self.resource.clone(),
            Name::empty(),
            false,
        )
    }

    /// This urn with only the instance flag stripped.
    pub fn parent_urn(&self) -> Self {
        if self.instance {
            Self::build(
                self.group.clone(),
                self.resource.clone(),
                self.fragment.clone(),
                false,
            )
        } else {
            self.clone()
        }
    }

    /// This urn with the instance flag set. Idempotent.
    pub fn instance_urn(&self) -> Self {
        if self.instance {
            self.clone()
        } else {
            Self::build(
                self.group.clone(),
                self.resource.clone(),
                self.fragment.clone(),
                true,
            )
        }
    }

    pub fn as_str(&self) -> &str {
        &self.qualified
    }
}

impl PartialEq for ResourceUrn {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
            && self.resource == other.resource
            && self.fragment == other.fragment
            && self.instance == other.instance
    }
}

impl Eq for ResourceUrn {}

impl Hash for ResourceUrn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.resource.hash(state);
        self.fragment.hash(state);
        self.instance.hash(state);
    }
}

impl PartialOrd for ResourceUrn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceUrn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.group
            .cmp(&other.group)
            .then_with(|| self.resource.cmp(&other.resource))
            .then_with(|| self.fragment.cmp(&other.fragment))
            .then_with(|| self.instance.cmp(&other.instance))
    }
}

impl fmt::Display for ResourceUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified)
    }
}

impl FromStr for ResourceUrn {
    type Err = UrnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = URN_PATTERN.captures(s).ok_or_else(|| UrnParseError {
            input: s.to_string(),
        })?;
        let group = Name::from(&captures[1]);
        let resource = Name::from(&captures[2]);
        let fragment = captures
            .get(3)
            .map(|m| Name::from(m.as_str()))
            .unwrap_or_else(Name::empty);
        let instance = captures.get(4).is_some();
        Ok(Self::build(group, resource, fragment, instance))
    }
}

impl Serialize for ResourceUrn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified)
    }
}

impl<'de> Deserialize<'de> for ResourceUrn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(s: &str) -> ResourceUrn {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_trip_through_string_form() {
        for input in [
            "engine:prefab",
            "engine:prefab#part",
            "engine:prefab!instance",
            "engine:prefab#part!instance",
        ] {
            let parsed = urn(input);
            assert_eq!(parsed.to_string(), input);
            assert_eq!(urn(&parsed.to_string()), parsed);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in ["", "nogroup", "a:b#", "a:b#c#d", "a:b!foo", ":b", "a:"] {
            let err = input.parse::<ResourceUrn>().unwrap_err();
            assert_eq!(err.input, input);
            assert!(!ResourceUrn::is_valid(input));
        }
    }

    #[test]
    fn test_is_valid_accepts_parsable_input() {
        assert!(ResourceUrn::is_valid("engine:prefab"));
        assert!(ResourceUrn::is_valid("engine:prefab#part!instance"));
    }

    #[test]
    fn test_equality_is_case_insensitive() {
        assert_eq!(urn("Engine:Prefab"), urn("engine:prefab"));
    }

    #[test]
    fn test_instance_urn_is_idempotent() {
        let base = urn("engine:prefab");
        let instance = base.instance_urn();
        assert!(instance.is_instance());
        assert_eq!(instance.instance_urn(), instance);
        assert_eq!(instance.parent_urn(), base);
        assert_eq!(base.parent_urn(), base);
    }

    #[test]
    fn test_root_urn_strips_fragment_and_instance() {
        assert_eq!(urn("engine:prefab#part!instance").root_urn(), urn("engine:prefab"));
    }

    #[test]
    fn test_ordering_places_instance_last() {
        let mut urns = vec![
            urn("engine:prefab!instance"),
            urn("engine:prefab"),
            urn("engine:mesh"),
            urn("base:prefab"),
        ];
        urns.sort();
        let strings: Vec<_> = urns.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            strings,
            vec![
                "base:prefab",
                "engine:mesh",
                "engine:prefab",
                "engine:prefab!instance"
            ]
        );
    }
}
