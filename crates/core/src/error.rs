use thiserror::Error;

/// A string that does not match the `group:resource[#fragment][!instance]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource urn: '{input}'")]
pub struct UrnParseError {
    pub input: String,
}

/// A string that does not parse as `major.minor.patch[-SNAPSHOT]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version: '{input}'")]
pub struct VersionParseError {
    pub input: String,
}
