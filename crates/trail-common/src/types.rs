//! Shared audit types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TrailError;

/// Kind of change recorded by one audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Insert,
    Update,
    Remove,
    Associate,
    Dissociate,
}

impl AuditType {
    /// Every audit type, in declaration order
    pub const ALL: [AuditType; 5] = [
        AuditType::Insert,
        AuditType::Update,
        AuditType::Remove,
        AuditType::Associate,
        AuditType::Dissociate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Associate => "associate",
            Self::Dissociate => "dissociate",
        }
    }
}

impl std::fmt::Display for AuditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditType {
    type Err = TrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "remove" => Ok(Self::Remove),
            "associate" => Ok(Self::Associate),
            "dissociate" => Ok(Self::Dissociate),
            _ => Err(TrailError::UnknownAuditType(s.to_string())),
        }
    }
}

// Row decoding goes through `String` (the `type` column is TEXT).
impl TryFrom<String> for AuditType {
    type Error = TrailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Access scope guarded by role configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    /// Reading an entity's audit history
    View,
}

impl AccessScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
        }
    }
}

impl std::fmt::Display for AccessScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessScope {
    type Err = TrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(Self::View),
            _ => Err(TrailError::UnknownScope(s.to_string())),
        }
    }
}
