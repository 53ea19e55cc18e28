use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Store-wide referential integrity policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Accept every reference.
    Off,
    /// Drop references to missing resources and log them.
    #[default]
    Lenient,
    /// Reject writes that reference missing resources.
    Strict,
}

impl IntegrityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for IntegrityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrityPolicy {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(LayoutError::MigrationRequired(format!(
                "unknown referential integrity policy {other:?}"
            ))),
        }
    }
}

/// Graph layout strategy. Only the resource-centric layout exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    RsrcCentric,
}

/// `store.ldp_rs` configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Graph store snapshot file.
    pub location: PathBuf,
    pub layout: LayoutKind,
    pub referential_integrity: IntegrityPolicy,
    /// Create pairtree nodes for missing intermediate path segments.
    pub legacy_ptree_split: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("data/ldprs_store.json"),
            layout: LayoutKind::default(),
            referential_integrity: IntegrityPolicy::default(),
            legacy_ptree_split: false,
        }
    }
}
