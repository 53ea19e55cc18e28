use std::path::Path;

use serde::{Deserialize, Serialize};

use lake_binary::BinaryStoreConfig;
use lake_crypto::DigestAlgorithm;
use lake_layout::LayoutConfig;
use lake_messaging::RouteConfig;

use crate::error::{SdkError, SdkResult};

/// Repository configuration, usually loaded from `lake.toml`.
///
/// ```toml
/// [uuid]
/// algo = "sha1"
///
/// [store.ldp_rs]
/// location = "data/ldprs_store.json"
/// referential_integrity = "lenient"
///
/// [store.ldp_nr]
/// path = "data/ldpnr_store"
/// pairtree_branch_length = 2
/// pairtree_branches = 4
///
/// [[messaging.routes]]
/// handler = "log"
/// destination = "/topic/fcrepo"
/// formatter = "ResourceFormatter"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub uuid: UuidConfig,
    pub store: StoreConfig,
    pub messaging: MessagingConfig,
}

/// Digest algorithm for binary addresses and state digests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UuidConfig {
    pub algo: DigestAlgorithm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// RDF source graphs.
    pub ldp_rs: LayoutConfig,
    /// Binary payloads.
    pub ldp_nr: BinaryStoreConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub routes: Vec<RouteConfig>,
}

impl RepositoryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> SdkResult<()> {
        self.store
            .ldp_nr
            .layout()
            .validate()
            .map_err(|e| SdkError::Config(format!("store.ldp_nr: {e}")))?;
        for (idx, route) in self.messaging.routes.iter().enumerate() {
            if route.handler.trim().is_empty() {
                return Err(SdkError::Config(format!(
                    "messaging.routes[{idx}]: handler must not be empty"
                )));
            }
        }
        Ok(())
    }
}
