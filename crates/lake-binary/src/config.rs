use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lake_crypto::{DigestAlgorithm, PairtreeLayout};

/// `store.ldp_nr` configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryStoreConfig {
    /// Store root directory.
    pub path: PathBuf,
    pub pairtree_branch_length: usize,
    pub pairtree_branches: usize,
    /// Verify the digest of every payload read.
    pub fixity_check: bool,
}

impl BinaryStoreConfig {
    pub fn layout(&self) -> PairtreeLayout {
        PairtreeLayout {
            branch_length: self.pairtree_branch_length,
            branches: self.pairtree_branches,
        }
    }
}

impl Default for BinaryStoreConfig {
    fn default() -> Self {
        let layout = PairtreeLayout::default();
        Self {
            path: PathBuf::from("data/ldpnr_store"),
            pairtree_branch_length: layout.branch_length,
            pairtree_branches: layout.branches,
            fixity_check: true,
        }
    }
}

/// Layout parameters persisted at the store root.
///
/// Changing any of them moves every payload, so a mismatch on open means the
/// store must be migrated first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    pub algorithm: DigestAlgorithm,
    pub branch_length: usize,
    pub branches: usize,
}

impl LayoutDescriptor {
    pub fn new(algorithm: DigestAlgorithm, layout: PairtreeLayout) -> Self {
        Self {
            algorithm,
            branch_length: layout.branch_length,
            branches: layout.branches,
        }
    }

    /// Human-readable list of fields that differ from `other`.
    pub fn differences(&self, other: &Self) -> Vec<String> {
        let mut out = Vec::new();
        if self.algorithm != other.algorithm {
            out.push(format!("algorithm {} != {}", self.algorithm, other.algorithm));
        }
        if self.branch_length != other.branch_length {
            out.push(format!(
                "branch_length {} != {}",
                self.branch_length, other.branch_length
            ));
        }
        if self.branches != other.branches {
            out.push(format!("branches {} != {}", self.branches, other.branches));
        }
        out
    }
}
