//! Pairtree path layout.
//!
//! A digest `0123456789abcdef...` with branch length 2 and 4 branches maps to
//! `01/23/45/67/89abcdef...`. Concatenating the segments always yields the
//! digest back.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Branch length and branch count for sharding digests into directories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairtreeLayout {
    /// Characters per intermediate segment (`L`). Must be at least 1.
    pub branch_length: usize,
    /// Number of intermediate segments (`N`). Zero chunks the whole digest.
    pub branches: usize,
}

impl PairtreeLayout {
    pub fn new(branch_length: usize, branches: usize) -> Result<Self, CryptoError> {
        let layout = Self {
            branch_length,
            branches,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.branch_length == 0 {
            return Err(CryptoError::InvalidLayout(
                "branch length must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Split a digest into path segments.
    ///
    /// With `branches > 0`, at most `branches` segments of `branch_length`
    /// characters are taken and any non-empty remainder becomes the final
    /// segment. A digest shorter than `branch_length * branches` stops early
    /// and never produces an empty segment. With `branches == 0` the digest
    /// is chunked to the end, the last chunk possibly shorter.
    pub fn segments<'a>(&self, digest: &'a str) -> Vec<&'a str> {
        let step = self.branch_length.max(1);
        let mut out = Vec::new();
        let mut rest = digest;
        while !rest.is_empty() {
            if self.branches > 0 && out.len() == self.branches {
                out.push(rest);
                break;
            }
            let cut = rest
                .char_indices()
                .nth(step)
                .map_or(rest.len(), |(idx, _)| idx);
            let (head, tail) = rest.split_at(cut);
            out.push(head);
            rest = tail;
        }
        out
    }

    /// Relative filesystem path for a digest.
    pub fn relative_path(&self, digest: &str) -> PathBuf {
        self.segments(digest).into_iter().collect()
    }
}

impl Default for PairtreeLayout {
    fn default() -> Self {
        Self {
            branch_length: 2,
            branches: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DIGEST: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn default_layout_shards_four_pairs() {
        let segs = PairtreeLayout::default().segments(DIGEST);
        assert_eq!(
            segs,
            vec!["01", "23", "45", "67", "89abcdef0123456789abcdef01234567"]
        );
    }

    #[test]
    fn short_digest_stops_without_empty_segment() {
        let layout = PairtreeLayout::new(2, 4).unwrap();
        assert_eq!(layout.segments("01234"), vec!["01", "23", "4"]);
        assert_eq!(layout.segments("01234567"), vec!["01", "23", "45", "67"]);
        assert!(layout.segments("").is_empty());
    }

    #[test]
    fn zero_branches_chunks_to_the_end() {
        let layout = PairtreeLayout::new(3, 0).unwrap();
        assert_eq!(layout.segments("abcdefgh"), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn zero_branch_length_is_rejected() {
        assert!(matches!(
            PairtreeLayout::new(0, 4),
            Err(CryptoError::InvalidLayout(_))
        ));
    }

    #[test]
    fn relative_path_joins_segments() {
        let path = PairtreeLayout::new(2, 2).unwrap().relative_path("abcdef");
        assert_eq!(path, PathBuf::from("ab").join("cd").join("ef"));
    }

    proptest! {
        #[test]
        fn segments_concatenate_to_digest(
            digest in "[0-9a-f]{0,130}",
            branch_length in 1usize..8,
            branches in 0usize..8,
        ) {
            let layout = PairtreeLayout::new(branch_length, branches).unwrap();
            let segs = layout.segments(&digest);
            prop_assert_eq!(segs.concat(), digest.clone());
            prop_assert!(segs.iter().all(|s| !s.is_empty()));
            if branches > 0 {
                prop_assert!(segs.len() <= branches + 1);
                for seg in segs.iter().take(branches) {
                    prop_assert!(seg.len() <= branch_length);
                }
            }
        }
    }
}
