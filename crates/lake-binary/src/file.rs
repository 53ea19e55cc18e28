use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use lake_crypto::{ContentHasher, DigestAlgorithm, PairtreeLayout};

use crate::config::{BinaryStoreConfig, LayoutDescriptor};
use crate::error::{BinaryError, BinaryResult};
use crate::traits::{validate_digest, BinaryStore};

/// File name of the layout descriptor at the store root.
pub const DESCRIPTOR_FILE: &str = ".layout.toml";

/// Filesystem payload store.
///
/// A payload with digest `0123456789ab...` lives at
/// `<root>/01/23/45/67/89ab...` under the default layout. Hidden files
/// (the descriptor and in-flight temporary files) are never payloads.
#[derive(Debug)]
pub struct FileBinaryStore {
    root: PathBuf,
    hasher: ContentHasher,
    layout: PairtreeLayout,
    fixity_check: bool,
}

impl FileBinaryStore {
    /// Open (or initialize) a store.
    ///
    /// The first open persists the layout descriptor. Later opens fail with
    /// [`BinaryError::MigrationRequired`] if the descriptor differs from the
    /// configuration.
    pub fn open(config: &BinaryStoreConfig, algorithm: DigestAlgorithm) -> BinaryResult<Self> {
        let layout = config.layout();
        layout.validate()?;
        fs::create_dir_all(&config.path)?;

        let wanted = LayoutDescriptor::new(algorithm, layout);
        let descriptor_path = config.path.join(DESCRIPTOR_FILE);
        match read_descriptor(&descriptor_path)? {
            Some(stored) => {
                let diffs = stored.differences(&wanted);
                if !diffs.is_empty() {
                    return Err(BinaryError::MigrationRequired(format!(
                        "{}: {}",
                        config.path.display(),
                        diffs.join(", ")
                    )));
                }
            }
            None => {
                write_descriptor(&descriptor_path, &wanted)?;
                info!(path = %config.path.display(), ?wanted, "initialized binary store");
            }
        }

        Ok(Self {
            root: config.path.clone(),
            hasher: ContentHasher::new(algorithm),
            layout,
            fixity_check: config.fixity_check,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> PairtreeLayout {
        self.layout
    }

    /// Absolute path a digest is stored at.
    pub fn path_for(&self, digest: &str) -> BinaryResult<PathBuf> {
        validate_digest(self.algorithm(), digest)?;
        Ok(self.root.join(self.layout.relative_path(digest)))
    }

    fn read_raw(&self, digest: &str) -> BinaryResult<Vec<u8>> {
        let path = self.path_for(digest)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BinaryError::NotFound(digest.to_string()),
            _ => BinaryError::Io(e),
        })
    }

    fn check_fixity(&self, digest: &str, data: &[u8]) -> BinaryResult<()> {
        let computed = self.hasher.hash(data);
        if computed == digest {
            Ok(())
        } else {
            warn!(digest, %computed, "fixity mismatch");
            Err(BinaryError::FixityMismatch {
                expected: digest.to_string(),
                computed,
            })
        }
    }

    /// Remove now-empty pairtree directories between `from` and the root.
    fn prune_empty_dirs(&self, from: &Path) {
        let mut dir = from.parent();
        while let Some(d) = dir {
            if d == self.root || !d.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

fn read_descriptor(path: &Path) -> BinaryResult<Option<LayoutDescriptor>> {
    match fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text)
            .map(Some)
            .map_err(|e| BinaryError::Descriptor(e.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_descriptor(path: &Path, descriptor: &LayoutDescriptor) -> BinaryResult<()> {
    let text =
        toml::to_string(descriptor).map_err(|e| BinaryError::Descriptor(e.to_string()))?;
    fs::write(path, text)?;
    Ok(())
}

impl BinaryStore for FileBinaryStore {
    fn algorithm(&self) -> DigestAlgorithm {
        self.hasher.algorithm()
    }

    fn put(&self, data: &[u8]) -> BinaryResult<String> {
        let digest = self.hasher.hash(data);
        let path = self.path_for(&digest)?;
        if path.exists() {
            debug!(%digest, "binary already stored");
            return Ok(digest);
        }

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => debug!(%digest, bytes = data.len(), "stored binary"),
            // A concurrent writer stored the same bytes first.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(%digest, "binary stored concurrently");
            }
            Err(e) => return Err(BinaryError::Io(e.error)),
        }
        Ok(digest)
    }

    fn get(&self, digest: &str) -> BinaryResult<Vec<u8>> {
        let data = self.read_raw(digest)?;
        if self.fixity_check {
            self.check_fixity(digest, &data)?;
        }
        Ok(data)
    }

    fn verify(&self, digest: &str) -> BinaryResult<bool> {
        let data = self.read_raw(digest)?;
        Ok(self.hasher.verify(&data, digest))
    }

    fn exists(&self, digest: &str) -> BinaryResult<bool> {
        Ok(self.path_for(digest)?.is_file())
    }

    fn delete(&self, digest: &str) -> BinaryResult<bool> {
        let path = self.path_for(digest)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(&path);
                debug!(%digest, "deleted binary");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn digests(&self) -> BinaryResult<Vec<String>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let digest: String = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            let in_place = validate_digest(self.algorithm(), &digest).is_ok()
                && self.layout.relative_path(&digest) == rel;
            if in_place {
                out.push(digest);
            } else {
                warn!(path = %entry.path().display(), "stray file in binary store");
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn config(dir: &Path) -> BinaryStoreConfig {
        BinaryStoreConfig {
            path: dir.join("ldpnr"),
            ..BinaryStoreConfig::default()
        }
    }

    // ---- Put and get ----

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"Call me Ishmael.").unwrap();
        assert_eq!(digest.len(), 40);
        assert_eq!(store.get(&digest).unwrap(), b"Call me Ishmael.");
        assert!(store.exists(&digest).unwrap());
    }

    #[test]
    fn path_follows_pairtree_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"abc").unwrap();
        let path = store.path_for(&digest).unwrap();
        let expected = store
            .root()
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(&digest[4..6])
            .join(&digest[6..8])
            .join(&digest[8..]);
        assert_eq!(path, expected);
        assert!(path.is_file());
    }

    #[test]
    fn identical_puts_store_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha256).unwrap();
        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.digests().unwrap(), vec![a]);
    }

    #[test]
    fn concurrent_identical_puts() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(b"race").unwrap())
            })
            .collect();
        let digests: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.digests().unwrap().len(), 1);
    }

    // ---- Fixity ----

    #[test]
    fn tampered_payload_fails_fixity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"original").unwrap();
        fs::write(store.path_for(&digest).unwrap(), b"tampered").unwrap();

        assert!(matches!(
            store.get(&digest),
            Err(BinaryError::FixityMismatch { .. })
        ));
        assert!(!store.verify(&digest).unwrap());
        let report = store.fsck().unwrap();
        assert_eq!(report.corrupt, vec![digest]);
    }

    #[test]
    fn fixity_check_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BinaryStoreConfig {
            fixity_check: false,
            ..config(dir.path())
        };
        let store = FileBinaryStore::open(&cfg, DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"original").unwrap();
        fs::write(store.path_for(&digest).unwrap(), b"tampered").unwrap();
        assert_eq!(store.get(&digest).unwrap(), b"tampered");
    }

    // ---- Layout descriptor ----

    #[test]
    fn reopen_with_same_layout_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let digest = {
            let store = FileBinaryStore::open(&cfg, DigestAlgorithm::Sha1).unwrap();
            store.put(b"kept").unwrap()
        };
        let store = FileBinaryStore::open(&cfg, DigestAlgorithm::Sha1).unwrap();
        assert_eq!(store.get(&digest).unwrap(), b"kept");
    }

    #[test]
    fn changed_layout_requires_migration() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        FileBinaryStore::open(&cfg, DigestAlgorithm::Sha1).unwrap();

        let other_branches = BinaryStoreConfig {
            pairtree_branches: 3,
            ..cfg.clone()
        };
        assert!(matches!(
            FileBinaryStore::open(&other_branches, DigestAlgorithm::Sha1),
            Err(BinaryError::MigrationRequired(_))
        ));
        assert!(matches!(
            FileBinaryStore::open(&cfg, DigestAlgorithm::Sha512),
            Err(BinaryError::MigrationRequired(_))
        ));
    }

    #[test]
    fn zero_branch_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BinaryStoreConfig {
            pairtree_branch_length: 0,
            ..config(dir.path())
        };
        assert!(matches!(
            FileBinaryStore::open(&cfg, DigestAlgorithm::Sha1),
            Err(BinaryError::Crypto(_))
        ));
    }

    // ---- Delete and scan ----

    #[test]
    fn delete_prunes_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"gone").unwrap();
        assert!(store.delete(&digest).unwrap());
        assert!(!store.delete(&digest).unwrap());
        assert!(!store.root().join(&digest[0..2]).exists());
        assert!(store.root().join(DESCRIPTOR_FILE).exists());
    }

    #[test]
    fn digests_ignore_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        let digest = store.put(b"real").unwrap();
        fs::write(store.root().join("notes.txt"), b"stray").unwrap();
        assert_eq!(store.digests().unwrap(), vec![digest]);
    }

    #[test]
    fn invalid_digest_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBinaryStore::open(&config(dir.path()), DigestAlgorithm::Sha1).unwrap();
        assert!(matches!(
            store.path_for("../../etc/passwd"),
            Err(BinaryError::InvalidDigest(_))
        ));
        assert!(matches!(
            store.get(&"A".repeat(40)),
            Err(BinaryError::InvalidDigest(_))
        ));
    }
}
