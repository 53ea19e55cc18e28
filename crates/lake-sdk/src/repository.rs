use std::sync::Arc;

use tracing::info;

use lake_binary::{BinaryStore, FileBinaryStore, FsckReport, InMemoryBinaryStore};
use lake_graph::{GraphStore, InMemoryGraphStore};
use lake_layout::{
    BinaryContent, IntegrityPolicy, LayoutManager, MigrationReport, ResourceSnapshot,
    ResourceStatus, VersionInfo, WriteOutcome, DEFAULT_ACTOR,
};
use lake_messaging::{HandlerRegistry, Messenger};
use lake_types::ntriples::parse_ntriples;
use lake_types::{TripleSet, Uid};

use crate::config::RepositoryConfig;
use crate::error::SdkResult;

/// High-level Lake repository API.
pub struct Repository {
    config: RepositoryConfig,
    layout: LayoutManager,
    messenger: Arc<Messenger>,
}

impl Repository {
    /// Open the repository described by `config`, creating its stores and
    /// root resource on first use.
    ///
    /// Fails with a migration error if the binary store layout or the
    /// recorded integrity policy differs from the configuration.
    pub fn open(config: RepositoryConfig, registry: &HandlerRegistry) -> SdkResult<Self> {
        let (graphs, binaries) = Self::open_stores(&config)?;
        Self::assemble(config, graphs, binaries, registry, true)
    }

    /// Open without checking the recorded integrity policy, so that
    /// [`Self::migrate_policy`] can change it.
    pub fn open_for_migration(
        config: RepositoryConfig,
        registry: &HandlerRegistry,
    ) -> SdkResult<Self> {
        let (graphs, binaries) = Self::open_stores(&config)?;
        Self::assemble(config, graphs, binaries, registry, false)
    }

    /// A repository backed by memory only. Store paths in `config` are
    /// ignored.
    pub fn in_memory(config: RepositoryConfig, registry: &HandlerRegistry) -> SdkResult<Self> {
        config.validate()?;
        let graphs: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let binaries: Arc<dyn BinaryStore> = Arc::new(InMemoryBinaryStore::new(config.uuid.algo));
        Self::assemble(config, graphs, binaries, registry, true)
    }

    fn open_stores(
        config: &RepositoryConfig,
    ) -> SdkResult<(Arc<dyn GraphStore>, Arc<dyn BinaryStore>)> {
        config.validate()?;
        let graphs = InMemoryGraphStore::open(&config.store.ldp_rs.location)?;
        let binaries = FileBinaryStore::open(&config.store.ldp_nr, config.uuid.algo)?;
        Ok((Arc::new(graphs), Arc::new(binaries)))
    }

    fn assemble(
        config: RepositoryConfig,
        graphs: Arc<dyn GraphStore>,
        binaries: Arc<dyn BinaryStore>,
        registry: &HandlerRegistry,
        verify_policy: bool,
    ) -> SdkResult<Self> {
        let messenger = Arc::new(Messenger::from_config(&config.messaging.routes, registry)?);
        let layout = LayoutManager::new(graphs, binaries, config.store.ldp_rs.clone())
            .with_sink(messenger.clone());
        if verify_policy {
            layout.verify_policy()?;
        }
        if layout.bootstrap(DEFAULT_ACTOR)? {
            info!(
                algorithm = %config.uuid.algo,
                policy = %layout.policy(),
                "initialized repository"
            );
        }
        Ok(Self {
            config,
            layout,
            messenger,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// The underlying layout manager.
    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    // -- resource operations ------------------------------------------------

    pub fn create(&self, uid: &str, triples: TripleSet, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.create(uid, triples, actor)?)
    }

    pub fn update(&self, uid: &str, triples: TripleSet, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.update(uid, triples, actor)?)
    }

    pub fn put(&self, uid: &str, triples: TripleSet, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.put(uid, triples, actor)?)
    }

    /// Create or replace a resource from an N-Triples document.
    pub fn put_ntriples(&self, uid: &str, document: &str, actor: &str) -> SdkResult<WriteOutcome> {
        let triples = parse_ntriples(document)?;
        self.put(uid, triples, actor)
    }

    pub fn delete(&self, uid: &str, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.delete(uid, actor)?)
    }

    pub fn purge(&self, uid: &str, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.purge(uid, actor)?)
    }

    pub fn resurrect(&self, uid: &str, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.resurrect(uid, actor)?)
    }

    pub fn get(&self, uid: &str) -> SdkResult<ResourceSnapshot> {
        Ok(self.layout.get(uid)?)
    }

    pub fn status(&self, uid: &str) -> SdkResult<ResourceStatus> {
        Ok(self.layout.status(uid)?)
    }

    pub fn children(&self, uid: &str) -> SdkResult<Vec<Uid>> {
        Ok(self.layout.children(uid)?)
    }

    /// Membership triples of a direct or indirect container.
    pub fn membership(&self, uid: &str) -> SdkResult<TripleSet> {
        Ok(self.layout.membership(uid)?)
    }

    // -- versions -----------------------------------------------------------

    pub fn versions(&self, uid: &str) -> SdkResult<Vec<VersionInfo>> {
        Ok(self.layout.versions(uid)?)
    }

    pub fn get_version(&self, uid: &str, version: &str) -> SdkResult<TripleSet> {
        Ok(self.layout.get_version(uid, version)?)
    }

    pub fn revert(&self, uid: &str, version: &str, actor: &str) -> SdkResult<WriteOutcome> {
        Ok(self.layout.revert_to_version(uid, version, actor)?)
    }

    // -- binaries -----------------------------------------------------------

    pub fn put_binary(
        &self,
        uid: &str,
        data: &[u8],
        mime: &str,
        actor: &str,
    ) -> SdkResult<WriteOutcome> {
        Ok(self.layout.put_binary(uid, data, mime, actor)?)
    }

    pub fn get_binary(&self, uid: &str) -> SdkResult<BinaryContent> {
        Ok(self.layout.get_binary(uid)?)
    }

    /// Verify every stored payload against its address.
    pub fn fsck(&self) -> SdkResult<FsckReport> {
        Ok(self.layout.binaries().fsck()?)
    }

    // -- maintenance --------------------------------------------------------

    /// Re-validate the store under `target` (the configured policy when
    /// `None`) and record it.
    pub fn migrate_policy(&self, target: Option<IntegrityPolicy>) -> SdkResult<MigrationReport> {
        let target = target.unwrap_or(self.config.store.ldp_rs.referential_integrity);
        Ok(self.layout.migrate_policy(target, DEFAULT_ACTOR)?)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("layout", &self.layout)
            .field("messenger", &self.messenger)
            .finish()
    }
}
