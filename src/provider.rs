//! Provider service traits and account assembly.
//!
//! A provider exposes up to three narrow services. The crawl only ever
//! talks to these traits; how a service reaches its data (an exported
//! listing on disk, a local directory, a REST client) is the
//! implementation's concern.
//!
//! | Service | Shape | Shipped implementations |
//! |---------|-------|-------------------------|
//! | [`DocumentsService`] | flat listing with parent references | [`SnapshotProvider`](crate::provider_snapshot::SnapshotProvider) |
//! | [`PhotosService`] | albums, then photos per album | [`SnapshotProvider`](crate::provider_snapshot::SnapshotProvider) |
//! | [`FolderService`] | folder tree listed one level at a time | [`SnapshotProvider`](crate::provider_snapshot::SnapshotProvider), [`FsTreeProvider`](crate::provider_fs::FsTreeProvider) |
//!
//! Services are plain typed fields of [`Account`]; a capability whose
//! service is absent is skipped by the crawl.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AccountConfig;
use crate::error::ProviderError;
use crate::models::{AccessRule, RemoteEntity};
use crate::provider_fs::FsTreeProvider;
use crate::provider_snapshot::SnapshotProvider;

/// Which online service an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
    WindowsLive,
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Google => "google",
            ProviderKind::WindowsLive => "windows_live",
            ProviderKind::Local => "local",
        })
    }
}

/// Content class a crawl can be asked to mirror.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Documents,
    Photos,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Documents => "documents",
            Capability::Photos => "photos",
        })
    }
}

/// Flat document listing where hierarchy is expressed through parent
/// references on each entry.
#[async_trait]
pub trait DocumentsService: Send + Sync {
    /// Every document and folder visible to the account.
    async fn list_documents(&self) -> Result<Vec<RemoteEntity>, ProviderError>;

    /// Sharing entries of one listed entity.
    async fn access_rules(&self, entity: &RemoteEntity)
        -> Result<Vec<AccessRule>, ProviderError>;
}

#[async_trait]
pub trait PhotosService: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<RemoteEntity>, ProviderError>;

    async fn list_photos(&self, album: &RemoteEntity) -> Result<Vec<RemoteEntity>, ProviderError>;
}

/// Folder tree listed one level at a time.
#[async_trait]
pub trait FolderService: Send + Sync {
    /// Id of the folder traversal starts from. The root itself is not
    /// mirrored.
    fn root_id(&self) -> &str;

    /// Direct children (files and folders) of `folder_id`.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntity>, ProviderError>;
}

/// One configured account and the services it was built with.
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub provider: ProviderKind,
    pub documents: Option<Arc<dyn DocumentsService>>,
    pub photos: Option<Arc<dyn PhotosService>>,
    pub folders: Option<Arc<dyn FolderService>>,
}

impl Account {
    pub fn new(name: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider,
            documents: None,
            photos: None,
            folders: None,
        }
    }

    pub fn with_documents(mut self, service: Arc<dyn DocumentsService>) -> Self {
        self.documents = Some(service);
        self
    }

    pub fn with_photos(mut self, service: Arc<dyn PhotosService>) -> Self {
        self.photos = Some(service);
        self
    }

    pub fn with_folders(mut self, service: Arc<dyn FolderService>) -> Self {
        self.folders = Some(service);
        self
    }

    /// Data source URN tagging every resource this account owns. Also the
    /// named graph the account's writes go into.
    pub fn datasource(&self) -> String {
        format!("gd:goa-account:{}", self.name)
    }

    /// Whether a service backing `capability` is present.
    pub fn provides(&self, capability: Capability) -> bool {
        match capability {
            Capability::Documents => self.documents.is_some() || self.folders.is_some(),
            Capability::Photos => self.photos.is_some(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("documents", &self.documents.is_some())
            .field("photos", &self.photos.is_some())
            .field("folders", &self.folders.is_some())
            .finish()
    }
}

/// Build the services of one configured account.
///
/// Only the services for the configured capabilities are constructed.
/// Google documents come as a flat listing; Windows Live and local
/// accounts are folder trees.
pub fn build_account(name: &str, config: &AccountConfig) -> Result<Account, ProviderError> {
    let mut account = Account::new(name, config.provider);
    let wants = |c: Capability| config.capabilities.contains(&c);

    match config.provider {
        ProviderKind::Google => {
            let dir = config.snapshot_dir.clone().unwrap_or_default();
            let snapshot = Arc::new(SnapshotProvider::new(dir));
            if wants(Capability::Documents) {
                account = account.with_documents(snapshot.clone());
            }
            if wants(Capability::Photos) {
                account = account.with_photos(snapshot);
            }
        }
        ProviderKind::WindowsLive => {
            let dir = config.snapshot_dir.clone().unwrap_or_default();
            if wants(Capability::Documents) {
                account = account.with_folders(Arc::new(SnapshotProvider::new(dir)));
            }
        }
        ProviderKind::Local => {
            let root = config.root.clone().unwrap_or_default();
            if wants(Capability::Documents) {
                let tree = FsTreeProvider::new(root, &config.exclude_globs, config.follow_symlinks)?;
                account = account.with_folders(Arc::new(tree));
            }
        }
    }

    Ok(account)
}
