//! Provider services backed by exported JSON listings.
//!
//! A snapshot directory holds whatever listings the account has:
//!
//! | File | Service | Shape |
//! |------|---------|-------|
//! | `documents.json` | [`DocumentsService`] | array of entities, each with optional `access_rules` |
//! | `albums.json` | [`PhotosService`] | array of albums, each with nested `photos` |
//! | `tree.json` | [`FolderService`] | object mapping folder id to its children; the root is `"root"` |
//!
//! Album and photo entries may carry `timestamp` in milliseconds (the way
//! photo services report capture time); it fills `created_at` when that is
//! absent. Files are re-read on every listing call, so a long-lived
//! provider always sees the current export.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::{AccessRule, RemoteEntity};
use crate::provider::{DocumentsService, FolderService, PhotosService};

pub const DOCUMENTS_FILE: &str = "documents.json";
pub const ALBUMS_FILE: &str = "albums.json";
pub const TREE_FILE: &str = "tree.json";

/// Folder id under which `tree.json` lists top-level entries.
pub const TREE_ROOT: &str = "root";

#[derive(Deserialize)]
struct DocumentEntry {
    #[serde(flatten)]
    entity: RemoteEntity,
    #[serde(default)]
    access_rules: Vec<AccessRule>,
}

#[derive(Deserialize)]
struct PhotoEntry {
    #[serde(flatten)]
    entity: RemoteEntity,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct AlbumEntry {
    #[serde(flatten)]
    entity: RemoteEntity,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    photos: Vec<PhotoEntry>,
}

fn with_millis(mut entity: RemoteEntity, timestamp_ms: Option<i64>) -> RemoteEntity {
    if entity.created_at.is_none() {
        entity.created_at = timestamp_ms.and_then(|ms| DateTime::from_timestamp(ms / 1000, 0));
    }
    entity
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProviderError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| ProviderError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reads listings from a snapshot directory.
pub struct SnapshotProvider {
    dir: PathBuf,
    rules: Mutex<HashMap<String, Vec<AccessRule>>>,
    photos: Mutex<Option<HashMap<String, Vec<RemoteEntity>>>>,
}

impl SnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rules: Mutex::new(HashMap::new()),
            photos: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load_albums(&self) -> Result<Vec<RemoteEntity>, ProviderError> {
        let entries: Vec<AlbumEntry> = read_json(&self.dir.join(ALBUMS_FILE)).await?;
        let mut albums = Vec::with_capacity(entries.len());
        let mut photos = HashMap::new();
        for entry in entries {
            let listed: Vec<RemoteEntity> = entry
                .photos
                .into_iter()
                .map(|p| with_millis(p.entity, p.timestamp))
                .collect();
            photos.insert(entry.entity.id.clone(), listed);
            albums.push(with_millis(entry.entity, entry.timestamp));
        }
        *lock(&self.photos) = Some(photos);
        Ok(albums)
    }
}

#[async_trait]
impl DocumentsService for SnapshotProvider {
    async fn list_documents(&self) -> Result<Vec<RemoteEntity>, ProviderError> {
        let entries: Vec<DocumentEntry> = read_json(&self.dir.join(DOCUMENTS_FILE)).await?;
        let mut rules = HashMap::new();
        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            rules.insert(entry.entity.id.clone(), entry.access_rules);
            documents.push(entry.entity);
        }
        *lock(&self.rules) = rules;
        Ok(documents)
    }

    async fn access_rules(
        &self,
        entity: &RemoteEntity,
    ) -> Result<Vec<AccessRule>, ProviderError> {
        Ok(lock(&self.rules).get(&entity.id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PhotosService for SnapshotProvider {
    async fn list_albums(&self) -> Result<Vec<RemoteEntity>, ProviderError> {
        self.load_albums().await
    }

    async fn list_photos(&self, album: &RemoteEntity) -> Result<Vec<RemoteEntity>, ProviderError> {
        let loaded = lock(&self.photos).is_some();
        if !loaded {
            self.load_albums().await?;
        }
        lock(&self.photos)
            .as_ref()
            .and_then(|photos| photos.get(&album.id).cloned())
            .ok_or_else(|| ProviderError::UnknownAlbum(album.id.clone()))
    }
}

#[async_trait]
impl FolderService for SnapshotProvider {
    fn root_id(&self) -> &str {
        TREE_ROOT
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntity>, ProviderError> {
        let mut tree: HashMap<String, Vec<RemoteEntity>> =
            read_json(&self.dir.join(TREE_FILE)).await?;
        tree.remove(folder_id)
            .ok_or_else(|| ProviderError::UnknownFolder(folder_id.to_string()))
    }
}
