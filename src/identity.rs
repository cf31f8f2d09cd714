//! Stable identifiers for remote entities and their binding to store
//! handles.
//!
//! An identifier is `<collection prefix?><provider namespace><native id>`.
//! Containers carry a collection prefix, so a folder and a file sharing a
//! native id never collide.
//!
//! | Provider | Entity | Identifier |
//! |----------|--------|------------|
//! | google | document | `google:drive:<id>` |
//! | google | folder | `gd:collection:google:drive:<id>` |
//! | google | photo | `google:picasaweb:<id>` |
//! | google | album | `photos:collection:google:picasaweb:<id>` |
//! | windows_live | file | `windows-live:skydrive:<id>` |
//! | windows_live | folder | `gd:collection:windows-live:skydrive:<id>` |
//! | local | file | `local:files:<path>` |
//! | local | folder | `gd:collection:local:files:<path>` |

use std::collections::HashSet;
use std::fmt;

use crate::error::StoreError;
use crate::models::{EntityKind, RemoteEntity};
use crate::provider::{Capability, ProviderKind};
use crate::store::{GraphStore, ResourceHandle};

pub const GOOGLE_DRIVE: &str = "google:drive:";
pub const GOOGLE_PICASAWEB: &str = "google:picasaweb:";
pub const WINDOWS_LIVE_SKYDRIVE: &str = "windows-live:skydrive:";
pub const LOCAL_FILES: &str = "local:files:";

pub const FOLDER_PREFIX: &str = "gd:collection:";
pub const ALBUM_PREFIX: &str = "photos:collection:";

/// Provider-namespaced identifier of a mirrored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn namespace(provider: ProviderKind, kind: EntityKind) -> &'static str {
    match (provider, kind) {
        (ProviderKind::Google, EntityKind::Photo | EntityKind::Album) => GOOGLE_PICASAWEB,
        (ProviderKind::Google, _) => GOOGLE_DRIVE,
        (ProviderKind::WindowsLive, _) => WINDOWS_LIVE_SKYDRIVE,
        (ProviderKind::Local, _) => LOCAL_FILES,
    }
}

/// Identifier of an entity of `kind` with native id `id`.
pub fn resolve_id(provider: ProviderKind, kind: EntityKind, id: &str) -> Identifier {
    let prefix = match kind {
        EntityKind::Folder => FOLDER_PREFIX,
        EntityKind::Album => ALBUM_PREFIX,
        _ => "",
    };
    Identifier(format!("{}{}{}", prefix, namespace(provider, kind), id))
}

pub fn resolve(provider: ProviderKind, entity: &RemoteEntity) -> Identifier {
    resolve_id(provider, entity.kind, &entity.id)
}

/// Identifier of the folder a parent reference points at.
pub fn folder_identifier(provider: ProviderKind, folder_id: &str) -> Identifier {
    resolve_id(provider, EntityKind::Folder, folder_id)
}

/// Identifier of the camera sub-resource owned by a photo.
pub fn equipment_identifier(photo: &Identifier) -> Identifier {
    Identifier(format!("{}#equipment", photo.0))
}

/// Capability whose listings produce `identifier`.
pub fn capability_of(identifier: &str) -> Capability {
    let bare = identifier
        .strip_prefix(ALBUM_PREFIX)
        .or_else(|| identifier.strip_prefix(FOLDER_PREFIX))
        .unwrap_or(identifier);
    if identifier.starts_with(ALBUM_PREFIX) || bare.starts_with(GOOGLE_PICASAWEB) {
        Capability::Photos
    } else {
        Capability::Documents
    }
}

/// Identifiers this account owned at crawl start, minus those visited so
/// far. Whatever remains when the crawl completes is stale.
#[derive(Debug, Default)]
pub struct PreviousResourceSet {
    remaining: HashSet<String>,
    visited: HashSet<String>,
}

impl PreviousResourceSet {
    /// Load every identifier tagged with `datasource`.
    pub async fn load(store: &dyn GraphStore, datasource: &str) -> Result<Self, StoreError> {
        let remaining = store.identifiers_for_datasource(datasource).await?;
        Ok(Self {
            remaining,
            visited: HashSet::new(),
        })
    }

    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remaining: identifiers.into_iter().map(Into::into).collect(),
            visited: HashSet::new(),
        }
    }

    /// Record that `identifier` exists upstream. Returns `false` if it was
    /// already visited during this crawl.
    pub fn mark_visited(&mut self, identifier: &Identifier) -> bool {
        self.remaining.remove(identifier.as_str());
        self.visited.insert(identifier.0.clone())
    }

    pub fn is_visited(&self, identifier: &Identifier) -> bool {
        self.visited.contains(identifier.as_str())
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.remaining.len()
    }

    /// Forget identifiers produced by capabilities this crawl does not
    /// list, so they are never mistaken for stale.
    pub fn retain_capabilities(&mut self, capabilities: &[Capability]) {
        self.remaining
            .retain(|id| capabilities.contains(&capability_of(id)));
    }

    /// The identifiers never visited, sorted.
    pub fn into_stale(self) -> Vec<String> {
        let mut stale: Vec<String> = self.remaining.into_iter().collect();
        stale.sort();
        stale
    }
}

/// Mark `identifier` visited, then find or create its resource.
///
/// Marking comes first: an entity seen upstream is never deleted because
/// writing it failed.
pub async fn ensure_handle(
    store: &dyn GraphStore,
    previous: &mut PreviousResourceSet,
    graph: &str,
    identifier: &Identifier,
    classes: &[&str],
) -> Result<(ResourceHandle, bool), StoreError> {
    previous.mark_visited(identifier);
    store
        .find_or_create_resource(graph, identifier.as_str(), classes)
        .await
}
