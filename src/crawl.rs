//! Crawl orchestration for one account.
//!
//! ```text
//! INIT → LOAD_PREVIOUS → ENUMERATE → (PROCESS_ENTITY)* → RECONCILE_DELETIONS → DONE
//!              │              │                                    ▲
//!              └── fatal ─────┴──────────► ABORTED                 │
//!         any await raced against the token ──► CANCELLED (no deletions)
//! ```
//!
//! Per-entity failures are recorded in [`CrawlResult::entities_failed`]
//! and never stop the crawl. Stale resources of a capability are only
//! deleted when every listing that capability needed was obtained;
//! otherwise an entity that simply was not listed could be mistaken for one
//! removed upstream. A failed album listing holds back photo deletions but
//! not document deletions.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::identity::PreviousResourceSet;
use crate::mapper::{document, photo, tree, MapContext, Outcome};
use crate::models::{EntityKind, RemoteEntity};
use crate::provider::{Account, Capability, DocumentsService, FolderService, PhotosService};
use crate::store::GraphStore;

/// Traversal limits.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Folders nested deeper than this are not listed.
    pub max_folder_depth: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_folder_depth: 64,
        }
    }
}

/// Terminal state of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Done,
    Aborted,
    Cancelled,
}

/// An entity whose mirroring failed.
#[derive(Debug)]
pub struct EntityFailure {
    pub id: String,
    pub error: CrawlError,
}

#[derive(Debug)]
pub struct CrawlResult {
    pub account: String,
    /// Identifiers seen upstream during this crawl, failed ones included.
    pub entities_visited: usize,
    pub entities_failed: Vec<EntityFailure>,
    pub entities_deleted: u64,
    /// Capabilities whose stale resources were kept because a listing failed.
    pub deletions_skipped: Vec<Capability>,
    pub fatal: Option<CrawlError>,
    pub state: CrawlState,
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, CrawlError>
where
    F: Future<Output = Result<T, CrawlError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        result = fut => result,
    }
}

struct Crawl<'a> {
    ctx: MapContext<'a>,
    cancel: &'a CancellationToken,
    options: &'a CrawlOptions,
    failures: Vec<EntityFailure>,
    /// Capabilities with some listing that could not be obtained.
    incomplete: BTreeSet<Capability>,
}

impl<'a> Crawl<'a> {
    /// Record a per-entity outcome. Only cancellation propagates.
    fn record(&mut self, id: &str, result: Result<Outcome, CrawlError>) -> Result<(), CrawlError> {
        match result {
            Ok(outcome) => {
                debug!(id, ?outcome, "processed entity");
                Ok(())
            }
            Err(CrawlError::Cancelled) => Err(CrawlError::Cancelled),
            Err(e) => {
                self.fail(id, e);
                Ok(())
            }
        }
    }

    fn fail(&mut self, id: &str, error: CrawlError) {
        let error = CrawlError::Entity {
            id: id.to_string(),
            source: Box::new(error),
        };
        warn!(datasource = self.ctx.datasource, "{}", error);
        self.failures.push(EntityFailure {
            id: id.to_string(),
            error,
        });
    }

    async fn documents(&mut self, account: &Account) -> Result<(), CrawlError> {
        if let Some(service) = account.documents.clone() {
            self.document_listing(service.as_ref()).await
        } else if let Some(service) = account.folders.clone() {
            self.folder_tree(service.as_ref()).await
        } else {
            debug!(account = %account.name, "no documents service, skipping");
            Ok(())
        }
    }

    async fn document_listing(&mut self, service: &dyn DocumentsService) -> Result<(), CrawlError> {
        let entries = cancellable(self.cancel, async {
            service.list_documents().await.map_err(CrawlError::Enumeration)
        })
        .await?;
        debug!(count = entries.len(), "listed documents");

        for entity in &entries {
            let result = cancellable(
                self.cancel,
                document::map_document(&mut self.ctx, service, entity),
            )
            .await;
            self.record(&entity.id, result)?;
        }
        Ok(())
    }

    async fn photos(&mut self, account: &Account) -> Result<(), CrawlError> {
        let Some(service) = account.photos.clone() else {
            debug!(account = %account.name, "no photos service, skipping");
            return Ok(());
        };
        let service = service.as_ref();

        let albums = cancellable(self.cancel, async {
            service.list_albums().await.map_err(CrawlError::Enumeration)
        })
        .await?;
        debug!(count = albums.len(), "listed albums");

        for album in &albums {
            self.album(service, album).await?;
        }
        Ok(())
    }

    async fn album(
        &mut self,
        service: &dyn PhotosService,
        album: &RemoteEntity,
    ) -> Result<(), CrawlError> {
        let mapped = cancellable(self.cancel, photo::map_album(&mut self.ctx, album)).await;
        let handle = match mapped {
            Ok((handle, outcome)) => {
                debug!(id = %album.id, ?outcome, "processed album");
                handle
            }
            Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
            Err(e) => {
                self.fail(&album.id, e);
                self.incomplete.insert(Capability::Photos);
                return Ok(());
            }
        };

        let listed = cancellable(self.cancel, async {
            service.list_photos(album).await.map_err(CrawlError::Provider)
        })
        .await;
        let photos = match listed {
            Ok(photos) => photos,
            Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
            Err(e) => {
                self.fail(&album.id, e);
                self.incomplete.insert(Capability::Photos);
                return Ok(());
            }
        };

        for entry in &photos {
            let result = cancellable(
                self.cancel,
                photo::map_photo(&mut self.ctx, entry, &handle),
            )
            .await;
            self.record(&entry.id, result)?;
        }
        Ok(())
    }

    /// Depth-first walk over an explicit work stack. Each folder is listed
    /// at most once, so cyclic listings terminate.
    async fn folder_tree(&mut self, service: &dyn FolderService) -> Result<(), CrawlError> {
        let root = service.root_id().to_string();
        let mut stack = vec![(root.clone(), 0usize)];
        let mut seen: HashSet<String> = HashSet::from([root.clone()]);

        while let Some((folder_id, depth)) = stack.pop() {
            let listed = cancellable(self.cancel, async {
                service
                    .list_children(&folder_id)
                    .await
                    .map_err(CrawlError::Provider)
            })
            .await;
            let children = match listed {
                Ok(children) => children,
                Err(CrawlError::Provider(e)) if folder_id == root => {
                    return Err(CrawlError::Enumeration(e))
                }
                Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
                Err(e) => {
                    self.fail(&folder_id, e);
                    self.incomplete.insert(Capability::Documents);
                    continue;
                }
            };

            let parent = (folder_id != root).then_some(folder_id.as_str());
            for child in &children {
                if child.kind == EntityKind::Photo {
                    debug!(id = %child.id, "skipping photo entry in folder listing");
                    continue;
                }

                let result = cancellable(
                    self.cancel,
                    tree::map_tree_entry(&mut self.ctx, child, parent),
                )
                .await;
                self.record(&child.id, result)?;

                if child.kind != EntityKind::Folder {
                    continue;
                }
                if depth + 1 >= self.options.max_folder_depth {
                    warn!(id = %child.id, depth = depth + 1, "folder depth limit reached, not descending");
                    self.incomplete.insert(Capability::Documents);
                } else if seen.insert(child.id.clone()) {
                    stack.push((child.id.clone(), depth + 1));
                } else {
                    debug!(id = %child.id, "folder already listed, not descending again");
                }
            }
        }
        Ok(())
    }
}

/// Crawl `account` with default options.
pub async fn run_crawl(
    store: &dyn GraphStore,
    account: &Account,
    capabilities: &[Capability],
    cancel: &CancellationToken,
) -> CrawlResult {
    run_crawl_with(store, account, capabilities, &CrawlOptions::default(), cancel).await
}

/// Crawl `account` for the requested capabilities and reconcile deletions.
pub async fn run_crawl_with(
    store: &dyn GraphStore,
    account: &Account,
    capabilities: &[Capability],
    options: &CrawlOptions,
    cancel: &CancellationToken,
) -> CrawlResult {
    let datasource = account.datasource();
    let mut result = CrawlResult {
        account: account.name.clone(),
        entities_visited: 0,
        entities_failed: Vec::new(),
        entities_deleted: 0,
        deletions_skipped: Vec::new(),
        fatal: None,
        state: CrawlState::Done,
    };
    info!(account = %account.name, provider = %account.provider, "starting crawl");

    let loaded = cancellable(cancel, async {
        PreviousResourceSet::load(store, &datasource)
            .await
            .map_err(CrawlError::from)
    })
    .await;
    let mut previous = match loaded {
        Ok(previous) => previous,
        Err(e) => return finish_fatal(result, e),
    };
    debug!(count = previous.remaining_count(), "loaded previously mirrored identifiers");

    let requested: BTreeSet<Capability> = capabilities.iter().copied().collect();
    let scope: Vec<Capability> = requested.iter().copied().collect();
    previous.retain_capabilities(&scope);
    let (failures, incomplete, fatal) = {
        let mut crawl = Crawl {
            ctx: MapContext {
                store,
                provider: account.provider,
                datasource: &datasource,
                previous: &mut previous,
            },
            cancel,
            options,
            failures: Vec::new(),
            incomplete: BTreeSet::new(),
        };
        let mut fatal = None;
        for capability in requested {
            let step = match capability {
                Capability::Documents => crawl.documents(account).await,
                Capability::Photos => crawl.photos(account).await,
            };
            if let Err(e) = step {
                fatal = Some(e);
                break;
            }
        }
        (crawl.failures, crawl.incomplete, fatal)
    };

    result.entities_visited = previous.visited_count();
    result.entities_failed = failures;
    if let Some(e) = fatal {
        return finish_fatal(result, e);
    }

    if !incomplete.is_empty() {
        let complete: Vec<Capability> = scope
            .iter()
            .copied()
            .filter(|c| !incomplete.contains(c))
            .collect();
        let before = previous.remaining_count();
        previous.retain_capabilities(&complete);
        warn!(
            account = %account.name,
            skipped = ?incomplete,
            "some listings were incomplete, keeping {} unvisited resources",
            before - previous.remaining_count()
        );
        result.deletions_skipped = incomplete.into_iter().collect();
    }

    let stale = previous.into_stale();
    if !stale.is_empty() {
        debug!(count = stale.len(), "deleting resources no longer upstream");
        let deleted = cancellable(cancel, async {
            store
                .delete_resources_by_identifiers(&stale)
                .await
                .map_err(CrawlError::from)
        })
        .await;
        match deleted {
            Ok(count) => result.entities_deleted = count,
            Err(e) => return finish_fatal(result, e),
        }
    }

    info!(
        account = %result.account,
        visited = result.entities_visited,
        failed = result.entities_failed.len(),
        deleted = result.entities_deleted,
        "crawl finished"
    );
    result
}

fn finish_fatal(mut result: CrawlResult, error: CrawlError) -> CrawlResult {
    result.state = match error {
        CrawlError::Cancelled => CrawlState::Cancelled,
        _ => CrawlState::Aborted,
    };
    warn!(account = %result.account, error = %error, state = ?result.state, "crawl stopped");
    result.fatal = Some(error);
    result
}
