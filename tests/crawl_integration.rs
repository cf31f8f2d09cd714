//! Crawl scenarios driven through `run_crawl` against the in-memory store
//! with in-test provider fakes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use account_harvester::crawl::{run_crawl, run_crawl_with, CrawlOptions, CrawlState};
use account_harvester::{db, migrate};
use account_harvester::error::{CrawlError, ProviderError};
use account_harvester::models::{
    AccessRule, Author, EntityKind, MediaContent, Medium, PhotoAttributes, RemoteEntity, ScopeType,
};
use account_harvester::ontology::{class, prop, RDF_TYPE, STARRED_LABEL, TAG_FAVORITE};
use account_harvester::provider::{
    Account, Capability, DocumentsService, FolderService, PhotosService, ProviderKind,
};
use account_harvester::store::memory::MemoryGraphStore;
use account_harvester::store::sqlite::SqliteGraphStore;
use account_harvester::store::{GraphStore, ResourceHandle};

const T0: i64 = 1_709_287_200;

fn entity(kind: EntityKind, id: &str, updated: i64) -> RemoteEntity {
    RemoteEntity {
        kind,
        id: id.to_string(),
        title: Some(format!("Title {}", id)),
        summary: None,
        url: Some(format!("https://example.com/{}", id)),
        mime_type: None,
        created_at: Utc.timestamp_opt(updated - 3600, 0).single(),
        updated_at: Utc.timestamp_opt(updated, 0).unwrap(),
        parents: Vec::new(),
        authors: Vec::new(),
        categories: Vec::new(),
        media: Vec::new(),
        photo: None,
    }
}

fn author(name: &str, email: Option<&str>) -> Author {
    Author {
        name: name.to_string(),
        email: email.map(str::to_string),
    }
}

fn rule(scope_type: ScopeType, value: Option<&str>) -> AccessRule {
    AccessRule {
        scope_type,
        scope_value: value.map(str::to_string),
    }
}

async fn handle(store: &MemoryGraphStore, identifier: &str) -> ResourceHandle {
    store
        .find_resource(identifier, &[])
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{} not in store", identifier))
}

async fn exists(store: &MemoryGraphStore, identifier: &str) -> bool {
    store.find_resource(identifier, &[]).await.unwrap().is_some()
}

// ═══════════════════════════════════════════════════════════════════════
// Fakes
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct FakeDocs {
    entries: Mutex<Vec<RemoteEntity>>,
    rules: HashMap<String, Vec<AccessRule>>,
    broken: Mutex<HashSet<String>>,
    fail_listing: bool,
    cancel_on_list: Option<CancellationToken>,
}

impl FakeDocs {
    fn new(entries: Vec<RemoteEntity>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    fn set_entries(&self, entries: Vec<RemoteEntity>) {
        *self.entries.lock().unwrap() = entries;
    }
}

#[async_trait]
impl DocumentsService for FakeDocs {
    async fn list_documents(&self) -> Result<Vec<RemoteEntity>, ProviderError> {
        if self.fail_listing {
            return Err(ProviderError::Api("503 service unavailable".into()));
        }
        if let Some(token) = &self.cancel_on_list {
            token.cancel();
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn access_rules(
        &self,
        entity: &RemoteEntity,
    ) -> Result<Vec<AccessRule>, ProviderError> {
        if self.broken.lock().unwrap().contains(&entity.id) {
            return Err(ProviderError::Api(format!("acl for {} forbidden", entity.id)));
        }
        Ok(self.rules.get(&entity.id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakePhotos {
    albums: Mutex<Vec<(RemoteEntity, Vec<RemoteEntity>)>>,
    /// Albums whose photo listing fails.
    throttled: Mutex<HashSet<String>>,
}

impl FakePhotos {
    fn new(albums: Vec<(RemoteEntity, Vec<RemoteEntity>)>) -> Self {
        Self {
            albums: Mutex::new(albums),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PhotosService for FakePhotos {
    async fn list_albums(&self) -> Result<Vec<RemoteEntity>, ProviderError> {
        Ok(self.albums.lock().unwrap().iter().map(|(a, _)| a.clone()).collect())
    }

    async fn list_photos(&self, album: &RemoteEntity) -> Result<Vec<RemoteEntity>, ProviderError> {
        if self.throttled.lock().unwrap().contains(&album.id) {
            return Err(ProviderError::Api("rate limited".into()));
        }
        self.albums
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _)| a.id == album.id)
            .map(|(_, photos)| photos.clone())
            .ok_or_else(|| ProviderError::UnknownAlbum(album.id.clone()))
    }
}

struct FakeTree {
    folders: HashMap<String, Vec<RemoteEntity>>,
}

#[async_trait]
impl FolderService for FakeTree {
    fn root_id(&self) -> &str {
        "root"
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntity>, ProviderError> {
        self.folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownFolder(folder_id.to_string()))
    }
}

fn google(docs: Arc<FakeDocs>) -> Account {
    Account::new("work", ProviderKind::Google).with_documents(docs)
}

// ═══════════════════════════════════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════════════════════════════════

fn rich_listing() -> Vec<RemoteEntity> {
    let mut folder = entity(EntityKind::Folder, "f1", T0);
    folder.title = Some("Projects".into());

    let mut text = entity(EntityKind::Text, "a", T0);
    text.parents = vec!["f1".into()];
    text.authors = vec![author("Ann", Some("ann@example.com"))];
    text.categories = vec![STARRED_LABEL.to_string()];
    text.summary = Some("Quarterly plan".into());

    let mut drawing = entity(EntityKind::Drawing, "b", T0);
    drawing.authors = vec![author("Bob", None)];

    vec![folder, text, drawing]
}

#[tokio::test]
async fn test_unchanged_listing_makes_no_mutations() {
    let store = MemoryGraphStore::new();
    let mut fake = FakeDocs::new(rich_listing());
    fake.rules.insert(
        "a".into(),
        vec![rule(ScopeType::User, Some("carol@example.com"))],
    );
    let account = google(Arc::new(fake));
    let cancel = CancellationToken::new();

    let first = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert_eq!(first.state, CrawlState::Done);
    assert_eq!(first.entities_visited, 3);
    assert!(first.entities_failed.is_empty());

    let before = store.mutation_count();
    let second = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert_eq!(second.state, CrawlState::Done);
    assert_eq!(second.entities_visited, 3);
    assert_eq!(second.entities_deleted, 0);
    assert_eq!(store.mutation_count(), before);
}

#[tokio::test]
async fn test_document_properties_are_written() {
    let store = MemoryGraphStore::new();
    let account = google(Arc::new(FakeDocs::new(rich_listing())));
    let cancel = CancellationToken::new();
    run_crawl(&store, &account, &[Capability::Documents], &cancel).await;

    let a = handle(&store, "google:drive:a").await;
    assert_eq!(store.values(&a, prop::TITLE), vec!["Title a".to_string()]);
    assert_eq!(store.values(&a, prop::DESCRIPTION), vec!["Quarterly plan".to_string()]);
    assert_eq!(store.values(&a, prop::URL), vec!["https://example.com/a".to_string()]);
    assert_eq!(store.values(&a, prop::HAS_TAG), vec![TAG_FAVORITE.to_string()]);
    assert_eq!(
        store.values(&a, prop::DATA_SOURCE),
        vec!["gd:goa-account:work".to_string()]
    );
    assert_eq!(
        store.values(&a, prop::CONTENT_LAST_MODIFIED),
        vec!["2024-03-01T10:00:00Z".to_string()]
    );
    assert_eq!(
        store.values(&a, prop::CONTENT_CREATED),
        vec!["2024-03-01T09:00:00Z".to_string()]
    );
    assert!(store.values(&a, prop::MIME_TYPE).is_empty());

    let folder = handle(&store, "gd:collection:google:drive:f1").await;
    assert_eq!(store.values(&a, prop::IS_PART_OF), vec![folder.to_string()]);
    assert_eq!(store.values(&folder, prop::TITLE), vec!["Projects".to_string()]);

    let b = handle(&store, "google:drive:b").await;
    assert_eq!(
        store.values(&b, prop::MIME_TYPE),
        vec!["application/vnd.sun.xml.draw".to_string()]
    );
    assert!(store
        .find_resource(
            "google:drive:b",
            &[class::REMOTE_DATA_OBJECT, class::PAGINATED_TEXT_DOCUMENT]
        )
        .await
        .unwrap()
        .is_some());
    assert_eq!(store.values(&b, prop::CREATOR).len(), 1);
}

#[tokio::test]
async fn test_stale_resources_are_deleted_and_new_ones_written() {
    let store = MemoryGraphStore::new();
    let docs = Arc::new(FakeDocs::new(vec![
        entity(EntityKind::Text, "A", T0),
        entity(EntityKind::Spreadsheet, "B", T0),
        entity(EntityKind::Presentation, "C", T0),
    ]));
    let account = google(docs.clone());
    let cancel = CancellationToken::new();

    run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    let a_before = handle(&store, "google:drive:A").await;
    let a_title = store.values(&a_before, prop::TITLE);

    docs.set_entries(vec![
        entity(EntityKind::Text, "A", T0),
        entity(EntityKind::Text, "D", T0 + 60),
    ]);
    let result = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;

    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_deleted, 2);
    assert!(!exists(&store, "google:drive:B").await);
    assert!(!exists(&store, "google:drive:C").await);

    let a_after = handle(&store, "google:drive:A").await;
    assert_eq!(a_before, a_after);
    assert_eq!(store.values(&a_after, prop::TITLE), a_title);

    let d = handle(&store, "google:drive:D").await;
    assert_eq!(store.values(&d, prop::TITLE), vec!["Title D".to_string()]);
    assert_eq!(
        store.values(&d, prop::CONTENT_LAST_MODIFIED),
        vec!["2024-03-01T10:01:00Z".to_string()]
    );
}

#[tokio::test]
async fn test_public_rule_is_not_a_contributor() {
    let store = MemoryGraphStore::new();
    let mut fake = FakeDocs::new(vec![entity(EntityKind::Text, "shared", T0)]);
    fake.rules.insert(
        "shared".into(),
        vec![
            rule(ScopeType::Default, None),
            rule(ScopeType::Domain, Some("example.com")),
            rule(ScopeType::User, Some("dave@example.com")),
        ],
    );
    let account = google(Arc::new(fake));
    run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;

    let doc = handle(&store, "google:drive:shared").await;
    let contributors = store.values(&doc, prop::CONTRIBUTOR);
    assert_eq!(contributors.len(), 1);
    let dave = store.find_contact("dave@example.com").await.unwrap().unwrap();
    assert_eq!(contributors[0], dave.to_string());
}

#[tokio::test]
async fn test_one_failing_entity_does_not_abort() {
    let store = MemoryGraphStore::new();
    let fake = FakeDocs::new(vec![
        entity(EntityKind::Text, "ok1", T0),
        entity(EntityKind::Text, "bad", T0),
        entity(EntityKind::Text, "ok2", T0),
    ]);
    fake.broken.lock().unwrap().insert("bad".into());
    let docs = Arc::new(fake);
    let account = google(docs.clone());
    let cancel = CancellationToken::new();

    let result = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_failed.len(), 1);
    assert_eq!(result.entities_failed[0].id, "bad");
    assert!(matches!(
        result.entities_failed[0].error,
        CrawlError::Entity { .. }
    ));
    assert_eq!(result.entities_visited, 3);
    assert!(exists(&store, "google:drive:ok1").await);
    assert!(exists(&store, "google:drive:ok2").await);

    // The failed refresh left no watermark, so the next crawl retries it.
    let bad = handle(&store, "google:drive:bad").await;
    assert!(store.values(&bad, prop::CONTENT_LAST_MODIFIED).is_empty());

    docs.broken.lock().unwrap().clear();
    let retry = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert!(retry.entities_failed.is_empty());
    assert_eq!(retry.entities_deleted, 0);
    assert_eq!(
        store.values(&bad, prop::CONTENT_LAST_MODIFIED),
        vec!["2024-03-01T10:00:00Z".to_string()]
    );
}

#[tokio::test]
async fn test_same_author_email_yields_one_contact() {
    let store = MemoryGraphStore::new();
    let mut one = entity(EntityKind::Text, "one", T0);
    one.authors = vec![author("Ann", Some("ann@example.com"))];
    let mut two = entity(EntityKind::Spreadsheet, "two", T0);
    two.authors = vec![author("Ann B.", Some("ann@example.com"))];
    let mut three = entity(EntityKind::Pdf, "three", T0);
    three.authors = vec![author("Eve", None), author("Eve", None)];

    let account = google(Arc::new(FakeDocs::new(vec![one, two, three])));
    run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;

    assert_eq!(store.count_with_class(class::CONTACT), 2);
    let one = handle(&store, "google:drive:one").await;
    let two = handle(&store, "google:drive:two").await;
    assert_eq!(
        store.values(&one, prop::CREATOR),
        store.values(&two, prop::CREATOR)
    );
}

#[tokio::test]
async fn test_parent_stub_is_upgraded_not_duplicated() {
    let store = MemoryGraphStore::new();
    let mut child = entity(EntityKind::Text, "child", T0);
    child.parents = vec!["folder".into()];
    let mut folder = entity(EntityKind::Folder, "folder", T0);
    folder.title = Some("Shared".into());

    // The child is listed before its folder, so the folder starts as a stub.
    let account = google(Arc::new(FakeDocs::new(vec![child, folder])));
    let result =
        run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;
    assert_eq!(result.entities_visited, 2);

    assert_eq!(store.count_with_class(class::DATA_CONTAINER), 1);
    let folder = handle(&store, "gd:collection:google:drive:folder").await;
    assert_eq!(store.values(&folder, prop::TITLE), vec!["Shared".to_string()]);
    assert_eq!(
        store.values(&folder, prop::DATA_SOURCE),
        vec!["gd:goa-account:work".to_string()]
    );
    let child = handle(&store, "google:drive:child").await;
    assert_eq!(store.values(&child, prop::IS_PART_OF), vec![folder.to_string()]);
}

#[tokio::test]
async fn test_unlisted_parent_stub_is_swept_with_its_child() {
    let store = MemoryGraphStore::new();
    let mut orphan = entity(EntityKind::Text, "orphan", T0);
    orphan.parents = vec!["hidden".into()];
    let docs = Arc::new(FakeDocs::new(vec![orphan]));
    let account = google(docs.clone());
    let cancel = CancellationToken::new();

    let first = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert_eq!(first.entities_visited, 1);
    let stub = handle(&store, "gd:collection:google:drive:hidden").await;
    assert_eq!(
        store.values(&stub, prop::DATA_SOURCE),
        vec!["gd:goa-account:work".to_string()]
    );

    docs.set_entries(Vec::new());
    let result = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_deleted, 2);
    assert!(!exists(&store, "google:drive:orphan").await);
    assert!(!exists(&store, "gd:collection:google:drive:hidden").await);
    assert_eq!(store.count_with_class(class::DATA_CONTAINER), 0);
}

#[tokio::test]
async fn test_failed_listing_aborts_without_deleting() {
    let store = MemoryGraphStore::new();
    let account = google(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "keep", T0)])));
    run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;

    let broken = FakeDocs {
        fail_listing: true,
        ..Default::default()
    };
    let account = google(Arc::new(broken));
    let result =
        run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;

    assert_eq!(result.state, CrawlState::Aborted);
    assert!(matches!(result.fatal, Some(CrawlError::Enumeration(_))));
    assert!(exists(&store, "google:drive:keep").await);
}

#[tokio::test]
async fn test_cancelled_crawl_skips_deletion() {
    let store = MemoryGraphStore::new();
    let account = google(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "old", T0)])));
    run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;

    let cancel = CancellationToken::new();
    let fake = FakeDocs {
        entries: Mutex::new(vec![entity(EntityKind::Text, "new", T0)]),
        cancel_on_list: Some(cancel.clone()),
        ..Default::default()
    };
    let account = google(Arc::new(fake));
    let result = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;

    assert_eq!(result.state, CrawlState::Cancelled);
    assert!(matches!(result.fatal, Some(CrawlError::Cancelled)));
    assert_eq!(result.entities_deleted, 0);
    assert!(exists(&store, "google:drive:old").await);
    assert!(!exists(&store, "google:drive:new").await);
}

#[tokio::test]
async fn test_missing_capability_service_is_skipped() {
    let store = MemoryGraphStore::new();
    let account = google(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "a", T0)])));
    let result = run_crawl(
        &store,
        &account,
        &[Capability::Documents, Capability::Photos],
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_visited, 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Photos
// ═══════════════════════════════════════════════════════════════════════

fn image(id: &str, updated: i64) -> RemoteEntity {
    let mut photo = entity(EntityKind::Photo, id, updated);
    photo.media = vec![MediaContent {
        medium: Medium::Image,
        content_type: Some("image/jpeg".into()),
    }];
    photo.authors = vec![author("Ann Example", None)];
    photo.photo = Some(PhotoAttributes {
        width: Some(4000),
        height: Some(3000),
        exposure: Some(0.004),
        focal_length: Some(35.0),
        fstop: Some(2.8),
        iso: Some(200),
        flash: Some(false),
        make: Some("Canon".into()),
        model: Some("EOS R6".into()),
    });
    photo
}

fn photos_account(photos: Arc<FakePhotos>) -> Account {
    Account::new("work", ProviderKind::Google).with_photos(photos)
}

#[tokio::test]
async fn test_video_in_album_is_skipped_without_error() {
    let store = MemoryGraphStore::new();
    let mut video = entity(EntityKind::Photo, "clip", T0);
    video.media = vec![MediaContent {
        medium: Medium::Video,
        content_type: Some("video/mp4".into()),
    }];
    let album = entity(EntityKind::Album, "trip", T0);
    let account = photos_account(Arc::new(FakePhotos::new(vec![(
        album,
        vec![image("beach", T0), video],
    )])));

    let result =
        run_crawl(&store, &account, &[Capability::Photos], &CancellationToken::new()).await;
    assert_eq!(result.state, CrawlState::Done);
    assert!(result.entities_failed.is_empty());
    assert_eq!(result.entities_visited, 2);
    assert!(exists(&store, "google:picasaweb:beach").await);
    assert!(!exists(&store, "google:picasaweb:clip").await);
}

#[tokio::test]
async fn test_photo_properties_and_equipment() {
    let store = MemoryGraphStore::new();
    let album = entity(EntityKind::Album, "trip", T0);
    let account = photos_account(Arc::new(FakePhotos::new(vec![(
        album,
        vec![image("beach", T0)],
    )])));
    run_crawl(&store, &account, &[Capability::Photos], &CancellationToken::new()).await;

    let album = handle(&store, "photos:collection:google:picasaweb:trip").await;
    let photo = handle(&store, "google:picasaweb:beach").await;
    assert_eq!(store.values(&photo, prop::IS_PART_OF), vec![album.to_string()]);
    assert_eq!(store.values(&photo, prop::MIME_TYPE), vec!["image/jpeg".to_string()]);
    assert_eq!(store.values(&photo, prop::WIDTH), vec!["4000".to_string()]);
    assert_eq!(store.values(&photo, prop::ISO_SPEED), vec!["200".to_string()]);
    assert_eq!(store.values(&photo, prop::FLASH), vec!["nmm:flash-off".to_string()]);

    let camera = handle(&store, "google:picasaweb:beach#equipment").await;
    assert_eq!(store.values(&photo, prop::EQUIPMENT), vec![camera.to_string()]);
    assert_eq!(store.values(&camera, prop::MANUFACTURER), vec!["Canon".to_string()]);
    assert_eq!(store.values(&camera, prop::MODEL), vec!["EOS R6".to_string()]);

    // A creator known only by name gets a synthetic address.
    assert_eq!(store.values(&photo, prop::CREATOR).len(), 1);
    assert_eq!(store.count_with_class(class::CONTACT), 1);
}

#[tokio::test]
async fn test_equipment_follows_its_photo() {
    let store = MemoryGraphStore::new();
    let album = entity(EntityKind::Album, "trip", T0);
    let photos = Arc::new(FakePhotos::new(vec![(album.clone(), vec![image("beach", T0)])]));
    let account = photos_account(photos.clone());
    let cancel = CancellationToken::new();
    run_crawl(&store, &account, &[Capability::Photos], &cancel).await;
    assert_eq!(store.count_with_class(class::EQUIPMENT), 1);

    let mut edited = image("beach", T0 + 10);
    if let Some(attrs) = edited.photo.as_mut() {
        attrs.make = None;
        attrs.model = None;
    }
    *photos.albums.lock().unwrap() = vec![(album.clone(), vec![edited])];
    run_crawl(&store, &account, &[Capability::Photos], &cancel).await;
    assert_eq!(store.count_with_class(class::EQUIPMENT), 0);
    let photo = handle(&store, "google:picasaweb:beach").await;
    assert!(store.values(&photo, prop::EQUIPMENT).is_empty());

    *photos.albums.lock().unwrap() = vec![(album, vec![image("dune", T0)])];
    let result = run_crawl(&store, &account, &[Capability::Photos], &cancel).await;
    assert_eq!(result.entities_deleted, 1);
    assert!(!exists(&store, "google:picasaweb:beach").await);
    assert_eq!(store.count_with_class(class::EQUIPMENT), 1);
}

#[tokio::test]
async fn test_unchanged_album_still_processes_photos() {
    let store = MemoryGraphStore::new();
    let album = entity(EntityKind::Album, "trip", T0);
    let photos = Arc::new(FakePhotos::new(vec![(album.clone(), vec![image("one", T0)])]));
    let account = photos_account(photos.clone());
    let cancel = CancellationToken::new();
    run_crawl(&store, &account, &[Capability::Photos], &cancel).await;

    *photos.albums.lock().unwrap() = vec![(album, vec![image("one", T0), image("two", T0)])];
    let result = run_crawl(&store, &account, &[Capability::Photos], &cancel).await;
    assert_eq!(result.entities_visited, 3);
    let two = handle(&store, "google:picasaweb:two").await;
    let album = handle(&store, "photos:collection:google:picasaweb:trip").await;
    assert_eq!(store.values(&two, prop::IS_PART_OF), vec![album.to_string()]);
}

// ═══════════════════════════════════════════════════════════════════════
// Folder trees
// ═══════════════════════════════════════════════════════════════════════

fn file(id: &str, name: &str) -> RemoteEntity {
    let mut e = entity(EntityKind::File, id, T0);
    e.title = Some(name.to_string());
    e.url = None;
    e.authors = vec![author("Frank", None)];
    e
}

fn folder(id: &str) -> RemoteEntity {
    let mut e = entity(EntityKind::Folder, id, T0);
    e.url = None;
    e
}

fn tree_account(folders: Vec<(&str, Vec<RemoteEntity>)>) -> Account {
    let tree = FakeTree {
        folders: folders
            .into_iter()
            .map(|(id, children)| (id.to_string(), children))
            .collect(),
    };
    Account::new("drive", ProviderKind::WindowsLive).with_folders(Arc::new(tree))
}

#[tokio::test]
async fn test_tree_files_and_folders() {
    let store = MemoryGraphStore::new();
    let account = tree_account(vec![
        ("root", vec![folder("folder.1"), file("file.1", "deck.pptx")]),
        (
            "folder.1",
            vec![file("file.2", "notes.txt"), entity(EntityKind::Photo, "photo.1", T0)],
        ),
    ]);
    let result =
        run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_visited, 3);
    assert!(!exists(&store, "windows-live:skydrive:photo.1").await);

    let deck = handle(&store, "windows-live:skydrive:file.1").await;
    assert!(store
        .find_resource("windows-live:skydrive:file.1", &[class::PRESENTATION])
        .await
        .unwrap()
        .is_some());
    assert_eq!(store.values(&deck, prop::FILE_NAME), vec!["deck.pptx".to_string()]);
    assert_eq!(
        store.values(&deck, prop::URL),
        vec!["windows-live:skydrive:file.1".to_string()]
    );
    assert!(store.values(&deck, prop::IS_PART_OF).is_empty());

    let notes = handle(&store, "windows-live:skydrive:file.2").await;
    let folder = handle(&store, "gd:collection:windows-live:skydrive:folder.1").await;
    assert_eq!(store.values(&notes, prop::IS_PART_OF), vec![folder.to_string()]);
    assert_eq!(store.values(&notes, prop::MIME_TYPE), vec!["text/plain".to_string()]);
    assert_eq!(store.count_with_class(class::DATA_CONTAINER), 1);
}

#[tokio::test]
async fn test_cyclic_tree_terminates() {
    let store = MemoryGraphStore::new();
    let account = tree_account(vec![
        ("root", vec![folder("a")]),
        ("a", vec![folder("b")]),
        ("b", vec![folder("a"), file("f", "loop.txt")]),
    ]);
    let result =
        run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_visited, 3);
    assert!(result.entities_failed.is_empty());
}

#[tokio::test]
async fn test_depth_limit_keeps_unlisted_resources() {
    let store = MemoryGraphStore::new();
    let account = tree_account(vec![
        ("root", vec![folder("a")]),
        ("a", vec![file("deep", "deep.txt")]),
    ]);
    let cancel = CancellationToken::new();
    run_crawl(&store, &account, &[Capability::Documents], &cancel).await;
    assert!(exists(&store, "windows-live:skydrive:deep").await);

    let shallow = CrawlOptions {
        max_folder_depth: 1,
    };
    let result =
        run_crawl_with(&store, &account, &[Capability::Documents], &shallow, &cancel).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_visited, 1);
    assert_eq!(result.entities_deleted, 0);
    assert_eq!(result.deletions_skipped, vec![Capability::Documents]);
    assert!(exists(&store, "windows-live:skydrive:deep").await);
}

#[tokio::test]
async fn test_unreadable_subfolder_is_an_entity_failure() {
    let store = MemoryGraphStore::new();
    let account = tree_account(vec![(
        "root",
        vec![folder("gone"), file("kept", "kept.txt")],
    )]);
    let result =
        run_crawl(&store, &account, &[Capability::Documents], &CancellationToken::new()).await;
    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_failed.len(), 1);
    assert_eq!(result.entities_failed[0].id, "gone");
    assert!(exists(&store, "windows-live:skydrive:kept").await);
}

#[tokio::test]
async fn test_accounts_are_scoped_by_datasource() {
    let store = MemoryGraphStore::new();
    let cancel = CancellationToken::new();
    let work = google(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "w", T0)])));
    let home = Account::new("home", ProviderKind::Google)
        .with_documents(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "h", T0)])));

    run_crawl(&store, &work, &[Capability::Documents], &cancel).await;
    run_crawl(&store, &home, &[Capability::Documents], &cancel).await;

    let emptied = google(Arc::new(FakeDocs::new(Vec::new())));
    let result = run_crawl(&store, &emptied, &[Capability::Documents], &cancel).await;
    assert_eq!(result.entities_deleted, 1);
    assert!(!exists(&store, "google:drive:w").await);
    assert!(exists(&store, "google:drive:h").await);
}

#[tokio::test]
async fn test_partial_capability_crawl_keeps_other_resources() {
    let store = MemoryGraphStore::new();
    let cancel = CancellationToken::new();
    let album = entity(EntityKind::Album, "trip", T0);
    let account = Account::new("work", ProviderKind::Google)
        .with_documents(Arc::new(FakeDocs::new(vec![entity(EntityKind::Text, "a", T0)])))
        .with_photos(Arc::new(FakePhotos::new(vec![(album, vec![image("beach", T0)])])));

    run_crawl(&store, &account, &[Capability::Documents, Capability::Photos], &cancel).await;
    let result = run_crawl(&store, &account, &[Capability::Documents], &cancel).await;

    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_deleted, 0);
    assert!(exists(&store, "google:picasaweb:beach").await);
    assert!(exists(&store, "photos:collection:google:picasaweb:trip").await);
}

#[tokio::test]
async fn test_throttled_album_keeps_photos_but_deletes_documents() {
    let store = MemoryGraphStore::new();
    let cancel = CancellationToken::new();
    let album = entity(EntityKind::Album, "trip", T0);
    let docs = Arc::new(FakeDocs::new(vec![
        entity(EntityKind::Text, "A", T0),
        entity(EntityKind::Text, "B", T0),
    ]));
    let photos = Arc::new(FakePhotos::new(vec![(album, vec![image("beach", T0)])]));
    let account = Account::new("work", ProviderKind::Google)
        .with_documents(docs.clone())
        .with_photos(photos.clone());
    let both = [Capability::Documents, Capability::Photos];

    let first = run_crawl(&store, &account, &both, &cancel).await;
    assert!(first.deletions_skipped.is_empty());

    docs.set_entries(vec![entity(EntityKind::Text, "A", T0)]);
    photos.throttled.lock().unwrap().insert("trip".into());
    let result = run_crawl(&store, &account, &both, &cancel).await;

    assert_eq!(result.state, CrawlState::Done);
    assert_eq!(result.entities_failed.len(), 1);
    assert_eq!(result.entities_failed[0].id, "trip");
    assert_eq!(result.deletions_skipped, vec![Capability::Photos]);
    assert_eq!(result.entities_deleted, 1);
    assert!(exists(&store, "google:drive:A").await);
    assert!(!exists(&store, "google:drive:B").await);
    assert!(exists(&store, "google:picasaweb:beach").await);
    assert!(exists(&store, "photos:collection:google:picasaweb:trip").await);
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrent accounts
// ═══════════════════════════════════════════════════════════════════════

fn shared_listing() -> Vec<RemoteEntity> {
    (0..6)
        .map(|n| {
            let mut doc = entity(EntityKind::Text, &format!("shared-{}", n), T0);
            doc.parents = vec!["team".into()];
            doc.authors = vec![author("Ann", Some("ann@example.com"))];
            doc
        })
        .collect()
}

async fn count_subjects(pool: &sqlx::SqlitePool, predicate: &str, object: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(DISTINCT subject) FROM triples WHERE predicate = ? AND object = ?",
    )
    .bind(predicate)
    .bind(object)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accounts_share_one_resource_per_identifier() {
    for round in 0..10 {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("harvest.sqlite")).await.unwrap();
        migrate::create_schema(&pool).await.unwrap();
        let store = Arc::new(SqliteGraphStore::new(pool.clone()));

        let mut tasks = Vec::new();
        for name in ["work", "home"] {
            let store = store.clone();
            let account = Account::new(name, ProviderKind::Google)
                .with_documents(Arc::new(FakeDocs::new(shared_listing())));
            tasks.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                run_crawl(store.as_ref(), &account, &[Capability::Documents], &cancel).await
            }));
        }
        for task in tasks {
            let result = task.await.unwrap();
            assert_eq!(result.state, CrawlState::Done, "round {}", round);
            assert!(
                result.entities_failed.is_empty(),
                "round {}: {:?}",
                round,
                result.entities_failed
            );
        }

        for n in 0..6 {
            let id = format!("google:drive:shared-{}", n);
            assert_eq!(count_subjects(&pool, prop::IDENTIFIER, &id).await, 1, "round {}", round);
        }
        assert_eq!(
            count_subjects(&pool, RDF_TYPE, class::PAGINATED_TEXT_DOCUMENT).await,
            6,
            "round {}",
            round
        );
        assert_eq!(count_subjects(&pool, RDF_TYPE, class::DATA_CONTAINER).await, 1, "round {}", round);
        assert_eq!(count_subjects(&pool, RDF_TYPE, class::CONTACT).await, 1, "round {}", round);
        pool.close().await;
    }
}
