//! Entity mappers: provider entities to store triples.
//!
//! Every mapper follows the same shape:
//!
//! 1. resolve the identifier and mark it visited,
//! 2. find or create the resource with the kind's classes,
//! 3. reconcile the data source tag and compare watermarks,
//! 4. stop if unchanged, otherwise overwrite every property,
//! 5. commit the new watermark last.
//!
//! | Module | Entities |
//! |--------|----------|
//! | [`document`] | flat document listings (text, presentation, spreadsheet, drawing, pdf, folder) |
//! | [`photo`] | albums, photos and their camera equipment |
//! | [`tree`] | files and folders of hierarchical listings |

pub mod document;
pub mod photo;
pub mod tree;

use sha2::{Digest, Sha256};

use crate::change::{self, Refresh};
use crate::error::StoreError;
use crate::identity::{self, Identifier, PreviousResourceSet};
use crate::models::{Author, EntityKind};
use crate::ontology::{class, prop};
use crate::provider::ProviderKind;
use crate::store::{GraphStore, PropertyValue, ResourceHandle};

/// Crawl-scoped state every mapper writes through.
pub struct MapContext<'a> {
    pub store: &'a dyn GraphStore,
    pub provider: ProviderKind,
    /// Data source URN of the account; also the graph written into.
    pub datasource: &'a str,
    pub previous: &'a mut PreviousResourceSet,
}

/// What a mapper did with one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Refreshed,
    Unchanged,
    /// Not mirrored at all (and not marked visited).
    Skipped,
}

impl Outcome {
    fn written(existed: bool) -> Self {
        if existed {
            Outcome::Refreshed
        } else {
            Outcome::Created
        }
    }
}

/// Classes of a non-file entity kind, `nfo:RemoteDataObject` first.
pub fn classes_for(kind: EntityKind) -> [&'static str; 2] {
    let specific = match kind {
        EntityKind::Presentation => class::PRESENTATION,
        EntityKind::Spreadsheet => class::SPREADSHEET,
        EntityKind::Text | EntityKind::Drawing | EntityKind::Pdf => class::PAGINATED_TEXT_DOCUMENT,
        EntityKind::Folder | EntityKind::Album => class::DATA_CONTAINER,
        EntityKind::Photo => class::PHOTO,
        EntityKind::File => class::DOCUMENT,
    };
    [class::REMOTE_DATA_OBJECT, specific]
}

/// Mimetype forced for kinds whose provider type is not useful to clients.
pub fn mime_override(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Drawing => Some("application/vnd.sun.xml.draw"),
        EntityKind::Pdf => Some("application/pdf"),
        _ => None,
    }
}

/// Stand-in email for authors the provider only knows by name.
pub fn synthetic_email(fullname: &str) -> String {
    hex::encode(Sha256::digest(fullname.as_bytes()))
}

/// Resource handle plus the refresh decision of a visited entity.
pub(crate) struct Visit {
    pub resource: ResourceHandle,
    pub existed: bool,
    pub refresh: Refresh,
}

impl<'a> MapContext<'a> {
    /// Steps 1 to 3 of the shared mapper shape.
    pub(crate) async fn visit(
        &mut self,
        identifier: &Identifier,
        classes: &[&str],
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Visit, StoreError> {
        let (resource, existed) =
            identity::ensure_handle(self.store, self.previous, self.datasource, identifier, classes)
                .await?;
        change::reconcile_datasource(self.store, self.datasource, &resource, existed).await?;
        let refresh = change::should_refresh(self.store, &resource, existed, updated_at).await;
        Ok(Visit {
            resource,
            existed,
            refresh,
        })
    }

    pub(crate) async fn set(
        &self,
        resource: &ResourceHandle,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), StoreError> {
        self.store
            .set_property(self.datasource, resource, property, &value)
            .await
    }

    /// Link `resource` to its parent containers, creating stubs for
    /// parents not mirrored yet. Stubs are not marked visited but carry the
    /// account's data source, so a parent that is never listed is swept as
    /// stale on the next crawl.
    pub(crate) async fn link_parents(
        &self,
        resource: &ResourceHandle,
        parents: &[Identifier],
    ) -> Result<(), StoreError> {
        let mut links = Vec::with_capacity(parents.len());
        for parent in parents {
            let (stub, existed) = self
                .store
                .find_or_create_resource(
                    self.datasource,
                    parent.as_str(),
                    &[class::REMOTE_DATA_OBJECT, class::DATA_CONTAINER],
                )
                .await?;
            if !existed {
                let tag = PropertyValue::Resource(self.datasource.to_string());
                self.set(&stub, prop::DATA_SOURCE, tag).await?;
            }
            links.push(PropertyValue::resource(&stub));
        }
        self.store
            .set_values(self.datasource, resource, prop::IS_PART_OF, &links)
            .await
    }

    /// Overwrite `property` with one contact per author.
    pub(crate) async fn link_authors(
        &self,
        resource: &ResourceHandle,
        property: &str,
        authors: &[Author],
    ) -> Result<(), StoreError> {
        let mut links = Vec::with_capacity(authors.len());
        for author in authors {
            let email = match author.email.as_deref().filter(|e| !e.is_empty()) {
                Some(email) => email.to_string(),
                None => synthetic_email(&author.name),
            };
            let contact = self
                .store
                .ensure_contact(self.datasource, &email, &author.name)
                .await?;
            links.push(PropertyValue::resource(&contact));
        }
        self.store
            .set_values(self.datasource, resource, property, &links)
            .await
    }

    pub(crate) async fn commit(
        &self,
        resource: &ResourceHandle,
        watermark: change::Watermark,
    ) -> Result<(), StoreError> {
        change::commit_watermark(self.store, self.datasource, resource, watermark).await
    }
}

/// `nie:contentCreated` value for an optional creation time.
pub(crate) fn created_value(created_at: Option<chrono::DateTime<chrono::Utc>>) -> PropertyValue {
    match created_at {
        Some(dt) => PropertyValue::Literal(change::to_iso8601(dt.timestamp())),
        None => PropertyValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_classes() {
        assert_eq!(
            classes_for(EntityKind::Drawing),
            [class::REMOTE_DATA_OBJECT, class::PAGINATED_TEXT_DOCUMENT]
        );
        assert_eq!(classes_for(EntityKind::Album)[1], class::DATA_CONTAINER);
        assert_eq!(mime_override(EntityKind::Pdf), Some("application/pdf"));
        assert_eq!(mime_override(EntityKind::Spreadsheet), None);
    }

    #[test]
    fn test_synthetic_email_is_stable_hex() {
        let a = synthetic_email("Ann Example");
        assert_eq!(a, synthetic_email("Ann Example"));
        assert_ne!(a, synthetic_email("Bob Example"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
