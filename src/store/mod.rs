//! Graph store abstraction.
//!
//! The [`GraphStore`] trait is the adapter every other component writes
//! through. It models the store as typed resources identified by a
//! store-local URN, bound 1:1 to a provider identifier through
//! `nao:identifier`, carrying (property, value) triples.
//!
//! Implementations must be `Send + Sync`: accounts are crawled
//! concurrently against one shared store, and each call is
//! self-contained (no cross-call transaction state).
//!
//! | Backend | Module |
//! |---------|--------|
//! | In-memory (tests) | [`memory`] |
//! | SQLite triple table | [`sqlite`] |
//! | SPARQL 1.1 endpoint | [`sparql`] |

pub mod memory;
pub mod sparql;
pub mod sqlite;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

/// Store-local reference to a mirrored resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// A fresh `urn:uuid:` handle for a resource about to be created.
    pub fn generate() -> Self {
        Self(format!("urn:uuid:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    Literal(String),
    /// A link to another resource (URN, `mailto:` URI, or prefixed name).
    Resource(String),
    /// Explicitly empty: existing values are cleared and nothing is written.
    Null,
}

impl PropertyValue {
    pub fn literal(value: impl Into<String>) -> Self {
        PropertyValue::Literal(value.into())
    }

    pub fn resource(handle: &ResourceHandle) -> Self {
        PropertyValue::Resource(handle.as_str().to_string())
    }

    /// A literal if present, [`PropertyValue::Null`] otherwise.
    pub fn text(value: Option<&str>) -> Self {
        match value {
            Some(v) => PropertyValue::Literal(v.to_string()),
            None => PropertyValue::Null,
        }
    }

    /// Lexical form of the value, `None` for [`PropertyValue::Null`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Literal(v) | PropertyValue::Resource(v) => Some(v),
            PropertyValue::Null => None,
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, PropertyValue::Resource(_))
    }
}

/// Abstract graph store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_resource`](GraphStore::find_resource) | Look up a handle by identifier and classes |
/// | [`create_resource`](GraphStore::create_resource) | Create a typed resource for an identifier |
/// | [`find_or_create_resource`](GraphStore::find_or_create_resource) | Combination of the two |
/// | [`set_values`](GraphStore::set_values) | Overwrite all values of a property |
/// | [`replace_property`](GraphStore::replace_property) | Swap one exact value for another |
/// | [`toggle_tag`](GraphStore::toggle_tag) | Add or remove a tag |
/// | [`ensure_contact`](GraphStore::ensure_contact) | Deduplicated contact per email |
/// | [`identifiers_for_datasource`](GraphStore::identifiers_for_datasource) | Identifiers owned by an account |
/// | [`delete_resources_by_identifiers`](GraphStore::delete_resources_by_identifiers) | Bulk deletion |
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Find the resource bound to `identifier` that carries every class in
    /// `classes`. An empty class list matches on the identifier alone.
    async fn find_resource(
        &self,
        identifier: &str,
        classes: &[&str],
    ) -> Result<Option<ResourceHandle>, StoreError>;

    /// Create a resource bound to `identifier` with the given classes,
    /// written into `graph`, unless a resource is already bound to it.
    ///
    /// The check and the insert are one atomic step: concurrent callers
    /// for the same identifier all get the same handle. Returns the handle
    /// and whether this call created it; an existing resource is returned
    /// untouched.
    async fn create_resource(
        &self,
        graph: &str,
        identifier: &str,
        classes: &[&str],
    ) -> Result<(ResourceHandle, bool), StoreError>;

    /// Add type tags to an existing resource. Classes already present are
    /// left alone.
    async fn add_classes(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        classes: &[&str],
    ) -> Result<(), StoreError>;

    /// Read one value of a property, if any.
    async fn get_string(
        &self,
        resource: &ResourceHandle,
        property: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Clear every value of `property` on `resource`, then write `values`.
    ///
    /// [`PropertyValue::Null`] entries are ignored; an empty slice leaves
    /// the property cleared.
    async fn set_values(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        values: &[PropertyValue],
    ) -> Result<(), StoreError>;

    /// Delete the exact triple `resource property old`, then write `new`,
    /// as one update. Used where the property must never be multi-valued,
    /// even transiently.
    async fn replace_property(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        old: &str,
        new: &PropertyValue,
    ) -> Result<(), StoreError>;

    /// Add `tag` to the resource's `nao:hasTag` values if `present`,
    /// remove it otherwise.
    async fn toggle_tag(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        tag: &str,
        present: bool,
    ) -> Result<(), StoreError>;

    /// Find the contact linked to `mailto:<email>`.
    async fn find_contact(&self, email: &str) -> Result<Option<ResourceHandle>, StoreError>;

    /// Create the `mailto:` address resource and a contact pointing at it,
    /// unless a contact with that address exists. Atomic like
    /// [`create_resource`](GraphStore::create_resource); returns whichever
    /// contact holds the address afterwards.
    async fn create_contact(
        &self,
        graph: &str,
        email: &str,
        fullname: &str,
    ) -> Result<ResourceHandle, StoreError>;

    /// Every identifier whose resource carries `nie:dataSource <datasource>`.
    async fn identifiers_for_datasource(
        &self,
        datasource: &str,
    ) -> Result<HashSet<String>, StoreError>;

    /// Delete the resources bound to `identifiers`, their triples, and the
    /// sub-resources they own. Returns the number of resources deleted.
    async fn delete_resources_by_identifiers(
        &self,
        identifiers: &[String],
    ) -> Result<u64, StoreError>;

    /// Every (property, value) pair of a resource, sorted by property.
    async fn properties(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<(String, String)>, StoreError>;

    /// Look up `identifier`, creating it when absent.
    ///
    /// Returns the handle and whether it already existed. A resource found
    /// with fewer classes than requested (a parent stub, for instance) is
    /// upgraded in place rather than duplicated.
    async fn find_or_create_resource(
        &self,
        graph: &str,
        identifier: &str,
        classes: &[&str],
    ) -> Result<(ResourceHandle, bool), StoreError> {
        if let Some(found) = self.find_resource(identifier, classes).await? {
            debug!(identifier, resource = %found, "found resource in the store");
            return Ok((found, true));
        }

        let (handle, created) = self.create_resource(graph, identifier, classes).await?;
        if created {
            debug!(identifier, resource = %handle, "created a new resource");
            return Ok((handle, false));
        }

        // Bound already, either with fewer classes or by a concurrent crawl.
        debug!(identifier, resource = %handle, "adding classes to existing resource");
        self.add_classes(graph, &handle, classes).await?;
        Ok((handle, true))
    }

    /// Overwrite a single-valued property.
    async fn set_property(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        value: &PropertyValue,
    ) -> Result<(), StoreError> {
        match value {
            PropertyValue::Null => self.set_values(graph, resource, property, &[]).await,
            v => {
                self.set_values(graph, resource, property, std::slice::from_ref(v))
                    .await
            }
        }
    }

    /// Find or create the contact for `email`.
    async fn ensure_contact(
        &self,
        graph: &str,
        email: &str,
        fullname: &str,
    ) -> Result<ResourceHandle, StoreError> {
        if let Some(found) = self.find_contact(email).await? {
            debug!(email, contact = %found, "found contact in the store");
            return Ok(found);
        }
        let contact = self.create_contact(graph, email, fullname).await?;
        debug!(email, contact = %contact, "ensured contact resource");
        Ok(contact)
    }
}

/// The `mailto:` URI a contact is keyed by.
pub fn mail_uri(email: &str) -> String {
    format!("mailto:{}", email)
}
