//! In-memory [`GraphStore`] implementation for tests.
//!
//! Keeps every triple in a `Vec` behind `std::sync::RwLock`. Each write
//! call bumps a mutation counter, which lets tests assert that an
//! unchanged crawl leaves the store untouched.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ontology::{class, prop, OWNED_PROPERTIES, RDF_TYPE};

use super::{mail_uri, GraphStore, PropertyValue, ResourceHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Triple {
    graph: String,
    subject: String,
    predicate: String,
    object: String,
    is_resource: bool,
}

impl Triple {
    fn new(graph: &str, subject: &str, predicate: &str, object: &PropertyValue) -> Option<Self> {
        object.as_str().map(|o| Self {
            graph: graph.to_string(),
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: o.to_string(),
            is_resource: object.is_resource(),
        })
    }

    fn matches(&self, subject: &str, predicate: &str) -> bool {
        self.subject == subject && self.predicate == predicate
    }
}

/// In-memory graph store.
#[derive(Default)]
pub struct MemoryGraphStore {
    triples: RwLock<Vec<Triple>>,
    mutations: AtomicU64,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls issued so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Number of distinct subjects typed with `class`.
    pub fn count_with_class(&self, class: &str) -> usize {
        self.read()
            .iter()
            .filter(|t| t.predicate == RDF_TYPE && t.object == class)
            .map(|t| t.subject.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Every value of `property` on `resource`, in insertion order.
    pub fn values(&self, resource: &ResourceHandle, property: &str) -> Vec<String> {
        self.read()
            .iter()
            .filter(|t| t.matches(resource.as_str(), property))
            .map(|t| t.object.clone())
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Triple>> {
        self.triples.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Triple>> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.write_unmarked()
    }

    /// Write lock for calls that may turn out not to write anything.
    fn write_unmarked(&self) -> RwLockWriteGuard<'_, Vec<Triple>> {
        self.triples.write().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn subjects_where(triples: &[Triple], predicate: &str, object: &str) -> Vec<String> {
        triples
            .iter()
            .filter(|t| t.predicate == predicate && t.object == object)
            .map(|t| t.subject.clone())
            .collect()
    }

    fn has(triples: &[Triple], subject: &str, predicate: &str, object: &str) -> bool {
        triples
            .iter()
            .any(|t| t.matches(subject, predicate) && t.object == object)
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn find_resource(
        &self,
        identifier: &str,
        classes: &[&str],
    ) -> Result<Option<ResourceHandle>, StoreError> {
        let triples = self.read();
        let found = Self::subjects_where(&triples, prop::IDENTIFIER, identifier)
            .into_iter()
            .find(|s| classes.iter().all(|c| Self::has(&triples, s, RDF_TYPE, c)));
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_resource(
        &self,
        graph: &str,
        identifier: &str,
        classes: &[&str],
    ) -> Result<(ResourceHandle, bool), StoreError> {
        let mut triples = self.write_unmarked();
        if let Some(bound) = Self::subjects_where(&triples, prop::IDENTIFIER, identifier)
            .into_iter()
            .next()
        {
            return Ok((ResourceHandle::new(bound), false));
        }

        self.mark_mutation();
        let handle = ResourceHandle::generate();
        for c in classes {
            triples.extend(Triple::new(
                graph,
                handle.as_str(),
                RDF_TYPE,
                &PropertyValue::Resource(c.to_string()),
            ));
        }
        triples.extend(Triple::new(
            graph,
            handle.as_str(),
            prop::IDENTIFIER,
            &PropertyValue::literal(identifier),
        ));
        Ok((handle, true))
    }

    async fn add_classes(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        classes: &[&str],
    ) -> Result<(), StoreError> {
        let mut triples = self.write();
        for c in classes {
            if !Self::has(&triples, resource.as_str(), RDF_TYPE, c) {
                triples.extend(Triple::new(
                    graph,
                    resource.as_str(),
                    RDF_TYPE,
                    &PropertyValue::Resource(c.to_string()),
                ));
            }
        }
        Ok(())
    }

    async fn get_string(
        &self,
        resource: &ResourceHandle,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .read()
            .iter()
            .find(|t| t.matches(resource.as_str(), property))
            .map(|t| t.object.clone()))
    }

    async fn set_values(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        values: &[PropertyValue],
    ) -> Result<(), StoreError> {
        let mut triples = self.write();
        triples.retain(|t| !t.matches(resource.as_str(), property));
        for v in values {
            if let Some(t) = Triple::new(graph, resource.as_str(), property, v) {
                if !triples.contains(&t) {
                    triples.push(t);
                }
            }
        }
        Ok(())
    }

    async fn replace_property(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        old: &str,
        new: &PropertyValue,
    ) -> Result<(), StoreError> {
        let mut triples = self.write();
        triples.retain(|t| !(t.matches(resource.as_str(), property) && t.object == old));
        triples.extend(Triple::new(graph, resource.as_str(), property, new));
        Ok(())
    }

    async fn toggle_tag(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        tag: &str,
        present: bool,
    ) -> Result<(), StoreError> {
        let mut triples = self.write();
        let tagged = Self::has(&triples, resource.as_str(), prop::HAS_TAG, tag);
        if present && !tagged {
            triples.extend(Triple::new(
                graph,
                resource.as_str(),
                prop::HAS_TAG,
                &PropertyValue::Resource(tag.to_string()),
            ));
        } else if !present {
            triples.retain(|t| !(t.matches(resource.as_str(), prop::HAS_TAG) && t.object == tag));
        }
        Ok(())
    }

    async fn find_contact(&self, email: &str) -> Result<Option<ResourceHandle>, StoreError> {
        let triples = self.read();
        let found = Self::subjects_where(&triples, prop::HAS_EMAIL_ADDRESS, &mail_uri(email))
            .into_iter()
            .find(|s| Self::has(&triples, s, RDF_TYPE, class::CONTACT));
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_contact(
        &self,
        graph: &str,
        email: &str,
        fullname: &str,
    ) -> Result<ResourceHandle, StoreError> {
        let mail = mail_uri(email);
        let mut triples = self.write_unmarked();
        if let Some(existing) = Self::subjects_where(&triples, prop::HAS_EMAIL_ADDRESS, &mail)
            .into_iter()
            .find(|s| Self::has(&triples, s, RDF_TYPE, class::CONTACT))
        {
            return Ok(ResourceHandle::new(existing));
        }

        self.mark_mutation();
        let contact = ResourceHandle::generate();
        if !Self::has(&triples, &mail, RDF_TYPE, class::EMAIL_ADDRESS) {
            triples.extend(Triple::new(
                graph,
                &mail,
                RDF_TYPE,
                &PropertyValue::Resource(class::EMAIL_ADDRESS.to_string()),
            ));
            triples.extend(Triple::new(
                graph,
                &mail,
                prop::EMAIL_ADDRESS,
                &PropertyValue::literal(email),
            ));
        }
        let c = contact.as_str();
        triples.extend(Triple::new(
            graph,
            c,
            RDF_TYPE,
            &PropertyValue::Resource(class::CONTACT.to_string()),
        ));
        triples.extend(Triple::new(
            graph,
            c,
            prop::HAS_EMAIL_ADDRESS,
            &PropertyValue::Resource(mail),
        ));
        triples.extend(Triple::new(
            graph,
            c,
            prop::FULLNAME,
            &PropertyValue::literal(fullname),
        ));
        Ok(contact)
    }

    async fn identifiers_for_datasource(
        &self,
        datasource: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let triples = self.read();
        let owned: HashSet<String> = Self::subjects_where(&triples, prop::DATA_SOURCE, datasource)
            .into_iter()
            .collect();
        Ok(triples
            .iter()
            .filter(|t| t.predicate == prop::IDENTIFIER && owned.contains(&t.subject))
            .map(|t| t.object.clone())
            .collect())
    }

    async fn delete_resources_by_identifiers(
        &self,
        identifiers: &[String],
    ) -> Result<u64, StoreError> {
        if identifiers.is_empty() {
            return Ok(0);
        }
        let mut triples = self.write();
        let mut doomed: HashSet<String> = identifiers
            .iter()
            .flat_map(|id| Self::subjects_where(&triples, prop::IDENTIFIER, id))
            .collect();
        let deleted = doomed.len() as u64;

        let owned: Vec<String> = triples
            .iter()
            .filter(|t| doomed.contains(&t.subject) && OWNED_PROPERTIES.contains(&t.predicate.as_str()))
            .map(|t| t.object.clone())
            .collect();
        doomed.extend(owned);

        triples.retain(|t| !doomed.contains(&t.subject) && !(t.is_resource && doomed.contains(&t.object)));
        Ok(deleted)
    }

    async fn properties(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let mut props: Vec<(String, String)> = self
            .read()
            .iter()
            .filter(|t| t.subject == resource.as_str())
            .map(|t| (t.predicate.clone(), t.object.clone()))
            .collect();
        props.sort();
        Ok(props)
    }
}
