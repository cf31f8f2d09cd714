//! SPARQL 1.1 [`GraphStore`] implementation.
//!
//! All query construction lives here: every adapter operation becomes one
//! SPARQL query or one update request, sent through a [`SparqlConnection`].
//! Writes go into the account's named graph; reads match across all named
//! graphs so resources shared between accounts are found wherever their
//! triples were written.
//!
//! [`HttpSparqlConnection`] speaks the SPARQL 1.1 protocol (form-encoded
//! `query=` / `update=` POSTs, JSON result sets) and works with Oxigraph,
//! Fuseki, or any compliant endpoint.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;
use crate::ontology::{class, prop, OWNED_PROPERTIES, PREFIXES, RDF_TYPE};

use super::{mail_uri, GraphStore, PropertyValue, ResourceHandle};

/// Query/update executor for a SPARQL store.
///
/// `query` returns one row per solution, with values in the order the
/// variables were projected; unbound values are `None`.
#[async_trait]
pub trait SparqlConnection: Send + Sync {
    async fn query(&self, sparql: &str) -> Result<Vec<Vec<Option<String>>>, StoreError>;
    async fn update(&self, sparql: &str) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Term rendering
// ═══════════════════════════════════════════════════════════════════════

/// Quote a string as a SPARQL literal.
fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a resource reference: declared prefixed names stay as they are,
/// anything else becomes an `<IRI>`.
fn iri(value: &str) -> String {
    let prefixed = value
        .split_once(':')
        .map(|(p, local)| !local.starts_with("//") && PREFIXES.iter().any(|(known, _)| *known == p))
        .unwrap_or(false);
    if prefixed {
        value.to_string()
    } else {
        let escaped: String = value
            .chars()
            .filter(|c| !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | ' '))
            .collect();
        format!("<{}>", escaped)
    }
}

/// Shrink a full IRI back to its prefixed form where a prefix is declared.
fn compact(value: &str) -> String {
    PREFIXES
        .iter()
        .find_map(|(p, ns)| value.strip_prefix(ns).map(|local| format!("{}:{}", p, local)))
        .unwrap_or_else(|| value.to_string())
}

fn term(value: &PropertyValue) -> Option<String> {
    match value {
        PropertyValue::Literal(v) => Some(literal(v)),
        PropertyValue::Resource(v) => Some(iri(v)),
        PropertyValue::Null => None,
    }
}

fn prologue() -> String {
    PREFIXES
        .iter()
        .map(|(p, ns)| format!("PREFIX {}: <{}>\n", p, ns))
        .collect()
}

/// Builds a group of triple patterns, each matched in any named graph.
#[derive(Default)]
struct Patterns {
    parts: Vec<String>,
}

impl Patterns {
    fn add(&mut self, s: &str, p: &str, o: &str) -> &mut Self {
        let n = self.parts.len();
        self.parts.push(format!("GRAPH ?g{} {{ {} {} {} }}", n, s, p, o));
        self
    }

    fn build(&self) -> String {
        self.parts.join(" ")
    }
}

fn triple_block(triples: &[(String, String, String)]) -> String {
    triples
        .iter()
        .map(|(s, p, o)| format!("{} {} {} .", s, p, o))
        .collect::<Vec<_>>()
        .join(" ")
}

fn insert_data(graph: &str, triples: &[(String, String, String)]) -> String {
    format!("INSERT DATA {{ GRAPH {} {{ {} }} }}", iri(graph), triple_block(triples))
}

/// Insert `triples` only when no named graph holds a match for `guard`.
/// The check and the insert run as one update operation.
fn insert_unless(graph: &str, triples: &[(String, String, String)], guard: &str) -> String {
    format!(
        "INSERT {{ GRAPH {} {{ {} }} }} WHERE {{ FILTER NOT EXISTS {{ GRAPH ?bound {{ {} }} }} }}",
        iri(graph),
        triple_block(triples),
        guard
    )
}

fn delete_values(subject: &str, property: &str) -> String {
    format!(
        "DELETE {{ GRAPH ?g {{ {s} {p} ?v }} }} WHERE {{ GRAPH ?g {{ {s} {p} ?v }} }}",
        s = subject,
        p = property
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════

/// SPARQL implementation of the [`GraphStore`] trait.
pub struct SparqlGraphStore<C> {
    conn: C,
}

impl<C: SparqlConnection> SparqlGraphStore<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    async fn select(&self, body: &str) -> Result<Vec<Vec<Option<String>>>, StoreError> {
        self.conn.query(&format!("{}{}", prologue(), body)).await
    }

    async fn select_first(&self, body: &str) -> Result<Option<String>, StoreError> {
        let rows = self.select(body).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().flatten()))
    }

    async fn run(&self, operations: &[String]) -> Result<(), StoreError> {
        if operations.is_empty() {
            return Ok(());
        }
        self.conn
            .update(&format!("{}{}", prologue(), operations.join(" ;\n")))
            .await
    }
}

#[async_trait]
impl<C: SparqlConnection> GraphStore for SparqlGraphStore<C> {
    async fn find_resource(
        &self,
        identifier: &str,
        classes: &[&str],
    ) -> Result<Option<ResourceHandle>, StoreError> {
        let mut patterns = Patterns::default();
        patterns.add("?urn", prop::IDENTIFIER, &literal(identifier));
        for c in classes {
            patterns.add("?urn", RDF_TYPE, &iri(c));
        }
        let found = self
            .select_first(&format!("SELECT ?urn WHERE {{ {} }} LIMIT 1", patterns.build()))
            .await?;
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_resource(
        &self,
        graph: &str,
        identifier: &str,
        classes: &[&str],
    ) -> Result<(ResourceHandle, bool), StoreError> {
        let handle = ResourceHandle::generate();
        let subject = iri(handle.as_str());
        let mut triples: Vec<_> = classes
            .iter()
            .map(|c| (subject.clone(), RDF_TYPE.to_string(), iri(c)))
            .collect();
        triples.push((subject, prop::IDENTIFIER.to_string(), literal(identifier)));
        let guard = format!("?any {} {}", prop::IDENTIFIER, literal(identifier));
        self.run(&[insert_unless(graph, &triples, &guard)]).await?;

        match self.find_resource(identifier, &[]).await? {
            Some(bound) => {
                let created = bound == handle;
                Ok((bound, created))
            }
            None => Err(StoreError::Protocol(format!(
                "identifier '{}' is neither insertable nor bound",
                identifier
            ))),
        }
    }

    async fn add_classes(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        classes: &[&str],
    ) -> Result<(), StoreError> {
        if classes.is_empty() {
            return Ok(());
        }
        let subject = iri(resource.as_str());
        let triples: Vec<_> = classes
            .iter()
            .map(|c| (subject.clone(), RDF_TYPE.to_string(), iri(c)))
            .collect();
        self.run(&[insert_data(graph, &triples)]).await
    }

    async fn get_string(
        &self,
        resource: &ResourceHandle,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut patterns = Patterns::default();
        patterns.add(&iri(resource.as_str()), property, "?v");
        self.select_first(&format!("SELECT ?v WHERE {{ {} }} LIMIT 1", patterns.build()))
            .await
    }

    async fn set_values(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        values: &[PropertyValue],
    ) -> Result<(), StoreError> {
        let subject = iri(resource.as_str());
        let mut ops = vec![delete_values(&subject, property)];
        let triples: Vec<_> = values
            .iter()
            .filter_map(term)
            .map(|o| (subject.clone(), property.to_string(), o))
            .collect();
        if !triples.is_empty() {
            ops.push(insert_data(graph, &triples));
        }
        self.run(&ops).await
    }

    async fn replace_property(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        old: &str,
        new: &PropertyValue,
    ) -> Result<(), StoreError> {
        let subject = iri(resource.as_str());
        let old_term = if new.is_resource() { iri(old) } else { literal(old) };
        let mut ops = vec![format!(
            "DELETE WHERE {{ GRAPH ?g {{ {} {} {} }} }}",
            subject, property, old_term
        )];
        if let Some(o) = term(new) {
            ops.push(insert_data(graph, &[(subject, property.to_string(), o)]));
        }
        self.run(&ops).await
    }

    async fn toggle_tag(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        tag: &str,
        present: bool,
    ) -> Result<(), StoreError> {
        let subject = iri(resource.as_str());
        let op = if present {
            insert_data(graph, &[(subject, prop::HAS_TAG.to_string(), iri(tag))])
        } else {
            format!(
                "DELETE WHERE {{ GRAPH ?g {{ {} {} {} }} }}",
                subject,
                prop::HAS_TAG,
                iri(tag)
            )
        };
        self.run(&[op]).await
    }

    async fn find_contact(&self, email: &str) -> Result<Option<ResourceHandle>, StoreError> {
        let mut patterns = Patterns::default();
        patterns
            .add("?urn", RDF_TYPE, class::CONTACT)
            .add("?urn", prop::HAS_EMAIL_ADDRESS, &iri(&mail_uri(email)));
        let found = self
            .select_first(&format!("SELECT ?urn WHERE {{ {} }} LIMIT 1", patterns.build()))
            .await?;
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_contact(
        &self,
        graph: &str,
        email: &str,
        fullname: &str,
    ) -> Result<ResourceHandle, StoreError> {
        let contact = ResourceHandle::generate();
        let mail = iri(&mail_uri(email));
        let c = iri(contact.as_str());
        let triples = [
            (mail.clone(), RDF_TYPE.to_string(), class::EMAIL_ADDRESS.to_string()),
            (mail.clone(), prop::EMAIL_ADDRESS.to_string(), literal(email)),
            (c.clone(), RDF_TYPE.to_string(), class::CONTACT.to_string()),
            (c.clone(), prop::HAS_EMAIL_ADDRESS.to_string(), mail),
            (c, prop::FULLNAME.to_string(), literal(fullname)),
        ];
        let guard = format!("?any {} {}", prop::HAS_EMAIL_ADDRESS, iri(&mail_uri(email)));
        self.run(&[insert_unless(graph, &triples, &guard)]).await?;

        self.find_contact(email).await?.ok_or_else(|| {
            StoreError::Protocol(format!(
                "contact for '{}' is neither insertable nor bound",
                email
            ))
        })
    }

    async fn identifiers_for_datasource(
        &self,
        datasource: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let mut patterns = Patterns::default();
        patterns
            .add("?urn", prop::DATA_SOURCE, &iri(datasource))
            .add("?urn", prop::IDENTIFIER, "?id");
        let rows = self
            .select(&format!("SELECT ?id WHERE {{ {} }}", patterns.build()))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    async fn delete_resources_by_identifiers(
        &self,
        identifiers: &[String],
    ) -> Result<u64, StoreError> {
        if identifiers.is_empty() {
            return Ok(0);
        }

        let values: Vec<String> = identifiers.iter().map(|id| literal(id)).collect();
        let mut optional = String::new();
        for owned in OWNED_PROPERTIES {
            optional.push_str(&format!(
                " OPTIONAL {{ GRAPH ?o {{ ?urn {} ?owned }} }}",
                owned
            ));
        }
        let rows = self
            .select(&format!(
                "SELECT ?urn ?owned WHERE {{ VALUES ?id {{ {} }} GRAPH ?g {{ ?urn {} ?id }}{} }}",
                values.join(" "),
                prop::IDENTIFIER,
                optional
            ))
            .await?;

        let mut resources = HashSet::new();
        let mut doomed = HashSet::new();
        for row in rows {
            let mut cols = row.into_iter();
            if let Some(Some(urn)) = cols.next() {
                resources.insert(urn.clone());
                doomed.insert(urn);
            }
            if let Some(Some(owned)) = cols.next() {
                doomed.insert(owned);
            }
        }

        let ops: Vec<String> = doomed
            .iter()
            .flat_map(|r| {
                let r = iri(r);
                [
                    format!("DELETE WHERE {{ GRAPH ?g {{ {} ?p ?o }} }}", r),
                    format!("DELETE WHERE {{ GRAPH ?g {{ ?s ?p {} }} }}", r),
                ]
            })
            .collect();
        self.run(&ops).await?;
        Ok(resources.len() as u64)
    }

    async fn properties(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = self
            .select(&format!(
                "SELECT ?p ?o WHERE {{ GRAPH ?g {{ {} ?p ?o }} }} ORDER BY ?p ?o",
                iri(resource.as_str())
            ))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cols = row.into_iter();
                match (cols.next().flatten(), cols.next().flatten()) {
                    (Some(p), Some(o)) => Some((compact(&p), compact(&o))),
                    _ => None,
                }
            })
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP connection
// ═══════════════════════════════════════════════════════════════════════

/// SPARQL 1.1 protocol client.
pub struct HttpSparqlConnection {
    client: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
}

impl HttpSparqlConnection {
    pub fn new(
        query_endpoint: String,
        update_endpoint: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            update_endpoint: update_endpoint.unwrap_or_else(|| query_endpoint.clone()),
            query_endpoint,
            client,
        })
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Endpoint {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Deserialize)]
struct ResultSet {
    head: ResultHead,
    results: ResultBindings,
}

#[derive(Deserialize)]
struct ResultHead {
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct ResultBindings {
    bindings: Vec<HashMap<String, BoundTerm>>,
}

#[derive(Deserialize)]
struct BoundTerm {
    value: String,
}

fn rows_from_json(body: &str) -> Result<Vec<Vec<Option<String>>>, StoreError> {
    let set: ResultSet =
        serde_json::from_str(body).map_err(|e| StoreError::Protocol(e.to_string()))?;
    let vars = set.head.vars;
    Ok(set
        .results
        .bindings
        .into_iter()
        .map(|mut binding| {
            vars.iter()
                .map(|v| binding.remove(v).map(|t| t.value))
                .collect()
        })
        .collect())
}

#[async_trait]
impl SparqlConnection for HttpSparqlConnection {
    async fn query(&self, sparql: &str) -> Result<Vec<Vec<Option<String>>>, StoreError> {
        let resp = self
            .client
            .post(&self.query_endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", sparql)])
            .send()
            .await?;
        let body = Self::check(resp).await?.text().await?;
        rows_from_json(&body)
    }

    async fn update(&self, sparql: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", sparql)])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
