//! SQLite-backed [`GraphStore`] implementation.
//!
//! Triples live in a single `triples` table (see [`crate::migrate`]) with
//! a uniqueness constraint on `(subject, predicate, object)`. Multi-step
//! writes run inside one transaction so readers never observe a property
//! that is transiently empty or multi-valued.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::StoreError;
use crate::ontology::{class, prop, OWNED_PROPERTIES, RDF_TYPE};

use super::{mail_uri, GraphStore, PropertyValue, ResourceHandle};

/// SQLite implementation of the [`GraphStore`] trait.
///
/// Creation relies on the partial unique indexes over `nao:identifier`
/// and `nco:hasEmailAddress`: the keyed triple is inserted first, and when
/// the insert is ignored the transaction is rolled back and the existing
/// subject returned.
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn subject_bound_by(
        &self,
        predicate: &str,
        object: &str,
    ) -> Result<Option<String>, StoreError> {
        let subject = sqlx::query_scalar::<_, String>(
            "SELECT subject FROM triples WHERE predicate = ? AND object = ? LIMIT 1",
        )
        .bind(predicate)
        .bind(object)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }
}

async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    graph: &str,
    subject: &str,
    predicate: &str,
    object: &PropertyValue,
) -> Result<bool, StoreError> {
    let Some(value) = object.as_str() else {
        return Ok(false);
    };
    let done = sqlx::query(
        "INSERT OR IGNORE INTO triples (graph, subject, predicate, object, is_resource) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(graph)
    .bind(subject)
    .bind(predicate)
    .bind(value)
    .bind(object.is_resource())
    .execute(&mut **tx)
    .await?;
    Ok(done.rows_affected() > 0)
}

fn type_of(class: &str) -> PropertyValue {
    PropertyValue::Resource(class.to_string())
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn find_resource(
        &self,
        identifier: &str,
        classes: &[&str],
    ) -> Result<Option<ResourceHandle>, StoreError> {
        let mut sql = String::from("SELECT t.subject FROM triples t WHERE t.predicate = ? AND t.object = ?");
        for _ in classes {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM triples c WHERE c.subject = t.subject AND c.predicate = ? AND c.object = ?)",
            );
        }
        sql.push_str(" LIMIT 1");

        let mut query = sqlx::query_scalar::<_, String>(&sql)
            .bind(prop::IDENTIFIER)
            .bind(identifier);
        for c in classes {
            query = query.bind(RDF_TYPE).bind(*c);
        }

        let found = query.fetch_optional(&self.pool).await?;
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_resource(
        &self,
        graph: &str,
        identifier: &str,
        classes: &[&str],
    ) -> Result<(ResourceHandle, bool), StoreError> {
        let handle = ResourceHandle::generate();
        let mut tx = self.pool.begin().await?;
        let bound = insert(
            &mut tx,
            graph,
            handle.as_str(),
            prop::IDENTIFIER,
            &PropertyValue::literal(identifier),
        )
        .await?;
        if !bound {
            tx.rollback().await?;
            return match self.subject_bound_by(prop::IDENTIFIER, identifier).await? {
                Some(existing) => Ok((ResourceHandle::new(existing), false)),
                None => Err(StoreError::Protocol(format!(
                    "identifier '{}' is neither insertable nor bound",
                    identifier
                ))),
            };
        }
        for c in classes {
            insert(&mut tx, graph, handle.as_str(), RDF_TYPE, &type_of(c)).await?;
        }
        tx.commit().await?;
        Ok((handle, true))
    }

    async fn add_classes(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        classes: &[&str],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for c in classes {
            insert(&mut tx, graph, resource.as_str(), RDF_TYPE, &type_of(c)).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_string(
        &self,
        resource: &ResourceHandle,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT object FROM triples WHERE subject = ? AND predicate = ? LIMIT 1",
        )
        .bind(resource.as_str())
        .bind(property)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn set_values(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        property: &str,
        values: &[PropertyValue],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM triples WHERE subject = ? AND predicate = ?")
            .bind(resource.as_str())
            .bind(property)
            .execute(&mut *tx)
            .await?;
        for v in values {
            insert(&mut tx, graph, resource.as_str(), property, v).await?;
        }
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM triples WHERE subject = ? AND predicate = ? AND object = ?")
            .bind(resource.as_str())
            .bind(property)
            .bind(old)
            .execute(&mut *tx)
            .await?;
        insert(&mut tx, graph, resource.as_str(), property, new).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn toggle_tag(
        &self,
        graph: &str,
        resource: &ResourceHandle,
        tag: &str,
        present: bool,
    ) -> Result<(), StoreError> {
        if present {
            let mut tx = self.pool.begin().await?;
            insert(&mut tx, graph, resource.as_str(), prop::HAS_TAG, &type_of(tag)).await?;
            tx.commit().await?;
        } else {
            sqlx::query("DELETE FROM triples WHERE subject = ? AND predicate = ? AND object = ?")
                .bind(resource.as_str())
                .bind(prop::HAS_TAG)
                .bind(tag)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn find_contact(&self, email: &str) -> Result<Option<ResourceHandle>, StoreError> {
        let found = sqlx::query_scalar::<_, String>(
            r#"
            SELECT m.subject FROM triples m
            WHERE m.predicate = ? AND m.object = ?
              AND EXISTS (SELECT 1 FROM triples c
                          WHERE c.subject = m.subject AND c.predicate = ? AND c.object = ?)
            LIMIT 1
            "#,
        )
        .bind(prop::HAS_EMAIL_ADDRESS)
        .bind(mail_uri(email))
        .bind(RDF_TYPE)
        .bind(class::CONTACT)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.map(ResourceHandle::new))
    }

    async fn create_contact(
        &self,
        graph: &str,
        email: &str,
        fullname: &str,
    ) -> Result<ResourceHandle, StoreError> {
        let mail = mail_uri(email);
        let contact = ResourceHandle::generate();
        let mut tx = self.pool.begin().await?;
        let bound = insert(
            &mut tx,
            graph,
            contact.as_str(),
            prop::HAS_EMAIL_ADDRESS,
            &PropertyValue::Resource(mail.clone()),
        )
        .await?;
        if !bound {
            tx.rollback().await?;
            return match self.subject_bound_by(prop::HAS_EMAIL_ADDRESS, &mail).await? {
                Some(existing) => Ok(ResourceHandle::new(existing)),
                None => Err(StoreError::Protocol(format!(
                    "contact for '{}' is neither insertable nor bound",
                    email
                ))),
            };
        }
        insert(&mut tx, graph, &mail, RDF_TYPE, &type_of(class::EMAIL_ADDRESS)).await?;
        insert(&mut tx, graph, &mail, prop::EMAIL_ADDRESS, &PropertyValue::literal(email)).await?;
        insert(&mut tx, graph, contact.as_str(), RDF_TYPE, &type_of(class::CONTACT)).await?;
        insert(
            &mut tx,
            graph,
            contact.as_str(),
            prop::FULLNAME,
            &PropertyValue::literal(fullname),
        )
        .await?;
        tx.commit().await?;
        Ok(contact)
    }

    async fn identifiers_for_datasource(
        &self,
        datasource: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT i.object FROM triples i
            JOIN triples d ON d.subject = i.subject
            WHERE i.predicate = ? AND d.predicate = ? AND d.object = ?
            "#,
        )
        .bind(prop::IDENTIFIER)
        .bind(prop::DATA_SOURCE)
        .bind(datasource)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn delete_resources_by_identifiers(
        &self,
        identifiers: &[String],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0u64;

        for identifier in identifiers {
            let subjects = sqlx::query_scalar::<_, String>(
                "SELECT subject FROM triples WHERE predicate = ? AND object = ?",
            )
            .bind(prop::IDENTIFIER)
            .bind(identifier)
            .fetch_all(&mut *tx)
            .await?;

            for subject in subjects {
                let mut doomed = vec![subject.clone()];
                for owned in OWNED_PROPERTIES {
                    let objects = sqlx::query_scalar::<_, String>(
                        "SELECT object FROM triples WHERE subject = ? AND predicate = ?",
                    )
                    .bind(&subject)
                    .bind(*owned)
                    .fetch_all(&mut *tx)
                    .await?;
                    doomed.extend(objects);
                }

                for res in &doomed {
                    sqlx::query(
                        "DELETE FROM triples WHERE subject = ? OR (is_resource = 1 AND object = ?)",
                    )
                    .bind(res)
                    .bind(res)
                    .execute(&mut *tx)
                    .await?;
                }
                deleted += 1;
            }
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn properties(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT predicate, object FROM triples WHERE subject = ? ORDER BY predicate, object",
        )
        .bind(resource.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
