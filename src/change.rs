//! Change detection against the stored data source tag and modification
//! watermark.
//!
//! Reads in this module are best-effort: a failed read is logged at debug
//! level and treated as "value unknown", which always errs towards
//! rewriting.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::ontology::prop;
use crate::store::{GraphStore, PropertyValue, ResourceHandle};

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn to_iso8601(epoch_secs: i64) -> String {
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}

/// Parse a stored ISO-8601 timestamp back to epoch seconds.
pub fn parse_iso8601(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.timestamp())
}

async fn read_best_effort(
    store: &dyn GraphStore,
    resource: &ResourceHandle,
    property: &str,
) -> Option<String> {
    match store.get_string(resource, property).await {
        Ok(value) => value,
        Err(e) => {
            debug!(resource = %resource, property, error = %e, "ignoring failed read");
            None
        }
    }
}

/// Make sure `resource` is tagged with `datasource`.
///
/// New resources get the tag. Existing ones are only rewritten when the
/// stored tag differs or cannot be read; a known stale tag is swapped
/// with [`GraphStore::replace_property`] so the property never holds two
/// values.
pub async fn reconcile_datasource(
    store: &dyn GraphStore,
    datasource: &str,
    resource: &ResourceHandle,
    existed: bool,
) -> Result<(), StoreError> {
    let tag = PropertyValue::Resource(datasource.to_string());
    if !existed {
        return store
            .set_property(datasource, resource, prop::DATA_SOURCE, &tag)
            .await;
    }

    match read_best_effort(store, resource, prop::DATA_SOURCE).await {
        Some(old) if old == datasource => Ok(()),
        Some(old) => {
            debug!(resource = %resource, old = %old, new = datasource, "correcting data source");
            store
                .replace_property(datasource, resource, prop::DATA_SOURCE, &old, &tag)
                .await
        }
        None => {
            store
                .set_property(datasource, resource, prop::DATA_SOURCE, &tag)
                .await
        }
    }
}

/// Outcome of comparing a remote modification time with the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Unchanged,
    /// Properties must be rewritten; the watermark is committed once they
    /// all are.
    Needed(Watermark),
}

/// A modification watermark waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark(String);

impl Watermark {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decide whether `resource` needs its properties rewritten.
///
/// Watermarks compare at second granularity.
pub async fn should_refresh(
    store: &dyn GraphStore,
    resource: &ResourceHandle,
    existed: bool,
    updated_at: DateTime<Utc>,
) -> Refresh {
    let new_secs = updated_at.timestamp();
    let pending = Refresh::Needed(Watermark(to_iso8601(new_secs)));
    if !existed {
        return pending;
    }

    let stored = read_best_effort(store, resource, prop::CONTENT_LAST_MODIFIED)
        .await
        .and_then(|v| parse_iso8601(&v));
    match stored {
        Some(old_secs) if old_secs == new_secs => Refresh::Unchanged,
        _ => pending,
    }
}

/// Write the watermark of a completed refresh.
pub async fn commit_watermark(
    store: &dyn GraphStore,
    graph: &str,
    resource: &ResourceHandle,
    watermark: Watermark,
) -> Result<(), StoreError> {
    store
        .set_property(
            graph,
            resource,
            prop::CONTENT_LAST_MODIFIED,
            &PropertyValue::Literal(watermark.0),
        )
        .await
}
