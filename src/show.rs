//! Resource inspection by identifier.
//!
//! Backs the `harvest show` command: resolves a provider identifier to its
//! store handle and lists every stored (property, value) pair.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::store::GraphStore;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceView {
    pub identifier: String,
    pub resource: String,
    pub properties: Vec<(String, String)>,
}

pub async fn show_resource(store: &dyn GraphStore, identifier: &str) -> Result<ResourceView> {
    let Some(resource) = store.find_resource(identifier, &[]).await? else {
        bail!("resource not found: {}", identifier);
    };
    let properties = store.properties(&resource).await?;
    Ok(ResourceView {
        identifier: identifier.to_string(),
        resource: resource.to_string(),
        properties,
    })
}

/// CLI entry point: prints the resource as text, or as JSON with `json`.
pub async fn run_show(store: &dyn GraphStore, identifier: &str, json: bool) -> Result<()> {
    let view = show_resource(store, identifier).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("--- Resource ---");
    println!("identifier: {}", view.identifier);
    println!("resource:   {}", view.resource);
    println!();
    println!("--- Properties ({}) ---", view.properties.len());
    let width = view
        .properties
        .iter()
        .map(|(p, _)| p.len())
        .max()
        .unwrap_or(0);
    for (property, value) in &view.properties {
        println!("{:<width$}  {}", property, value, width = width);
    }

    Ok(())
}
