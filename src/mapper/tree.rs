//! Files and folders of hierarchical listings.
//!
//! A folder is fully mapped when it shows up in its parent's listing; the
//! same identifier is used when a child links to it, so a stub created
//! earlier is upgraded rather than duplicated.

use tracing::debug;

use crate::change::Refresh;
use crate::error::CrawlError;
use crate::identity;
use crate::mime;
use crate::models::{EntityKind, RemoteEntity};
use crate::ontology::{class, prop};
use crate::store::PropertyValue;

use super::{created_value, MapContext, Outcome};

/// Map one entry listed under `parent` (`None` for top-level entries).
pub async fn map_tree_entry(
    ctx: &mut MapContext<'_>,
    entity: &RemoteEntity,
    parent: Option<&str>,
) -> Result<Outcome, CrawlError> {
    let name = entity.title.as_deref().unwrap_or(&entity.id);
    let is_folder = entity.kind == EntityKind::Folder;
    let specific = if is_folder {
        class::DATA_CONTAINER
    } else {
        mime::class_for_file_name(name)
    };

    let identifier = identity::resolve(ctx.provider, entity);
    let visit = ctx
        .visit(
            &identifier,
            &[class::REMOTE_DATA_OBJECT, specific],
            entity.updated_at,
        )
        .await?;
    let Refresh::Needed(watermark) = visit.refresh else {
        debug!(identifier = %identifier, "unchanged since last crawl");
        return Ok(Outcome::Unchanged);
    };
    let resource = &visit.resource;

    let url = entity
        .url
        .clone()
        .unwrap_or_else(|| identifier.to_string());
    ctx.set(resource, prop::URL, PropertyValue::Literal(url)).await?;

    let parents: Vec<_> = parent
        .map(|p| identity::folder_identifier(ctx.provider, p))
        .into_iter()
        .collect();
    ctx.link_parents(resource, &parents).await?;

    if !is_folder {
        ctx.set(
            resource,
            prop::MIME_TYPE,
            PropertyValue::text(mime::guess_type(name)),
        )
        .await?;
    }

    ctx.set(
        resource,
        prop::DESCRIPTION,
        PropertyValue::text(entity.summary.as_deref()),
    )
    .await?;
    ctx.set(resource, prop::FILE_NAME, PropertyValue::literal(name))
        .await?;
    ctx.link_authors(resource, prop::CREATOR, &entity.authors)
        .await?;
    ctx.set(resource, prop::CONTENT_CREATED, created_value(entity.created_at))
        .await?;

    ctx.commit(resource, watermark).await?;
    Ok(Outcome::written(visit.existed))
}
