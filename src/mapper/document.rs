//! Flat document listings.
//!
//! Folders arrive in the same listing as documents; hierarchy comes from
//! each entry's parent references.

use tracing::debug;

use crate::change::Refresh;
use crate::error::CrawlError;
use crate::identity::{self, Identifier};
use crate::models::RemoteEntity;
use crate::ontology::{prop, STARRED_LABEL, TAG_FAVORITE};
use crate::provider::DocumentsService;
use crate::store::PropertyValue;

use super::{classes_for, created_value, mime_override, MapContext, Outcome};

pub async fn map_document(
    ctx: &mut MapContext<'_>,
    service: &dyn DocumentsService,
    entity: &RemoteEntity,
) -> Result<Outcome, CrawlError> {
    let identifier = identity::resolve(ctx.provider, entity);
    let visit = ctx
        .visit(&identifier, &classes_for(entity.kind), entity.updated_at)
        .await?;
    let Refresh::Needed(watermark) = visit.refresh else {
        debug!(identifier = %identifier, "unchanged since last crawl");
        return Ok(Outcome::Unchanged);
    };
    let resource = &visit.resource;

    ctx.set(resource, prop::URL, PropertyValue::text(entity.url.as_deref()))
        .await?;

    let mime = mime_override(entity.kind).or(entity.mime_type.as_deref());
    ctx.set(resource, prop::MIME_TYPE, PropertyValue::text(mime))
        .await?;

    let parents: Vec<Identifier> = entity
        .parents
        .iter()
        .map(|p| identity::folder_identifier(ctx.provider, p))
        .collect();
    ctx.link_parents(resource, &parents).await?;

    let starred = entity.categories.iter().any(|c| c == STARRED_LABEL);
    ctx.store
        .toggle_tag(ctx.datasource, resource, TAG_FAVORITE, starred)
        .await?;

    ctx.set(
        resource,
        prop::DESCRIPTION,
        PropertyValue::text(entity.summary.as_deref()),
    )
    .await?;
    ctx.set(resource, prop::TITLE, PropertyValue::text(entity.title.as_deref()))
        .await?;

    ctx.link_authors(resource, prop::CREATOR, &entity.authors)
        .await?;

    let rules = service.access_rules(entity).await?;
    let mut contributors = Vec::new();
    for principal in rules.iter().filter_map(|r| r.principal()) {
        let contact = ctx.store.ensure_contact(ctx.datasource, principal, "").await?;
        let link = PropertyValue::resource(&contact);
        if !contributors.contains(&link) {
            contributors.push(link);
        }
    }
    ctx.store
        .set_values(ctx.datasource, resource, prop::CONTRIBUTOR, &contributors)
        .await?;

    ctx.set(resource, prop::CONTENT_CREATED, created_value(entity.created_at))
        .await?;

    ctx.commit(resource, watermark).await?;
    Ok(Outcome::written(visit.existed))
}
