//! Albums, photos, and the camera equipment photos own.

use tracing::debug;

use crate::change::Refresh;
use crate::error::CrawlError;
use crate::identity;
use crate::models::{PhotoAttributes, RemoteEntity};
use crate::ontology::{class, prop, FLASH_OFF, FLASH_ON};
use crate::store::{PropertyValue, ResourceHandle};

use super::{classes_for, created_value, MapContext, Outcome};

/// Map an album. The handle is returned even when the album is unchanged:
/// its photos are processed either way.
pub async fn map_album(
    ctx: &mut MapContext<'_>,
    album: &RemoteEntity,
) -> Result<(ResourceHandle, Outcome), CrawlError> {
    let identifier = identity::resolve(ctx.provider, album);
    let visit = ctx
        .visit(&identifier, &classes_for(album.kind), album.updated_at)
        .await?;
    let Refresh::Needed(watermark) = visit.refresh else {
        debug!(identifier = %identifier, "album unchanged since last crawl");
        return Ok((visit.resource, Outcome::Unchanged));
    };
    let resource = &visit.resource;

    ctx.set(resource, prop::URL, PropertyValue::text(album.url.as_deref()))
        .await?;
    ctx.set(
        resource,
        prop::DESCRIPTION,
        PropertyValue::text(album.summary.as_deref()),
    )
    .await?;
    ctx.set(resource, prop::TITLE, PropertyValue::text(album.title.as_deref()))
        .await?;
    ctx.link_authors(resource, prop::CREATOR, &album.authors)
        .await?;
    ctx.set(resource, prop::CONTENT_CREATED, created_value(album.created_at))
        .await?;

    ctx.commit(resource, watermark).await?;
    let outcome = Outcome::written(visit.existed);
    Ok((visit.resource, outcome))
}

fn number<T: ToString>(value: Option<T>) -> PropertyValue {
    match value {
        Some(v) => PropertyValue::Literal(v.to_string()),
        None => PropertyValue::Null,
    }
}

/// Map one photo of `album`. Entries carrying non-image media are skipped
/// without being marked visited.
pub async fn map_photo(
    ctx: &mut MapContext<'_>,
    photo: &RemoteEntity,
    album: &ResourceHandle,
) -> Result<Outcome, CrawlError> {
    if !photo.is_image() {
        debug!(id = %photo.id, "skipping entry whose media is not an image");
        return Ok(Outcome::Skipped);
    }

    let identifier = identity::resolve(ctx.provider, photo);
    let visit = ctx
        .visit(&identifier, &classes_for(photo.kind), photo.updated_at)
        .await?;
    let Refresh::Needed(watermark) = visit.refresh else {
        debug!(identifier = %identifier, "photo unchanged since last crawl");
        return Ok(Outcome::Unchanged);
    };
    let resource = &visit.resource;
    let attrs = photo.photo.clone().unwrap_or_default();

    ctx.set(resource, prop::URL, PropertyValue::text(photo.url.as_deref()))
        .await?;
    ctx.set(
        resource,
        prop::DESCRIPTION,
        PropertyValue::text(photo.summary.as_deref()),
    )
    .await?;
    ctx.store
        .set_values(
            ctx.datasource,
            resource,
            prop::IS_PART_OF,
            &[PropertyValue::resource(album)],
        )
        .await?;
    ctx.set(resource, prop::MIME_TYPE, PropertyValue::text(photo.media_type()))
        .await?;
    ctx.set(resource, prop::TITLE, PropertyValue::text(photo.title.as_deref()))
        .await?;
    ctx.link_authors(resource, prop::CREATOR, &photo.authors)
        .await?;

    ctx.set(resource, prop::EXPOSURE_TIME, number(attrs.exposure))
        .await?;
    ctx.set(resource, prop::FOCAL_LENGTH, number(attrs.focal_length))
        .await?;
    ctx.set(resource, prop::FNUMBER, number(attrs.fstop)).await?;
    ctx.set(resource, prop::ISO_SPEED, number(attrs.iso)).await?;
    let flash = match attrs.flash {
        Some(true) => PropertyValue::Resource(FLASH_ON.to_string()),
        Some(false) => PropertyValue::Resource(FLASH_OFF.to_string()),
        None => PropertyValue::Null,
    };
    ctx.set(resource, prop::FLASH, flash).await?;

    map_equipment(ctx, &identifier, resource, &attrs).await?;

    ctx.set(resource, prop::WIDTH, number(attrs.width)).await?;
    ctx.set(resource, prop::HEIGHT, number(attrs.height)).await?;
    ctx.set(resource, prop::CONTENT_CREATED, created_value(photo.created_at))
        .await?;

    ctx.commit(resource, watermark).await?;
    Ok(Outcome::written(visit.existed))
}

/// Create or update the camera sub-resource, or drop it once the photo no
/// longer reports a make or model.
async fn map_equipment(
    ctx: &MapContext<'_>,
    photo_identifier: &identity::Identifier,
    photo: &ResourceHandle,
    attrs: &PhotoAttributes,
) -> Result<(), CrawlError> {
    let identifier = identity::equipment_identifier(photo_identifier);

    if attrs.make.is_none() && attrs.model.is_none() {
        if ctx.store.find_resource(identifier.as_str(), &[]).await?.is_some() {
            ctx.store
                .delete_resources_by_identifiers(&[identifier.to_string()])
                .await?;
        }
        return Ok(());
    }

    let (equipment, _) = ctx
        .store
        .find_or_create_resource(ctx.datasource, identifier.as_str(), &[class::EQUIPMENT])
        .await?;
    ctx.set(
        &equipment,
        prop::MANUFACTURER,
        PropertyValue::text(attrs.make.as_deref()),
    )
    .await?;
    ctx.set(&equipment, prop::MODEL, PropertyValue::text(attrs.model.as_deref()))
        .await?;
    ctx.set(photo, prop::EQUIPMENT, PropertyValue::resource(&equipment))
        .await?;
    Ok(())
}
