use uuid::Uuid;

use crate::errors::Result;
use crate::fields::SmartImageField;
use crate::orchestrators::{gather_text, SmartContext};
use crate::record::{FieldUpdate, PendingImage, RecordSnapshot};

pub async fn transform_image(
    field: &SmartImageField,
    ctx: &SmartContext,
    snapshot: &RecordSnapshot,
) -> Result<Option<FieldUpdate>> {
    let options = field.options();
    if !options.thumbnail || options.data_fields.is_empty() {
        return Ok(None);
    }
    let Some(prompt) = gather_text(snapshot, &options.data_fields)? else {
        return Ok(None);
    };

    let bytes = ctx
        .image()
        .generate_thumbnail(
            &prompt,
            options.image_width,
            options.image_height,
            options.api_provider,
        )
        .await?;
    let Some(bytes) = bytes.filter(|bytes| !bytes.is_empty()) else {
        log::debug!("no thumbnail generated for '{}'", field.attribute());
        return Ok(None);
    };

    Ok(Some(FieldUpdate::Image {
        attribute: field.attribute().to_string(),
        image: PendingImage {
            file_name: format!("{}.{}", Uuid::new_v4(), options.image_extension),
            bytes,
        },
    }))
}
