//! Image endpoints: classification through the chat delegate and upload to
//! blob storage. Both read the multipart field `image`.

use crate::{
    errors::{AppError, detail},
    models::image::ImageUpload,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;

/// Multipart field carrying the file.
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadImageResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

/// POST `/imagescan` — forward the image to the vision delegate and return
/// its answer untouched.
pub async fn scan_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let image = read_image(multipart).await?;
    let result = state.chat.process_image(&image).await.map_err(|err| {
        tracing::error!(file_name = %image.file_name, error = %err, "image scan failed");
        AppError::internal_with(detail::IMAGE_SCAN_FAILED, err)
    })?;
    Ok(Json(result))
}

/// POST `/upload-image` — store the image under its file name and return its URL.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadImageResponse>, AppError> {
    let image = read_image(multipart).await?;
    let image_url = state.blobs.upload_image(&image).await.map_err(|err| {
        tracing::error!(file_name = %image.file_name, error = %err, "image upload failed");
        AppError::internal_with(detail::IMAGE_UPLOAD_FAILED, err)
    })?;
    Ok(Json(UploadImageResponse { image_url }))
}

/// Pull the `image` part out of the form. Other parts are skipped.
async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::unprocessable("image part must carry a file name"))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;

        return Ok(ImageUpload {
            file_name,
            content_type,
            data,
        });
    }

    Err(AppError::unprocessable(format!(
        "multipart field `{}` is required",
        IMAGE_FIELD
    )))
}
