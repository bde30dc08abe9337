use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{ImageKind, UploadedImage};
use crate::services::{CleanupGuard, DocumentWriter};
use crate::state::AppState;

/// The multipart field every image part must use.
const IMAGES_FIELD: &str = "images";

/// Fixed user-facing download name, independent of on-disk naming.
const DOWNLOAD_NAME: &str = "converted.pdf";

/// Converts 1–50 uploaded JPEG/PNG images into a single PDF, one full-bleed
/// A4 page per image in submission order, and returns it as a download.
///
/// Every artifact the request creates is registered with a cleanup guard the
/// moment it exists on disk. The guard fires once the pipeline has settled,
/// whatever the outcome.
pub async fn convert_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    info!(request_id = %request_id, "Starting conversion request");

    // The pipeline runs on a detached task: a disconnecting client drops this
    // handler future, but the task still settles and its cleanup guard still
    // fires exactly once, after the writer has stopped touching the disk.
    let task_state = state.clone();
    let task_id = request_id.clone();
    let pipeline = tokio::spawn(async move {
        let mut cleanup = CleanupGuard::new(task_state.store.clone());
        let result = run_conversion(&task_state, multipart, &mut cleanup, &task_id).await;
        if let Err(ref e) = result {
            warn!(
                request_id = %task_id,
                error_code = e.error_code(),
                artifacts = cleanup.tracked(),
                "Conversion failed"
            );
        }
        result
        // cleanup guard drops here, releasing uploads and any generated document
    });

    match pipeline.await {
        Ok(Ok(pdf)) => {
            info!(
                request_id = %request_id,
                bytes = pdf.len(),
                total_time_ms = start.elapsed().as_millis() as u64,
                "Conversion completed successfully"
            );
            (
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
                    ),
                ],
                pdf,
            )
                .into_response()
        }
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(request_id = %request_id, error = %e, "conversion task aborted");
            AppError::internal("conversion task aborted").into_response()
        }
    }
}

async fn run_conversion(
    state: &AppState,
    mut multipart: Multipart,
    cleanup: &mut CleanupGuard,
    request_id: &str,
) -> AppResult<Vec<u8>> {
    let images = ingest_images(state, &mut multipart, cleanup, request_id).await?;

    let out_path = state.store.allocate_output_path();
    cleanup.track(&out_path);

    // Page synthesis is CPU-bound; keep it off the async workers. The
    // transfer stage only starts once the writer task has resolved Ok.
    let writer = DocumentWriter::new();
    let job_images = images.clone();
    let job_path = out_path.clone();
    let pages = tokio::task::spawn_blocking(move || writer.write_document(&job_images, &job_path))
        .await
        .map_err(|e| AppError::conversion(format!("writer task failed: {}", e)))??;

    debug!(request_id = %request_id, pages = pages, "document finalized");

    tokio::fs::read(&out_path)
        .await
        .map_err(|e| AppError::conversion(format!("failed to read generated document: {}", e)))
}

/// Streaming accept: each part is validated and durably written before the
/// next one is looked at, so a late rejection still leaves earlier files
/// tracked for cleanup.
async fn ingest_images(
    state: &AppState,
    multipart: &mut Multipart,
    cleanup: &mut CleanupGuard,
    request_id: &str,
) -> AppResult<Vec<UploadedImage>> {
    let config = &state.config;
    let mut images: Vec<UploadedImage> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        // plain text form values pass through untouched
        if file_name.is_none() && content_type.is_none() {
            continue;
        }

        if field_name != IMAGES_FIELD {
            return Err(AppError::UnexpectedField { field: field_name });
        }

        if images.len() >= config.max_files {
            return Err(AppError::TooManyFiles {
                limit: config.max_files,
            });
        }

        let declared = content_type.unwrap_or_default();
        let kind = ImageKind::from_mime(&declared).ok_or(AppError::UnsupportedMediaType {
            content_type: declared,
        })?;

        let data = field.bytes().await?;
        if data.len() > config.max_file_bytes() {
            return Err(AppError::PayloadTooLarge {
                limit_mb: config.max_file_size_mb,
            });
        }

        let original = file_name.unwrap_or_else(|| format!("image.{}", kind.extension()));
        let image = state
            .store
            .persist(&original, kind, data)
            .await
            .map_err(|e| {
                error!(request_id = %request_id, error = %e, "failed to persist upload");
                AppError::from(e)
            })?;
        cleanup.track(&image.path);

        debug!(
            request_id = %request_id,
            index = images.len(),
            original = %image.original_name,
            size = image.size,
            "image accepted"
        );
        images.push(image);
    }

    if images.is_empty() {
        return Err(AppError::NoFilesProvided);
    }
    Ok(images)
}
