//! HTTP handlers.

use std::path::Path as FsPath;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use super::error::ApiError;
use super::schemas::{
    success_body, success_object, EditRequest, HealthResponse, ImageRequest, MediaQuery,
};
use super::AppState;
use crate::generator::{AspectRatio, GenerationResult, GenerationSuccess};
use crate::service::{VideoParams, WorkflowOutcome, WorkflowParams, WorkflowStage};
use crate::storage::MediaFilter;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn into_success(
    result: GenerationResult,
    stage: Option<WorkflowStage>,
) -> Result<GenerationSuccess, ApiError> {
    match result {
        GenerationResult::Success(success) => Ok(success),
        GenerationResult::Failure(failure) => Err(ApiError::Generation { failure, stage }),
    }
}

pub async fn generate_image(
    State(service): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }
    let aspect_ratio = request
        .aspect_ratio
        .as_deref()
        .map(AspectRatio::parse_lenient)
        .unwrap_or_default();

    let result = service.generate_image(&request.prompt, aspect_ratio).await;
    let success = into_success(result, None)?;
    Ok(Json(success_body(
        "Image generated",
        success_object(&success, service.store()),
    )))
}

pub async fn generate_video(
    State(service): State<AppState>,
    payload: Result<Json<VideoParams>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(params) = payload?;
    let result = service.generate_video(params).await?;
    let success = into_success(result, None)?;
    Ok(Json(success_body(
        "Video generated",
        success_object(&success, service.store()),
    )))
}

pub async fn edit_video(
    State(service): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let result = service
        .edit_video(&request.video_path, &request.edit_options)
        .await?;
    let success = into_success(result, None)?;
    Ok(Json(success_body(
        "Video edited",
        success_object(&success, service.store()),
    )))
}

pub async fn complete_workflow(
    State(service): State<AppState>,
    payload: Result<Json<WorkflowParams>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(params) = payload?;
    match service.complete_workflow(params).await? {
        WorkflowOutcome::Completed {
            image,
            video,
            edited_video,
        } => {
            let store = service.store();
            let mut fields = Map::new();
            let image = into_success(image, Some(WorkflowStage::Image))?;
            fields.insert("image".into(), Value::Object(success_object(&image, store)));
            let video = into_success(video, Some(WorkflowStage::Video))?;
            fields.insert("video".into(), Value::Object(success_object(&video, store)));
            if let Some(edited) = edited_video {
                let edited = into_success(edited, Some(WorkflowStage::Edit))?;
                fields.insert(
                    "edited_video".into(),
                    Value::Object(success_object(&edited, store)),
                );
            }
            Ok(Json(success_body("Workflow completed", fields)))
        }
        WorkflowOutcome::Aborted { stage, result } => match result {
            GenerationResult::Failure(failure) => Err(ApiError::Generation {
                failure,
                stage: Some(stage),
            }),
            GenerationResult::Success(_) => Err(ApiError::Internal(format!(
                "{:?} stage produced no file",
                stage
            ))),
        },
    }
}

pub async fn generators(State(service): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = serde_json::to_value(service.generators())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut fields = match report {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    fields.insert(
        "image_generator".into(),
        Value::String(service.image_backend().to_string()),
    );
    Ok(Json(success_body("Generator status", fields)))
}

pub async fn list_media(
    State(service): State<AppState>,
    query: Result<Query<MediaQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let filter: MediaFilter = query.media_type.as_deref().unwrap_or("all").parse()?;
    let listing = service.store().list(filter).await?;
    let count = listing.count();
    let mut fields = match serde_json::to_value(listing) {
        Ok(Value::Object(object)) => object,
        _ => Map::new(),
    };
    fields.insert("count".into(), Value::from(count));
    Ok(Json(success_body("Media listed", fields)))
}

/// Store the multipart field `file` under `images/` or `videos/`.
pub async fn upload(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
    }

    let Some((file_name, bytes)) = upload else {
        return Err(ApiError::BadRequest("no file selected".to_string()));
    };
    if file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("no file selected".to_string()));
    }

    let store = service.store();
    let path = store.save_upload(&file_name, &bytes).await?;
    let mut fields = Map::new();
    fields.insert("filename".into(), Value::String(file_name));
    fields.insert("path".into(), Value::String(path.to_string_lossy().into_owned()));
    if let Some(relative) = store.relative(&path) {
        fields.insert("relative_path".into(), Value::String(relative));
    }
    if let Some(url) = store.web_path(&path) {
        fields.insert("url".into(), Value::String(url));
    }
    fields.insert("size_bytes".into(), Value::from(bytes.len()));
    Ok(Json(success_body("File uploaded", fields)))
}

pub async fn download_media(
    State(service): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(&service, &path, true).await
}

pub async fn uploads(
    State(service): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(&service, &path, false).await
}

async fn serve_file(service: &AppState, path: &str, attachment: bool) -> Result<Response, ApiError> {
    let full = service.store().resolve_download(path).await?;
    let bytes = tokio::fs::read(&full)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to read {}: {}", path, e)))?;

    let content_type = content_type(&full);
    if attachment {
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
        Ok((
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response())
    } else {
        Ok(([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response())
    }
}

fn content_type(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "txt" | "srt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type(FsPath::new("a/b.GIF")), "image/gif");
        assert_eq!(content_type(FsPath::new("clip.mp4")), "video/mp4");
        assert_eq!(content_type(FsPath::new("noext")), "application/octet-stream");
    }
}
