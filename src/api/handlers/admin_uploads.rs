use crate::api::error::AppError;
use crate::services::coordinator::{CoordinatorError, DirectUploadAuth, RawPart};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct DirectUploadRequest {
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub folder: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DirectUploadResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub authorization: DirectUploadAuth,
    #[serde(rename = "s3Key")]
    pub s3_key: String,
    pub bucket: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct InitMultipartRequest {
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub folder: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct InitMultipartResponse {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    #[serde(rename = "s3Key")]
    pub s3_key: String,
    pub bucket: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PresignPartRequest {
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    #[serde(rename = "s3Key")]
    pub s3_key: Option<String>,
    #[serde(rename = "partNumber")]
    pub part_number: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PresignPartResponse {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteMultipartRequest {
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    #[serde(rename = "s3Key")]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub parts: Vec<RawPart>,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteMultipartResponse {
    pub success: bool,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AbortMultipartRequest {
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    #[serde(rename = "s3Key")]
    pub s3_key: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AbortMultipartResponse {
    pub success: bool,
}

fn required(field: Option<String>, name: &'static str) -> Result<String, AppError> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoordinatorError::MissingField(name).into())
}

#[utoipa::path(
    post,
    path = "/api/admin/videos/upload",
    request_body = DirectUploadRequest,
    responses(
        (status = 200, description = "Short-lived direct upload authorization", body = DirectUploadResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin-uploads"
)]
pub async fn get_upload_url(
    State(state): State<crate::AppState>,
    Json(req): Json<DirectUploadRequest>,
) -> Result<Json<DirectUploadResponse>, AppError> {
    let (filename, content_type) = match (req.filename, req.content_type) {
        (Some(f), Some(c)) if !f.trim().is_empty() && !c.trim().is_empty() => (f, c),
        _ => {
            return Err(AppError::BadRequest(
                "filename and contentType are required".to_string(),
            ));
        }
    };

    let grant = state
        .coordinator
        .begin_direct_upload(&filename, &content_type, req.folder.as_deref())
        .await?;

    Ok(Json(DirectUploadResponse {
        authorization: grant.authorization,
        s3_key: grant.key,
        bucket: grant.bucket,
        file_url: grant.file_url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos/multipart/init",
    request_body = InitMultipartRequest,
    responses(
        (status = 200, description = "Multipart session opened", body = InitMultipartResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin-uploads"
)]
pub async fn init_multipart(
    State(state): State<crate::AppState>,
    Json(req): Json<InitMultipartRequest>,
) -> Result<Json<InitMultipartResponse>, AppError> {
    let filename = required(req.filename, "filename")?;

    let grant = state
        .coordinator
        .init_session(&filename, req.content_type.as_deref(), req.folder.as_deref())
        .await?;

    Ok(Json(InitMultipartResponse {
        upload_id: grant.upload_id,
        s3_key: grant.key,
        bucket: grant.bucket,
        file_url: grant.file_url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos/multipart/presign",
    request_body = PresignPartRequest,
    responses(
        (status = 200, description = "Single-use part upload URL", body = PresignPartResponse),
        (status = 400, description = "Invalid part number"),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin-uploads"
)]
pub async fn presign_part(
    State(state): State<crate::AppState>,
    Json(req): Json<PresignPartRequest>,
) -> Result<Json<PresignPartResponse>, AppError> {
    let upload_id = required(req.upload_id, "uploadId")?;
    let s3_key = required(req.s3_key, "s3Key")?;
    let part_number = req
        .part_number
        .ok_or_else(|| AppError::from(CoordinatorError::MissingField("partNumber")))?;

    let upload_url = state
        .coordinator
        .presign_part(&upload_id, &s3_key, part_number)
        .await?;

    Ok(Json(PresignPartResponse { upload_url }))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos/multipart/complete",
    request_body = CompleteMultipartRequest,
    responses(
        (status = 200, description = "Session finalized", body = CompleteMultipartResponse),
        (status = 400, description = "No valid parts"),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin-uploads"
)]
pub async fn complete_multipart(
    State(state): State<crate::AppState>,
    Json(req): Json<CompleteMultipartRequest>,
) -> Result<Json<CompleteMultipartResponse>, AppError> {
    let upload_id = required(req.upload_id, "uploadId")?;
    let s3_key = required(req.s3_key, "s3Key")?;

    let file_url = state
        .coordinator
        .complete_session(&upload_id, &s3_key, req.parts)
        .await?;

    Ok(Json(CompleteMultipartResponse {
        success: true,
        file_url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos/multipart/abort",
    request_body = AbortMultipartRequest,
    responses(
        (status = 200, description = "Session released", body = AbortMultipartResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin-uploads"
)]
pub async fn abort_multipart(
    State(state): State<crate::AppState>,
    Json(req): Json<AbortMultipartRequest>,
) -> Result<Json<AbortMultipartResponse>, AppError> {
    let upload_id = required(req.upload_id, "uploadId")?;
    let s3_key = required(req.s3_key, "s3Key")?;

    state.coordinator.abort_session(&upload_id, &s3_key).await?;

    Ok(Json(AbortMultipartResponse { success: true }))
}
