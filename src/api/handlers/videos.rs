use crate::api::error::AppError;
use crate::entities::{prelude::*, purchases, users, videos};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct VideoListResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub videos: Vec<videos::Model>,
}

#[derive(Serialize, ToSchema)]
pub struct VideoResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub video: videos::Model,
}

#[derive(Serialize, ToSchema)]
pub struct StreamUrlResponse {
    pub success: bool,
    #[serde(rename = "streamUrl")]
    pub stream_url: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
}

/// Entitlement predicate: a completed purchase linking this user and video.
pub(crate) async fn verify_purchase(
    db: &DatabaseConnection,
    user_id: &str,
    video_id: &str,
) -> Result<(), AppError> {
    let purchase = Purchases::find()
        .filter(purchases::Column::UserId.eq(user_id))
        .filter(purchases::Column::VideoId.eq(video_id))
        .filter(purchases::Column::Status.eq("completed"))
        .one(db)
        .await?;

    if purchase.is_none() {
        return Err(AppError::Forbidden(
            "You must purchase this video".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/videos",
    responses(
        (status = 200, description = "Active catalog", body = VideoListResponse)
    ),
    tag = "videos"
)]
pub async fn list_videos(
    State(state): State<crate::AppState>,
) -> Result<Json<VideoListResponse>, AppError> {
    let videos = Videos::find()
        .filter(videos::Column::IsActive.eq(true))
        .order_by_desc(videos::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(VideoListResponse {
        success: true,
        videos,
    }))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video detail", body = VideoResponse),
        (status = 404, description = "Video not found")
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video = Videos::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    Ok(Json(VideoResponse {
        success: true,
        video,
    }))
}

#[utoipa::path(
    get,
    path = "/api/videos/my-library",
    responses(
        (status = 200, description = "Purchased videos", body = VideoListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "videos"
)]
pub async fn my_library(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<VideoListResponse>, AppError> {
    let video_ids: Vec<String> = Purchases::find()
        .filter(purchases::Column::UserId.eq(&user.id))
        .filter(purchases::Column::Status.eq("completed"))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.video_id)
        .collect();

    let videos = if video_ids.is_empty() {
        Vec::new()
    } else {
        Videos::find()
            .filter(videos::Column::Id.is_in(video_ids))
            .order_by_desc(videos::Column::CreatedAt)
            .all(&state.db)
            .await?
    };

    Ok(Json(VideoListResponse {
        success: true,
        videos,
    }))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}/stream",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Time-limited streaming URL", body = StreamUrlResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not purchased"),
        (status = 404, description = "Video not found")
    ),
    security(("jwt" = [])),
    tag = "videos"
)]
pub async fn stream_video(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<StreamUrlResponse>, AppError> {
    let video = Videos::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    verify_purchase(&state.db, &user.id, &video.id).await?;

    let expires_in = state.config.storage.presign_ttl_secs;
    let stream_url = state
        .storage
        .presign_get(&video.video_key, expires_in, "video/mp4", "inline")
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate streaming URL: {}", e);
            AppError::Internal("Failed to generate streaming URL".to_string())
        })?;

    Ok(Json(StreamUrlResponse {
        success: true,
        stream_url,
        expires_in,
    }))
}
