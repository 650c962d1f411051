use crate::api::error::AppError;
use crate::entities::{prelude::*, purchases, users, videos};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub struct AdminUserView {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub created_date: chrono::DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminUserListResponse {
    pub success: bool,
    pub users: Vec<AdminUserView>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminPurchaseView {
    pub id: String,
    pub user_email: Option<String>,
    pub video_id: String,
    pub amount_paid: f64,
    pub payment_status: String,
    pub created_date: chrono::DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminPurchaseListResponse {
    pub success: bool,
    pub purchases: Vec<AdminPurchaseView>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "s3Key")]
    pub s3_key: String,
    /// Price in cents
    pub price: i64,
    pub instructor: String,
    pub category: String,
    /// Duration in minutes
    pub duration: i32,
    pub thumbnail_url: String,
    pub instructor_bio: Option<String>,
    pub instructor_photo: Option<String>,
    pub skill_level: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub preview_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub duration: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub instructor_name: Option<String>,
    pub instructor_bio: Option<String>,
    pub instructor_photo: Option<String>,
    pub skill_level: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub preview_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(rename = "videoKey")]
    pub video_key: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VideoMutationResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub video: videos::Model,
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = AdminUserListResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_users(
    State(state): State<crate::AppState>,
) -> Result<Json<AdminUserListResponse>, AppError> {
    let users = Users::find()
        .order_by_desc(users::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(AdminUserListResponse {
        success: true,
        users: users
            .into_iter()
            .map(|u| AdminUserView {
                id: u.id,
                full_name: u.name,
                email: u.email,
                role: u.role,
                created_date: u.created_at,
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/purchases",
    responses(
        (status = 200, description = "All purchases", body = AdminPurchaseListResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_purchases(
    State(state): State<crate::AppState>,
) -> Result<Json<AdminPurchaseListResponse>, AppError> {
    let purchases = Purchases::find()
        .order_by_desc(purchases::Column::PurchasedAt)
        .all(&state.db)
        .await?;

    let user_ids: Vec<String> = purchases.iter().map(|p| p.user_id.clone()).collect();
    let emails: HashMap<String, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        Users::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect()
    };

    Ok(Json(AdminPurchaseListResponse {
        success: true,
        purchases: purchases
            .into_iter()
            .map(|p| AdminPurchaseView {
                user_email: emails.get(&p.user_id).cloned(),
                video_id: p.video_id,
                amount_paid: p.amount_cents as f64 / 100.0,
                payment_status: p.status,
                created_date: p.purchased_at,
                id: p.id,
            })
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Catalog entry created", body = VideoMutationResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn create_video(
    State(state): State<crate::AppState>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<VideoMutationResponse>), AppError> {
    if payload.title.trim().is_empty()
        || payload.description.trim().is_empty()
        || payload.s3_key.trim().is_empty()
        || payload.instructor.trim().is_empty()
        || payload.category.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "title, description, s3Key, price, instructor, and category are required".to_string(),
        ));
    }
    if payload.thumbnail_url.trim().is_empty() || payload.duration <= 0 {
        return Err(AppError::BadRequest(
            "thumbnail_url and duration are required".to_string(),
        ));
    }

    let video_url = payload
        .video_url
        .unwrap_or_else(|| state.storage.public_url(&payload.s3_key));

    let video = videos::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        instructor_name: Set(payload.instructor),
        instructor_bio: Set(payload.instructor_bio),
        instructor_photo: Set(payload.instructor_photo),
        thumbnail_url: Set(payload.thumbnail_url),
        video_url: Set(video_url),
        video_key: Set(payload.s3_key),
        preview_url: Set(payload.preview_url),
        price_cents: Set(payload.price),
        duration_minutes: Set(payload.duration),
        category: Set(payload.category),
        skill_level: Set(payload.skill_level.unwrap_or_else(|| "all".to_string())),
        tags: Set(json!(payload.tags.unwrap_or_default())),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(VideoMutationResponse {
            success: true,
            video,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Catalog entry updated", body = VideoMutationResponse),
        (status = 404, description = "Video not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_video(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateVideoRequest>,
) -> Result<Json<VideoMutationResponse>, AppError> {
    let video = Videos::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    let mut active = video.into_active_model();

    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price_cents = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(duration) = payload.duration {
        active.duration_minutes = Set(duration);
    }
    if let Some(thumbnail_url) = payload.thumbnail_url {
        active.thumbnail_url = Set(thumbnail_url);
    }
    if let Some(instructor_name) = payload.instructor_name {
        active.instructor_name = Set(instructor_name);
    }
    if let Some(instructor_bio) = payload.instructor_bio {
        active.instructor_bio = Set(Some(instructor_bio));
    }
    if let Some(instructor_photo) = payload.instructor_photo {
        active.instructor_photo = Set(Some(instructor_photo));
    }
    if let Some(skill_level) = payload.skill_level {
        active.skill_level = Set(skill_level);
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(json!(tags));
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(preview_url) = payload.preview_url {
        active.preview_url = Set(Some(preview_url));
    }
    if let Some(video_url) = payload.video_url {
        active.video_url = Set(video_url);
    }
    if let Some(video_key) = payload.video_key {
        active.video_key = Set(video_key);
    }

    let video = active.update(&state.db).await?;

    Ok(Json(VideoMutationResponse {
        success: true,
        video,
    }))
}
