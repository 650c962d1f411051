use crate::api::error::AppError;
use crate::api::handlers::videos::verify_purchase;
use crate::entities::{prelude::*, reviews, users, videos};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

const TOP_REVIEWS_DEFAULT: u64 = 8;
const TOP_REVIEWS_MAX: u64 = 20;

#[derive(Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i16,
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct TopReviewsQuery {
    pub limit: Option<u64>,
}

/// A review flattened for the catalog UI: reviewer name attached, video
/// title only where the listing spans videos.
#[derive(Serialize, ToSchema)]
pub struct ReviewView {
    pub id: String,
    pub rating: i16,
    pub title: String,
    pub body: String,
    pub created_date: chrono::DateTime<Utc>,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: ReviewView,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewListResponse {
    pub success: bool,
    pub reviews: Vec<ReviewView>,
}

async fn user_names(
    db: &DatabaseConnection,
    ids: Vec<String>,
) -> Result<HashMap<String, String>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(Users::find()
        .filter(users::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect())
}

fn view(review: reviews::Model, user_name: Option<&String>, video_title: Option<String>) -> ReviewView {
    ReviewView {
        id: review.id,
        rating: review.rating,
        title: review.title,
        body: review.body,
        created_date: review.created_at,
        user_name: user_name.cloned().unwrap_or_else(|| "Anonymous".to_string()),
        video_title,
    }
}

#[utoipa::path(
    post,
    path = "/api/videos/{id}/reviews",
    params(("id" = String, Path, description = "Video ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 403, description = "Purchase required"),
        (status = 409, description = "Review already exists")
    ),
    security(("jwt" = [])),
    tag = "reviews"
)]
pub async fn create_review(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(video_id): Path<String>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    if payload.title.trim().is_empty() || payload.body.trim().is_empty() {
        return Err(AppError::BadRequest(
            "rating, title, and body required".to_string(),
        ));
    }
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    verify_purchase(&state.db, &user.id, &video_id).await?;

    let existing = Reviews::find()
        .filter(reviews::Column::UserId.eq(&user.id))
        .filter(reviews::Column::VideoId.eq(&video_id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Review already exists".to_string()));
    }

    let review = reviews::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user.id.clone()),
        video_id: Set(video_id),
        rating: Set(payload.rating),
        title: Set(payload.title.trim().to_string()),
        body: Set(payload.body.trim().to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            success: true,
            review: view(review, Some(&user.name), None),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}/reviews",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Reviews for one video", body = ReviewListResponse)
    ),
    tag = "reviews"
)]
pub async fn list_reviews_for_video(
    State(state): State<crate::AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let reviews = Reviews::find()
        .filter(reviews::Column::VideoId.eq(&video_id))
        .order_by_desc(reviews::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let names = user_names(
        &state.db,
        reviews.iter().map(|r| r.user_id.clone()).collect(),
    )
    .await?;

    Ok(Json(ReviewListResponse {
        success: true,
        reviews: reviews
            .into_iter()
            .map(|r| {
                let name = names.get(&r.user_id);
                view(r, name, None)
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/reviews/top",
    params(("limit" = Option<u64>, Query, description = "Max reviews to return (capped at 20)")),
    responses(
        (status = 200, description = "Most recent reviews across the catalog", body = ReviewListResponse)
    ),
    tag = "reviews"
)]
pub async fn list_top_reviews(
    State(state): State<crate::AppState>,
    Query(query): Query<TopReviewsQuery>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(TOP_REVIEWS_DEFAULT)
        .min(TOP_REVIEWS_MAX);

    let reviews = Reviews::find()
        .order_by_desc(reviews::Column::CreatedAt)
        .limit(limit)
        .all(&state.db)
        .await?;

    let names = user_names(
        &state.db,
        reviews.iter().map(|r| r.user_id.clone()).collect(),
    )
    .await?;

    let video_ids: Vec<String> = reviews.iter().map(|r| r.video_id.clone()).collect();
    let titles: HashMap<String, String> = if video_ids.is_empty() {
        HashMap::new()
    } else {
        Videos::find()
            .filter(videos::Column::Id.is_in(video_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|v| (v.id, v.title))
            .collect()
    };

    Ok(Json(ReviewListResponse {
        success: true,
        reviews: reviews
            .into_iter()
            .map(|r| {
                let name = names.get(&r.user_id);
                let title = titles.get(&r.video_id).cloned();
                view(r, name, title)
            })
            .collect(),
    }))
}
