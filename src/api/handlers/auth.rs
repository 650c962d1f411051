use crate::api::error::AppError;
use crate::entities::{prelude::*, purchases, users, videos};
use crate::utils::auth::create_jwt;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserPublic {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserPublic,
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "purchasedVideos")]
    #[schema(value_type = Vec<Object>)]
    pub purchased_videos: Vec<videos::Model>,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "User already exists")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = payload.email.trim().to_lowercase();
    if payload.name.trim().is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("name and email are required".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let existing = Users::find()
        .filter(users::Column::Email.eq(&email))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest("User already exists".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set("user".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    let token = create_jwt(&user.id, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user: UserPublic {
                id: user.id,
                name: user.name,
                email: user.email,
            },
            token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide email and password".to_string(),
        ));
    }

    let user = Users::find()
        .filter(users::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let parsed_hash = argon2::PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = create_jwt(&user.id, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        success: true,
        user: UserPublic {
            id: user.id,
            name: user.name,
            email: user.email,
        },
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user profile", body = MeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<MeResponse>, AppError> {
    let video_ids: Vec<String> = Purchases::find()
        .filter(purchases::Column::UserId.eq(&user.id))
        .filter(purchases::Column::Status.eq("completed"))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.video_id)
        .collect();

    let purchased_videos = if video_ids.is_empty() {
        Vec::new()
    } else {
        Videos::find()
            .filter(videos::Column::Id.is_in(video_ids))
            .all(&state.db)
            .await?
    };

    Ok(Json(MeResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        purchased_videos,
    }))
}
