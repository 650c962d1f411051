pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod uploader;
pub mod utils;

use crate::config::AppConfig;
use crate::services::coordinator::UploadCoordinator;
use crate::services::payments::PaymentProvider;
use crate::services::storage::ObjectStorage;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::videos::my_library,
        api::handlers::videos::stream_video,
        api::handlers::reviews::create_review,
        api::handlers::reviews::list_reviews_for_video,
        api::handlers::reviews::list_top_reviews,
        api::handlers::purchases::create_checkout,
        api::handlers::purchases::webhook,
        api::handlers::admin::get_users,
        api::handlers::admin::get_purchases,
        api::handlers::admin::create_video,
        api::handlers::admin::update_video,
        api::handlers::admin_uploads::get_upload_url,
        api::handlers::admin_uploads::init_multipart,
        api::handlers::admin_uploads::presign_part,
        api::handlers::admin_uploads::complete_multipart,
        api::handlers::admin_uploads::abort_multipart,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::UserPublic,
            api::handlers::auth::MeResponse,
            api::handlers::videos::VideoListResponse,
            api::handlers::videos::VideoResponse,
            api::handlers::videos::StreamUrlResponse,
            api::handlers::reviews::CreateReviewRequest,
            api::handlers::reviews::ReviewView,
            api::handlers::reviews::ReviewResponse,
            api::handlers::reviews::ReviewListResponse,
            api::handlers::purchases::CreateCheckoutRequest,
            api::handlers::purchases::CreateCheckoutResponse,
            api::handlers::admin::AdminUserView,
            api::handlers::admin::AdminUserListResponse,
            api::handlers::admin::AdminPurchaseView,
            api::handlers::admin::AdminPurchaseListResponse,
            api::handlers::admin::CreateVideoRequest,
            api::handlers::admin::UpdateVideoRequest,
            api::handlers::admin::VideoMutationResponse,
            api::handlers::admin_uploads::DirectUploadRequest,
            api::handlers::admin_uploads::DirectUploadResponse,
            api::handlers::admin_uploads::InitMultipartRequest,
            api::handlers::admin_uploads::InitMultipartResponse,
            api::handlers::admin_uploads::PresignPartRequest,
            api::handlers::admin_uploads::PresignPartResponse,
            api::handlers::admin_uploads::CompleteMultipartRequest,
            api::handlers::admin_uploads::CompleteMultipartResponse,
            api::handlers::admin_uploads::AbortMultipartRequest,
            api::handlers::admin_uploads::AbortMultipartResponse,
            services::coordinator::RawPart,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "videos", description = "Catalog and streaming endpoints"),
        (name = "reviews", description = "Review endpoints"),
        (name = "purchases", description = "Checkout and entitlement endpoints"),
        (name = "admin", description = "Catalog administration"),
        (name = "admin-uploads", description = "Upload coordinator endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn ObjectStorage>,
    pub coordinator: Arc<UploadCoordinator>,
    pub payments: Arc<dyn PaymentProvider>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{admin, admin_uploads, auth, health, purchases, reviews, videos};
    use api::middleware::auth::{admin_middleware, auth_middleware};

    let admin_routes = Router::new()
        .route("/users", get(admin::get_users))
        .route("/purchases", get(admin::get_purchases))
        .route("/videos", post(admin::create_video))
        .route("/videos/:id", put(admin::update_video))
        .route("/videos/upload", post(admin_uploads::get_upload_url))
        .route("/videos/multipart/init", post(admin_uploads::init_multipart))
        .route(
            "/videos/multipart/presign",
            post(admin_uploads::presign_part),
        )
        .route(
            "/videos/multipart/complete",
            post(admin_uploads::complete_multipart),
        )
        .route(
            "/videos/multipart/abort",
            post(admin_uploads::abort_multipart),
        )
        .layer(from_fn(admin_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/auth/me",
            get(auth::me).layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/api/videos", get(videos::list_videos))
        .route(
            "/api/videos/my-library",
            get(videos::my_library).layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route(
            "/api/videos/:id/stream",
            get(videos::stream_video).layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route(
            "/api/videos/:id/reviews",
            get(reviews::list_reviews_for_video),
        )
        .route(
            "/api/videos/:id/reviews",
            post(reviews::create_review).layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/api/videos/:id", get(videos::get_video))
        .route("/api/reviews/top", get(reviews::list_top_reviews))
        .route(
            "/api/purchases/create-checkout",
            post(purchases::create_checkout)
                .layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/api/purchases/webhook", post(purchases::webhook))
        .nest("/api/admin", admin_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
