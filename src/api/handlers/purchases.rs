use crate::api::error::AppError;
use crate::entities::{prelude::*, purchases, users};
use crate::services::payments::{CheckoutRequest, WebhookEvent};
use axum::{Extension, Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub success: bool,
    pub url: String,
}

#[utoipa::path(
    post,
    path = "/api/purchases/create-checkout",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout session created", body = CreateCheckoutResponse),
        (status = 400, description = "Already purchased"),
        (status = 404, description = "Video not found"),
        (status = 503, description = "Payment processing not configured")
    ),
    security(("jwt" = [])),
    tag = "purchases"
)]
pub async fn create_checkout(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, AppError> {
    if !state.payments.is_configured() {
        return Err(AppError::ServiceUnavailable(
            "Payment processing not configured yet".to_string(),
        ));
    }

    let existing = Purchases::find()
        .filter(purchases::Column::UserId.eq(&user.id))
        .filter(purchases::Column::VideoId.eq(&payload.video_id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "You already own this video".to_string(),
        ));
    }

    let video = Videos::find_by_id(&payload.video_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    let frontend = state.config.payments.frontend_url.trim_end_matches('/');
    let session = state
        .payments
        .create_checkout_session(&CheckoutRequest {
            user_id: user.id.clone(),
            video_id: video.id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            amount_cents: video.price_cents,
            success_url: format!("{frontend}/payment-success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{frontend}/video/{}", video.id),
        })
        .await
        .map_err(|e| {
            tracing::error!("Checkout error: {:?}", e);
            AppError::Internal("Error creating checkout session".to_string())
        })?;

    Ok(Json(CreateCheckoutResponse {
        success: true,
        url: session.url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/purchases/webhook",
    request_body(content = String, description = "Raw signed event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event received"),
        (status = 400, description = "Signature verification failed")
    ),
    tag = "purchases"
)]
pub async fn webhook(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = state
        .payments
        .verify_event(&body, signature)
        .map_err(|e| AppError::BadRequest(format!("Webhook Error: {e}")))?;

    if let WebhookEvent::CheckoutCompleted(completed) = event {
        // Entitlement grant. Failures are logged, not surfaced: the
        // provider retries deliveries and the unique (user, video) index
        // makes a duplicate grant a no-op.
        let purchase = purchases::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(completed.user_id.clone()),
            video_id: Set(completed.video_id.clone()),
            checkout_session_id: Set(Some(completed.session_id.clone())),
            amount_cents: Set(completed.amount_total_cents),
            status: Set("completed".to_string()),
            purchased_at: Set(Utc::now()),
        };

        match purchase.insert(&state.db).await {
            Ok(_) => {
                tracing::info!(
                    user_id = %completed.user_id,
                    video_id = %completed.video_id,
                    "purchase completed"
                );
            }
            Err(e) => {
                tracing::error!("Error processing purchase: {:?}", e);
            }
        }
    }

    Ok(Json(json!({ "received": true })))
}
