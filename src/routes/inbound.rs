//! Inbound SMS webhook.
//!
//! The messaging gateway delivers each inbound message here and is expected
//! to send the returned segments back to the hiker. The dispatcher runs
//! synchronously within the request.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::dispatcher::Dispatcher;

/// Shared application state for the webhook.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: Arc<Dispatcher>,
}

/// Inbound message as delivered by the gateway.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InboundSms {
    /// Sender's phone number in E.164 form.
    pub from: String,
    /// Raw message text.
    pub body: String,
}

/// Reply to be sent back, pre-segmented.
#[derive(Debug, Serialize, ToSchema)]
pub struct InboundReply {
    pub reply: Vec<String>,
}

/// Handle one inbound SMS and return the reply segments.
#[utoipa::path(
    post,
    path = "/api/v1/sms/inbound",
    tag = "SMS",
    request_body = InboundSms,
    responses(
        (status = 200, description = "Reply segments for the gateway to deliver", body = InboundReply),
        (status = 500, description = "Route store unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn inbound_sms(
    State(state): State<AppState>,
    Json(message): Json<InboundSms>,
) -> Result<Json<InboundReply>, AppError> {
    let reply = state
        .dispatcher
        .handle_inbound(&message.from, &message.body)
        .await?;
    Ok(Json(InboundReply { reply }))
}
