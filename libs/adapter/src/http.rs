use crate::bot::BotHandler;
use crate::cloud_adapter::CloudAdapter;
use crate::error::AdapterError;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use bfm_core::Activity;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    adapter: Arc<CloudAdapter>,
    bot: Arc<dyn BotHandler>,
}

/// HTTP ingress surface: `POST /api/messages` maps the Authorization
/// header and JSON activity body onto one adapter turn.
pub fn router(adapter: Arc<CloudAdapter>, bot: Arc<dyn BotHandler>) -> Router {
    Router::new()
        .route("/api/messages", post(process_messages))
        .with_state(AppState { adapter, bot })
}

async fn process_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(activity): Json<Activity>,
) -> Response {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    match state
        .adapter
        .process_activity(auth_header, activity, state.bot.as_ref())
        .await
    {
        Ok(Some(invoke)) => {
            let status =
                StatusCode::from_u16(invoke.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            match invoke.body {
                Some(body) => (status, Json(body)).into_response(),
                None => (status, Json(Value::Null)).into_response(),
            }
        }
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(AdapterError::Auth(err)) => {
            warn!(error = %err, "request authentication failed");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Err(AdapterError::InvalidArgument(message)) => {
            warn!(message, "rejected malformed request");
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(err) => {
            error!(error = %err, "turn failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
