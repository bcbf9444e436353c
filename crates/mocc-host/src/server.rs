//! HTTP surface: device registration, realtime negotiation and the Event Grid
//! webhook.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::events::{self, Delivery, Handler};
use crate::flows::devices::{self, DeviceRegistration};
use crate::{AppContext, HostError};

const USER_ID_HEADER: &str = "x-user-id";

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/register_device", post(register_device))
        .route("/api/negotiate", post(negotiate).get(negotiate))
        .route("/api/events/{handler}", post(handle_events))
        .with_state(ctx)
}

/// Serve the router on `addr` until the process stops.
pub async fn serve(ctx: AppContext, addr: SocketAddr) -> Result<(), HostError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"errors": [{"message": "Internal server error"}]})),
    )
        .into_response()
}

#[instrument(name = "http.register_device", skip_all)]
async fn register_device(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        warn!("register_device body is not JSON");
        return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
    };
    let Some(registration) = DeviceRegistration::from_request(user_id(&headers), &body) else {
        warn!("register_device without user id or handle");
        return (StatusCode::BAD_REQUEST, "Missing userId or handle").into_response();
    };

    match devices::register_device(&ctx, &registration).await {
        Ok(_) => Json(json!({"data": {"registerDevice": true}})).into_response(),
        Err(e) => {
            error!(error = %e, user_id = %registration.user_id, "device registration failed");
            internal_error()
        }
    }
}

#[instrument(name = "http.negotiate", skip_all)]
async fn negotiate(State(ctx): State<AppContext>, headers: HeaderMap) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Unauthorized: Missing x-user-id header",
        )
            .into_response();
    };

    match devices::negotiate(&ctx, user_id) {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            error!(error = %e, user_id, "negotiation failed");
            internal_error()
        }
    }
}

#[instrument(name = "http.events", skip_all, fields(handler = tracing::field::Empty))]
async fn handle_events(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    tracing::Span::current().record("handler", name.as_str());
    let Some(handler) = Handler::from_name(&name) else {
        warn!("unknown event handler");
        return StatusCode::NOT_FOUND.into_response();
    };
    let events = match serde_json::from_slice::<Delivery>(&body) {
        Ok(delivery) => delivery.into_events(),
        Err(e) => {
            warn!(error = %e, "undecodable event delivery");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let Some(code) = events::validation_code(&events) {
        info!("answering subscription validation");
        return Json(json!({"validationResponse": code})).into_response();
    }

    events::deliver(&ctx, handler, &events).await;
    StatusCode::OK.into_response()
}
