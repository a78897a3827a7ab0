//! REST API route handlers.
//!
//! Every handler except [`health`] and [`callback`] takes an [`AuthUser`],
//! which rejects the request with `401` before the handler runs.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::header::{AUTHORIZATION, LOCATION};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use nexora_auth_engine::{CallbackParams, bearer_token, callback_redirect};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The user id resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        let user_id = state.identity.verify(token).await?;
        Ok(Self(user_id))
    }
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "Integrations API active" }))
}

// ---------------------------------------------------------------------------
// GET /connections
// ---------------------------------------------------------------------------

/// Registered providers with the caller's connection status.
pub async fn connections(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let integrations = state.manager.connections(&user_id).await?;
    Ok(Json(json!({ "integrations": integrations })))
}

// ---------------------------------------------------------------------------
// GET /{provider}/start
// ---------------------------------------------------------------------------

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let url = state.manager.start_flow(&user_id, &provider)?;
    Ok(Json(json!({ "url": url })))
}

// ---------------------------------------------------------------------------
// GET /{provider}/callback
// ---------------------------------------------------------------------------

/// Vendor redirect target.  Always answers with a redirect to the frontend.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let outcome = state.manager.handle_callback(&provider, &params).await;
    if let Err(e) = &outcome {
        tracing::warn!(provider = %provider, error = %e, "oauth callback failed");
    }

    let location = callback_redirect(&state.config.frontend_url, &provider, &outcome);
    (StatusCode::FOUND, [(LOCATION, location)])
}

// ---------------------------------------------------------------------------
// POST /{provider}/disconnect
// ---------------------------------------------------------------------------

pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    state.manager.disconnect(&user_id, &provider).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// GET /{provider}/projects
// ---------------------------------------------------------------------------

/// Every failure, an unknown provider included, is reported as a `500`.
pub async fn projects(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let projects = state
        .manager
        .list_projects(&user_id, &provider)
        .await
        .map_err(ApiError::server_error)?;
    Ok(Json(json!({ "projects": projects })))
}
