use axum::{
    Extension, Json,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
use crate::services::{OperatorProfile, TokenClaims};

// ============================================================================
// Middleware
// ============================================================================

/// Requires `Authorization: Bearer <token>` with a token that verifies.
///
/// A missing header, another scheme and a bad token all get the same 401. On
/// success the verified claims are available to handlers as an extension.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(ApiError::unauthorized)?;

    let claims = state
        .tokens()
        .verify(token)
        .map_err(|_| ApiError::unauthorized())?;

    tracing::Span::current().record("user_id", claims.subject_id.value());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), ApiError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!("Register rejected: {}", e.body_text());
        ApiError::bad_request(format!("Invalid request body: {}", e.body_text()))
    })?;

    let id = state
        .auth_service()
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RegisterResponse {
            id,
            message: "Operator registered successfully".to_string(),
        })),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!("Login rejected: {}", e.body_text());
        ApiError::bad_request(format!("Invalid request body: {}", e.body_text()))
    })?;

    let token = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        message: "Login successful".to_string(),
    })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<Json<ApiResponse<OperatorProfile>>, ApiError> {
    let profile = state.auth_service().get_operator(claims.subject_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
