//! Per-client admission in front of the API routes.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::services::Admission;

const FORWARDED_FOR: &str = "x-forwarded-for";

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request, &state.trusted_proxies);

    match state.rate_limiter().admit(&client) {
        Admission::Allowed { .. } => next.run(request).await,
        Admission::Rejected { retry_after } => {
            ApiError::TooManyRequests { retry_after }.into_response()
        }
    }
}

/// The socket peer IP, or the first `X-Forwarded-For` hop when the peer is a
/// trusted proxy. Requests served without connect info share one bucket.
fn client_key(request: &Request, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return "unknown".to_string();
    };

    if trusted_proxies.contains(&peer)
        && let Some(forwarded) = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
    {
        return forwarded.to_string();
    }

    peer.to_string()
}
