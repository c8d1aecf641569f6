use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use tracing::error;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::config::Config;
use crate::core::Actor;
use crate::utils::api_response::ApiResponse;

/// Per-user role lookups resolved by the rbac middleware, cached with a TTL.
pub type PermissionCache = Arc<Cache<i32, Actor>>;

pub fn create_permission_cache() -> PermissionCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

fn unauthorized(message: &str) -> Response {
    ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, message, None).into_response()
}

/// Token authentication. A missing, malformed, or expired bearer token is a
/// 401, the caller's signal to discard its session.
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let token_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header format"))?;

    let token = token_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid token format (missing 'Bearer ' prefix)"))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        unauthorized("Invalid or expired token")
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Resolves the authenticated [`Actor`] from the user store, so role checks
/// run against current data rather than whatever the token was issued with.
pub async fn rbac_middleware(
    State(state): State<AppState>,
    Extension(permission_cache): Extension<PermissionCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        unauthorized("Missing JWT claims in request")
    })?;

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| unauthorized("Invalid user ID format in JWT claims"))?;

    if let Some(actor) = permission_cache.get(&user_id) {
        req.extensions_mut().insert(actor);
        return Ok(next.run(req).await);
    }

    // A token for a deleted user is as dead as an expired one.
    let user = state
        .users
        .get(user_id)
        .map_err(|_| unauthorized("Invalid or expired token"))?;
    let actor = Actor {
        user_id: user.id,
        role: user.role,
    };

    permission_cache.insert(user_id, actor.clone());
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
