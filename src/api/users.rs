use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::core::{Actor, CoreError};
use crate::db::models::user::{UpdateUser, UserInfo};
use crate::middleware::auth::PermissionCache;
use crate::utils::api_response::ApiResponse;

fn require_admin(actor: &Actor) -> Result<(), ApiResponse<()>> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CoreError::forbidden("only administrators can manage users").into())
    }
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserInfo>),
        (status = 403, description = "Administrators only")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<ApiResponse<Vec<UserInfo>>, ApiResponse<()>> {
    require_admin(&actor)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved",
        state.users.list(),
    ))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User retrieved", body = UserInfo),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    require_admin(&actor)?;
    let user = state.users.get(user_id)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "User retrieved",
        user.info(),
    ))
}

#[utoipa::path(
    put,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserInfo),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(permission_cache): Extension<PermissionCache>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    require_admin(&actor)?;
    let updated = state.users.update(user_id, payload)?;
    // A role change must take effect now, not when the cache entry expires.
    permission_cache.invalidate(&user_id);
    Ok(ApiResponse::success(StatusCode::OK, "User updated", updated))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(permission_cache): Extension<PermissionCache>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_admin(&actor)?;
    if user_id == actor.user_id {
        return Err(CoreError::validation("administrators cannot delete themselves").into());
    }
    state.users.delete(user_id)?;
    permission_cache.invalidate(&user_id);
    Ok(ApiResponse::success(StatusCode::OK, "User deleted", ()))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}", put(update_user))
        .route("/users/{user_id}", delete(delete_user))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_users, get_user, update_user, delete_user),
    components(schemas(UserInfo, UpdateUser)),
    tags(
        (name = "Users", description = "User administration")
    )
)]
pub struct UserDoc;
