use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::core::{Actor, CoreError};
use crate::db::models::resource::{NewResource, ResourceType, UpdateResource};
use crate::utils::api_response::ApiResponse;

fn require_admin(actor: &Actor) -> Result<(), ApiResponse<()>> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CoreError::forbidden("only administrators can manage resources").into())
    }
}

#[utoipa::path(
    get,
    path = "/resources",
    responses((status = 200, description = "All resource pools", body = Vec<ResourceType>)),
    tag = "Resources"
)]
pub async fn list_resources(State(state): State<AppState>) -> ApiResponse<Vec<ResourceType>> {
    ApiResponse::success(StatusCode::OK, "Resources retrieved", state.inventory.list())
}

#[utoipa::path(
    get,
    path = "/resources/{resource_id}",
    params(("resource_id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource retrieved", body = ResourceType),
        (status = 404, description = "Resource not found")
    ),
    tag = "Resources"
)]
pub async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i32>,
) -> Result<ApiResponse<ResourceType>, ApiResponse<()>> {
    let resource = state.inventory.get(resource_id)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Resource retrieved",
        resource,
    ))
}

#[utoipa::path(
    post,
    path = "/resources",
    request_body = NewResource,
    responses(
        (status = 201, description = "Resource created", body = ResourceType),
        (status = 400, description = "Invalid resource"),
        (status = 403, description = "Administrators only")
    ),
    tag = "Resources",
    security(("bearerAuth" = []))
)]
pub async fn create_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewResource>,
) -> Result<ApiResponse<ResourceType>, ApiResponse<()>> {
    require_admin(&actor)?;
    let resource = state.inventory.create(payload)?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Resource created",
        resource,
    ))
}

#[utoipa::path(
    put,
    path = "/resources/{resource_id}",
    params(("resource_id" = i32, Path, description = "Resource ID")),
    request_body = UpdateResource,
    responses(
        (status = 200, description = "Resource updated", body = ResourceType),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Resource not found")
    ),
    tag = "Resources",
    security(("bearerAuth" = []))
)]
pub async fn update_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(resource_id): Path<i32>,
    Json(payload): Json<UpdateResource>,
) -> Result<ApiResponse<ResourceType>, ApiResponse<()>> {
    require_admin(&actor)?;
    let resource = state.inventory.update(resource_id, payload)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Resource updated",
        resource,
    ))
}

#[utoipa::path(
    delete,
    path = "/resources/{resource_id}",
    params(("resource_id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource deleted"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Resource not found"),
        (status = 409, description = "Resource is still referenced or reserved")
    ),
    tag = "Resources",
    security(("bearerAuth" = []))
)]
pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(resource_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_admin(&actor)?;
    state.lifecycle.delete_resource(resource_id)?;
    Ok(ApiResponse::success(StatusCode::OK, "Resource deleted", ()))
}

/// Public read access; anyone can see what exists and what is available.
pub fn resource_read_routes() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_resources))
        .route("/resources/{resource_id}", get(get_resource))
}

/// Admin-only mutation, behind the auth middlewares.
pub fn resource_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/resources", post(create_resource))
        .route("/resources/{resource_id}", put(update_resource))
        .route("/resources/{resource_id}", delete(delete_resource))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_resources,
        get_resource,
        create_resource,
        update_resource,
        delete_resource
    ),
    components(schemas(ResourceType, NewResource, UpdateResource)),
    tags(
        (name = "Resources", description = "Finite resource pool management")
    )
)]
pub struct ResourceDoc;
