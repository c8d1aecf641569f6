use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::core::{Actor, CoreError};
use crate::db::models::location::{Location, NewLocation, UpdateLocation};
use crate::utils::api_response::ApiResponse;

fn require_admin(actor: &Actor) -> Result<(), ApiResponse<()>> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CoreError::forbidden("only administrators can manage locations").into())
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationListQuery {
    /// When true, only locations where network service can be requested.
    #[serde(default)]
    pub available: bool,
}

#[utoipa::path(
    get,
    path = "/locations",
    params(("available" = Option<bool>, Query, description = "Only network-available locations")),
    responses((status = 200, description = "Locations retrieved", body = Vec<Location>)),
    tag = "Locations"
)]
pub async fn list_locations(
    State(state): State<AppState>,
    Query(query): Query<LocationListQuery>,
) -> ApiResponse<Vec<Location>> {
    ApiResponse::success(
        StatusCode::OK,
        "Locations retrieved",
        state.locations.list(query.available),
    )
}

#[utoipa::path(
    get,
    path = "/locations/{location_id}",
    params(("location_id" = i32, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location retrieved", body = Location),
        (status = 404, description = "Location not found")
    ),
    tag = "Locations"
)]
pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<i32>,
) -> Result<ApiResponse<Location>, ApiResponse<()>> {
    let location = state.locations.get(location_id)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Location retrieved",
        location,
    ))
}

#[utoipa::path(
    post,
    path = "/locations",
    request_body = NewLocation,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 400, description = "Invalid location"),
        (status = 403, description = "Administrators only")
    ),
    tag = "Locations",
    security(("bearerAuth" = []))
)]
pub async fn create_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewLocation>,
) -> Result<ApiResponse<Location>, ApiResponse<()>> {
    require_admin(&actor)?;
    let location = state.locations.create(payload)?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Location created",
        location,
    ))
}

#[utoipa::path(
    put,
    path = "/locations/{location_id}",
    params(("location_id" = i32, Path, description = "Location ID")),
    request_body = UpdateLocation,
    responses(
        (status = 200, description = "Location updated", body = Location),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Location not found")
    ),
    tag = "Locations",
    security(("bearerAuth" = []))
)]
pub async fn update_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(location_id): Path<i32>,
    Json(payload): Json<UpdateLocation>,
) -> Result<ApiResponse<Location>, ApiResponse<()>> {
    require_admin(&actor)?;
    let location = state.locations.update(location_id, payload)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Location updated",
        location,
    ))
}

#[utoipa::path(
    delete,
    path = "/locations/{location_id}",
    params(("location_id" = i32, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location deleted"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Location not found")
    ),
    tag = "Locations",
    security(("bearerAuth" = []))
)]
pub async fn delete_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(location_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_admin(&actor)?;
    state.locations.delete(location_id)?;
    Ok(ApiResponse::success(StatusCode::OK, "Location deleted", ()))
}

pub fn location_read_routes() -> Router<AppState> {
    Router::new()
        .route("/locations", get(list_locations))
        .route("/locations/{location_id}", get(get_location))
}

pub fn location_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/locations", post(create_location))
        .route("/locations/{location_id}", put(update_location))
        .route("/locations/{location_id}", delete(delete_location))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_locations,
        get_location,
        create_location,
        update_location,
        delete_location
    ),
    components(schemas(Location, NewLocation, UpdateLocation)),
    tags(
        (name = "Locations", description = "Service location management")
    )
)]
pub struct LocationDoc;
