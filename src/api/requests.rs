use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::core::report::{ReportPeriod, ReportSummary};
use crate::core::store::RequestFilter;
use crate::core::{Actor, CoreError};
use crate::db::models::request::{NetworkRequest, NewRequest, RequestStatus, StatusUpdate};
use crate::utils::api_response::ApiResponse;

/// Bounded retry for lock-timeout failures. The engine never retries
/// inside its critical sections; contention is resolved out here.
const LOCK_RETRIES: u32 = 3;

async fn with_lock_retry<T>(
    mut op: impl FnMut() -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(err) if err.is_retryable() && attempt + 1 < LOCK_RETRIES => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(20 * attempt as u64)).await;
            }
            result => return result,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
    pub user_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RequestListQuery {
    fn into_filter(self) -> RequestFilter {
        RequestFilter {
            status: self.status,
            user_id: self.user_id,
            from: self
                .start_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            to: self
                .end_date
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(|dt| dt.and_utc()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportQuery {
    pub period: Option<ReportPeriod>,
    pub status: Option<RequestStatus>,
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Network request submitted", body = NetworkRequest),
        (status = 400, description = "Invalid payload or unavailable location"),
        (status = 404, description = "Unknown resource id"),
        (status = 409, description = "Insufficient resource quantity"),
        (status = 503, description = "Lock contention, retry later")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewRequest>,
) -> Result<ApiResponse<NetworkRequest>, ApiResponse<()>> {
    let created = with_lock_retry(|| state.lifecycle.create(&actor, &payload)).await?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Network request submitted",
        created,
    ))
}

#[utoipa::path(
    get,
    path = "/requests",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("user_id" = Option<i32>, Query, description = "Filter by user (admins only)"),
        ("start_date" = Option<String>, Query, description = "Earliest creation date, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Latest creation date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "List of requests", body = Vec<NetworkRequest>)
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<RequestListQuery>,
) -> Result<ApiResponse<Vec<NetworkRequest>>, ApiResponse<()>> {
    let requests = state.lifecycle.list(&actor, query.into_filter())?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request retrieved", body = NetworkRequest),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<NetworkRequest>, ApiResponse<()>> {
    let request = state.lifecycle.get(&actor, request_id)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved",
        request,
    ))
}

#[utoipa::path(
    put,
    path = "/requests/{request_id}/status",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Request decided", body = NetworkRequest),
        (status = 400, description = "Status must be Approved or Rejected"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided"),
        (status = 503, description = "Lock contention, retry later")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_request_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<i32>,
    Json(payload): Json<StatusUpdate>,
) -> Result<ApiResponse<NetworkRequest>, ApiResponse<()>> {
    let decided = match payload.status {
        RequestStatus::Approved => {
            with_lock_retry(|| state.lifecycle.approve(&actor, request_id)).await?
        }
        RequestStatus::Rejected => {
            with_lock_retry(|| state.lifecycle.reject(&actor, request_id)).await?
        }
        other => {
            return Err(CoreError::validation(format!(
                "status must be Approved or Rejected, not {other}"
            ))
            .into())
        }
    };
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request status updated",
        decided,
    ))
}

#[utoipa::path(
    put,
    path = "/requests/{request_id}/cancel",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request cancelled", body = NetworkRequest),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided"),
        (status = 503, description = "Lock contention, retry later")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<NetworkRequest>, ApiResponse<()>> {
    let cancelled = with_lock_retry(|| state.lifecycle.cancel(&actor, request_id)).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request cancelled",
        cancelled,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/reports/generate",
    params(
        ("period" = Option<String>, Query, description = "daily | weekly | monthly (default monthly)"),
        ("status" = Option<String>, Query, description = "Restrict to one status")
    ),
    responses(
        (status = 200, description = "Aggregated report", body = ReportSummary),
        (status = 403, description = "Administrators only")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn generate_report(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ReportQuery>,
) -> Result<ApiResponse<ReportSummary>, ApiResponse<()>> {
    if !actor.is_admin() {
        return Err(CoreError::forbidden("only administrators can generate reports").into());
    }
    let period = query.period.unwrap_or(ReportPeriod::Monthly);
    let report = state.reports.generate(period, query.status)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Report generated",
        report,
    ))
}

pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/reports/generate", get(generate_report))
        .route("/requests/{request_id}", get(get_request))
        .route("/requests/{request_id}/status", put(update_request_status))
        .route("/requests/{request_id}/cancel", put(cancel_request))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        list_requests,
        get_request,
        update_request_status,
        cancel_request,
        generate_report
    ),
    components(schemas(NetworkRequest, NewRequest, StatusUpdate, ReportSummary)),
    tags(
        (name = "Requests", description = "Network resource request lifecycle")
    )
)]
pub struct RequestDoc;
