use axum::middleware::{from_fn, from_fn_with_state};
use axum::Extension;
use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod app_state;
mod config;
mod core;
mod db;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::api::locations::LocationDoc;
use crate::api::requests::RequestDoc;
use crate::api::resources::ResourceDoc;
use crate::api::users::UserDoc;
use crate::app_state::AppState;
use crate::config::Config;
use crate::middleware::auth::{
    create_permission_cache, jwt_middleware, rbac_middleware, PermissionCache,
};

pub fn build_app(state: AppState, permission_cache: PermissionCache) -> Router {
    let merged_doc = AuthDoc::openapi()
        .merge_from(RequestDoc::openapi())
        .merge_from(ResourceDoc::openapi())
        .merge_from(LocationDoc::openapi())
        .merge_from(UserDoc::openapi());

    let public_routes = Router::new()
        .merge(api::health::health_routes())
        .merge(api::auth::auth_routes())
        .merge(api::resources::resource_read_routes())
        .merge(api::locations::location_read_routes());

    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::requests::request_routes())
        .merge(api::resources::resource_admin_routes())
        .merge(api::locations::location_admin_routes())
        .merge(api::users::user_routes())
        .route_layer(from_fn_with_state(state.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(permission_cache))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    Config::init()?;
    let config = Config::get();

    std::fs::create_dir_all("logs")?;
    let file_appender = tracing_appender::rolling::daily("logs", "nrm-backend.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking.and(std::io::stdout))
        .init();

    let state = AppState::new(config.lock_timeout);
    state.seed_admin(&config);

    let permission_cache = create_permission_cache();
    let app = build_app(state, permission_cache);

    run_server(app, &config.bind_addr).await
}

async fn run_server(app: Router, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server running at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("Received Ctrl+C, shutting down");
}
