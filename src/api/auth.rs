use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use bcrypt::verify;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::config::Config;
use crate::core::Actor;
use crate::db::models::user::{UpdateUser, UserInfo, ROLE_USER};
use crate::db::users::NewUser;
use crate::utils::api_response::ApiResponse;

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The username of the authenticated user.
    pub username: String,
    /// The role assigned to the user.
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

/// Represents a request to register a new user.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Represents a request to log in.
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login response carrying the bearer token.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// A user's edit of their own profile.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "User registered", body = UserInfo),
        (status = 400, description = "Missing username or password"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    // Self-registration always yields a regular user; roles are granted by
    // an administrator afterwards.
    let user = state.users.create(NewUser {
        username: payload.username,
        password: payload.password,
        full_name: payload.full_name,
        email: payload.email,
        role: ROLE_USER.to_string(),
    })?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "User registered",
        user,
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "Authentication",
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let invalid = || {
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
            None,
        )
    };

    let Some(user) = state.users.find_by_username(payload.username.trim()) else {
        warn!(username = %payload.username, "login attempt for unknown user");
        return Err(invalid());
    };

    match verify(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!(username = %user.username, "invalid password attempt");
            return Err(invalid());
        }
        Err(e) => {
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password verification error",
                Some(serde_json::json!({ "error": e.to_string() })),
            ));
        }
    }

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role.clone(),
        exp: chrono::Utc::now().timestamp() as usize + config.token_ttl_secs as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token generation failed",
            Some(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    info!(username = %user.username, "login successful");
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            token,
            user: user.info(),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user profile", body = UserInfo),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user = state.users.get(actor.user_id)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile retrieved",
        user.info(),
    ))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    tag = "Authentication",
    responses(
        (status = 200, description = "Profile updated", body = UserInfo),
        (status = 400, description = "No fields to update"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    // Role is deliberately absent here; users cannot promote themselves.
    let updated = state.users.update(
        actor.user_id,
        UpdateUser {
            full_name: payload.full_name,
            email: payload.email,
            role: None,
            password: payload.password,
        },
    )?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile updated",
        updated,
    ))
}

/// Public authentication routes: register and log in.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Token-protected profile routes.
pub fn secure_auth_routes() -> Router<AppState> {
    Router::new().route("/auth/profile", get(get_profile).put(update_profile))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(register, login, get_profile, update_profile),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        UpdateProfileRequest,
        UserInfo
    )),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;
