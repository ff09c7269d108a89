// HTTP handlers for account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    middleware::CurrentUser,
    models::{
        AuthResponse, LoginRequest, Pagination, RefreshRequest, RegisterRequest, RevokeQuery,
        StatusResponse, TokenResponse, UpdateUserRequest, UserResponse, VerifyRequest,
    },
};
use crate::error::ApiError;
use crate::AppState;

/// Handler for POST /api/v1/user/register
/// Creates an account, emails a verification code and returns a token pair
#[utoipa::path(
    post,
    path = "/api/v1/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or undeliverable email", body = String, example = json!({"error_code": "VALIDATION_ERROR"})),
        (status = 409, description = "Email already exists", body = String, example = json!({"error_code": "CONFLICT"})),
        (status = 500, description = "Email provider or database failure", body = String, example = json!({"error_code": "INTERNAL_ERROR"}))
    ),
    tag = "user"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    tracing::debug!("Registering user: {}", payload.email);
    payload.validate()?;

    let (user, tokens) = state
        .auth
        .register(&payload.email, &payload.password, &payload.username)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            tokens,
        }),
    ))
}

/// Handler for POST /api/v1/user/login
#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid input", body = String, example = json!({"error_code": "VALIDATION_ERROR"})),
        (status = 403, description = "Wrong password", body = String, example = json!({"error_code": "FORBIDDEN"})),
        (status = 404, description = "User not found", body = String, example = json!({"error_code": "NOT_FOUND"}))
    ),
    tag = "user"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate()?;

    let (user, tokens) = state.auth.login(&payload.email, &payload.password).await?;

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// Handler for POST /api/v1/user/refresh
/// Exchanges a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/user/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 400, description = "Invalid input", body = String, example = json!({"error_code": "VALIDATION_ERROR"})),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = String, example = json!({"error_code": "UNAUTHORIZED"}))
    ),
    tag = "user"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate()?;

    let access = state.auth.refresh(&payload.token).await?;
    Ok(Json(access))
}

/// Handler for POST /api/v1/user/verify
#[utoipa::path(
    post,
    path = "/api/v1/user/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Email verified", body = StatusResponse),
        (status = 400, description = "Invalid code format or already verified", body = String, example = json!({"error_code": "BAD_REQUEST"})),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error_code": "UNAUTHORIZED"})),
        (status = 403, description = "Wrong code", body = String, example = json!({"error_code": "FORBIDDEN"}))
    ),
    tag = "user"
)]
pub async fn verify(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    payload.validate()?;

    state.auth.verify_email(&user, &payload.code).await?;
    Ok(Json(StatusResponse::ok("email verified")))
}

/// Handler for GET /api/v1/user/me
#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error_code": "UNAUTHORIZED"}))
    ),
    tag = "user"
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Handler for POST /api/v1/user/logout
/// Revokes every token of the current user
#[utoipa::path(
    post,
    path = "/api/v1/user/logout",
    responses(
        (status = 200, description = "Logged out", body = StatusResponse),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error_code": "UNAUTHORIZED"}))
    ),
    tag = "user"
)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StatusResponse>, ApiError> {
    state.auth.logout(&user).await?;
    Ok(Json(StatusResponse::ok("logged out")))
}

/// Handler for GET /api/v1/users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(Pagination),
    responses(
        (status = 200, description = "Page of users", body = Vec<UserResponse>),
        (status = 400, description = "Invalid pagination", body = String, example = json!({"error_code": "VALIDATION_ERROR"})),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error_code": "UNAUTHORIZED"})),
        (status = 403, description = "Missing users:read", body = String, example = json!({"error_code": "FORBIDDEN"}))
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    page.validate()?;

    let users = state.auth.users().list(page.limit, page.offset).await?;

    tracing::debug!("Listed {} users", users.len());
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Handler for GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Missing users:read", body = String, example = json!({"error_code": "FORBIDDEN"})),
        (status = 404, description = "User not found", body = String, example = json!({"error_code": "NOT_FOUND"}))
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.users().get_by_id(id).await?;
    Ok(Json(user.into()))
}

/// Handler for PATCH /api/v1/users/{id}
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid input", body = String, example = json!({"error_code": "VALIDATION_ERROR"})),
        (status = 403, description = "Missing users:write", body = String, example = json!({"error_code": "FORBIDDEN"})),
        (status = 404, description = "User not found", body = String, example = json!({"error_code": "NOT_FOUND"}))
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate()?;

    let user = state.auth.update_user(id, payload).await?;

    tracing::info!("Updated user {}", id);
    Ok(Json(user.into()))
}

/// Handler for DELETE /api/v1/users/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Missing users:write", body = String, example = json!({"error_code": "FORBIDDEN"})),
        (status = 404, description = "User not found", body = String, example = json!({"error_code": "NOT_FOUND"}))
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.auth.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for DELETE /api/v1/users/{id}/tokens
/// Revokes the user's tokens, optionally only those of one type
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/tokens",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        RevokeQuery
    ),
    responses(
        (status = 200, description = "Tokens revoked", body = StatusResponse),
        (status = 403, description = "Missing users:write", body = String, example = json!({"error_code": "FORBIDDEN"})),
        (status = 404, description = "User not found", body = String, example = json!({"error_code": "NOT_FOUND"}))
    ),
    tag = "users"
)]
pub async fn revoke_tokens(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RevokeQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user = state.auth.users().get_by_id(id).await?;
    let tokens = state.auth.tokens();

    let removed = match query.token_type {
        Some(token_type) => tokens.revoke(user.id, token_type).await?,
        None => tokens.revoke_all(user.id).await?,
    };

    Ok(Json(StatusResponse::ok(&format!("revoked {} tokens", removed))))
}
