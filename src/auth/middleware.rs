// Authentication middleware for protected routes

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::auth::{error::AuthError, models::User, token::bearer_token};
use crate::config::rights;
use crate::error::ApiError;
use crate::AppState;

/// Progress of one request through authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    TokenExtracted,
    TokenVerified,
    UserLoaded,
    Authorized,
    Rejected,
}

/// The authenticated user, placed in request extensions by [`authorize`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

struct Tracker<'a> {
    stage: AuthStage,
    endpoint: &'a str,
}

impl<'a> Tracker<'a> {
    fn new(endpoint: &'a str) -> Self {
        Self {
            stage: AuthStage::Unauthenticated,
            endpoint,
        }
    }

    fn advance(&mut self, next: AuthStage) {
        debug!("auth {}: {:?} -> {:?}", self.endpoint, self.stage, next);
        self.stage = next;
    }

    fn reject(&mut self, err: ApiError) -> ApiError {
        warn!(
            "auth {}: rejected at {:?} with {}",
            self.endpoint,
            self.stage,
            err.status_code()
        );
        self.advance(AuthStage::Rejected);
        err
    }
}

/// Authenticate the bearer token and check the user's role holds `required` rights
///
/// Missing credentials are rejected before any store lookup.
pub async fn authorize(
    state: &AppState,
    required: &[&str],
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let endpoint = request.uri().path().to_string();
    let mut tracker = Tracker::new(&endpoint);

    let raw = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| bearer_token(value).to_string())
        .unwrap_or_default();
    if raw.is_empty() {
        return Err(tracker.reject(ApiError::Unauthorized("auth header is empty".to_string())));
    }
    tracker.advance(AuthStage::TokenExtracted);

    let user = match state.auth.authenticate(&raw).await {
        Ok(user) => user,
        Err(AuthError::UserNotFound) => {
            tracker.advance(AuthStage::TokenVerified);
            return Err(tracker.reject(ApiError::Unauthorized("user not found".to_string())));
        }
        Err(AuthError::Store(e)) => {
            error!("auth {}: lookup failed: {}", endpoint, e);
            tracker.advance(AuthStage::TokenVerified);
            return Err(tracker.reject(ApiError::Unauthorized("user not found".to_string())));
        }
        Err(e) => return Err(tracker.reject(e.into())),
    };
    tracker.advance(AuthStage::TokenVerified);
    tracker.advance(AuthStage::UserLoaded);

    if !state.roles.has_rights(&user.role, required) {
        return Err(tracker.reject(
            AuthError::InsufficientRights {
                role: user.role.clone(),
            }
            .into(),
        ));
    }
    tracker.advance(AuthStage::Authorized);

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Any authenticated user
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &[], request, next).await
}

pub async fn require_users_read(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &[rights::USERS_READ], request, next).await
}

pub async fn require_users_write(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &[rights::USERS_WRITE], request, next).await
}
