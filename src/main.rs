mod auth;
mod config;
mod db;
mod email;
mod error;
mod validation;

use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    handlers,
    middleware::{require_auth, require_users_read, require_users_write},
    models::{
        AuthResponse, AuthTokens, LoginRequest, RefreshRequest, RegisterRequest, StatusResponse,
        TokenResponse, TokenType, UpdateUserRequest, UserResponse, VerifyRequest,
    },
    AuthService, PgTokenStore, PgUserStore, TokenService, UserService,
};
use config::{Config, RoleRights};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        ping,
        handlers::register,
        handlers::login,
        handlers::refresh,
        handlers::verify,
        handlers::me,
        handlers::logout,
        handlers::list_users,
        handlers::get_user,
        handlers::update_user,
        handlers::delete_user,
        handlers::revoke_tokens,
    ),
    components(
        schemas(
            AuthResponse, AuthTokens, LoginRequest, RefreshRequest, RegisterRequest,
            StatusResponse, TokenResponse, TokenType, UpdateUserRequest, UserResponse,
            VerifyRequest
        )
    ),
    tags(
        (name = "user", description = "Registration, login and session endpoints"),
        (name = "users", description = "User administration endpoints")
    ),
    info(
        title = "Account API",
        version = "1.0.0",
        description = "User accounts with JWT authentication and email verification"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub roles: Arc<RoleRights>,
}

/// Handler for GET /api/ping
#[utoipa::path(
    get,
    path = "/api/ping",
    responses(
        (status = 200, description = "Service is up", body = String, example = json!("pong"))
    ),
    tag = "user"
)]
async fn ping() -> Json<&'static str> {
    Json("pong")
}

/// Creates and configures the application router
fn create_router(state: AppState, debug: bool) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/api/ping", get(ping))
        .route("/api/v1/user/register", post(handlers::register))
        .route("/api/v1/user/login", post(handlers::login))
        .route("/api/v1/user/refresh", post(handlers::refresh));

    let authenticated = Router::new()
        .route("/api/v1/user/verify", post(handlers::verify))
        .route("/api/v1/user/me", get(handlers::me))
        .route("/api/v1/user/logout", post(handlers::logout))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let user_readers = Router::new()
        .route("/api/v1/users", get(handlers::list_users))
        .route("/api/v1/users/:id", get(handlers::get_user))
        .route_layer(from_fn_with_state(state.clone(), require_users_read));

    let user_writers = Router::new()
        .route(
            "/api/v1/users/:id",
            axum::routing::patch(handlers::update_user).delete(handlers::delete_user),
        )
        .route("/api/v1/users/:id/tokens", delete(handlers::revoke_tokens))
        .route_layer(from_fn_with_state(state.clone(), require_users_write));

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public)
        .merge(authenticated)
        .merge(user_readers)
        .merge(user_writers)
        .layer(cors)
        .with_state(state);

    if debug {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_level(true)
        .init();
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database.connection_url()).await?;
    db::migrate(&pool).await?;

    let auth = AuthService::new(
        UserService::new(Arc::new(PgUserStore::new(pool.clone()))),
        TokenService::new(Arc::new(PgTokenStore::new(pool)), &config.jwt),
        email::mailer_from_config(&config.maileroo)?,
    );
    let state = AppState {
        auth: Arc::new(auth),
        roles: Arc::new(config.roles.clone()),
    };

    let app = create_router(state, config.debug);
    let addr = config.server.addr();

    match &config.server.tls {
        Some(tls) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &tls.cert_file,
                &tls.key_file,
            )
            .await?;
            let socket = tokio::net::lookup_host(&addr)
                .await?
                .next()
                .ok_or("listen address did not resolve")?;

            tracing::info!("Account API is running on https://{}", addr);
            tracing::info!("Swagger UI available at https://{}/swagger-ui", addr);
            axum_server::bind_rustls(socket, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            tracing::info!("Account API is running on http://{}", addr);
            tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.debug);
    tracing::info!("Account API - Starting...");

    if let Err(e) = run(config).await {
        tracing::error!("Account API stopped: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod testing;
