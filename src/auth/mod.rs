// Authentication module
// Registration, login, token refresh, email verification and user administration

pub mod code;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

pub use repository::{PgTokenStore, PgUserStore};
pub use service::{AuthService, TokenService, UserService};
