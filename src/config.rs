// Application configuration
// Built once at startup from the environment (and an optional .env file)
// and handed by reference to every constructor that needs it.

use std::collections::{HashMap, HashSet};

/// Errors raised while assembling the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub maileroo: MailerooConfig,
    pub roles: RoleRights,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
}

/// Database connection settings
///
/// Either a full `DATABASE_URL` or the individual DSN parts.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub user: String,
    pub password: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    /// Connection string for the pool
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.ssl_mode
        )
    }
}

/// Signing secret and token lifetimes (minutes)
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiration: i64,
    pub refresh_token_expiration: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MailerooConfig {
    pub from_email: String,
    pub sending_api_key: Option<String>,
    pub verification_api_key: Option<String>,
}

impl MailerooConfig {
    /// The provider is only used when both API keys are present
    pub fn is_configured(&self) -> bool {
        self.sending_api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.verification_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

pub mod rights {
    pub const PROFILE_READ: &str = "profile:read";
    pub const PROFILE_WRITE: &str = "profile:write";
    pub const USERS_READ: &str = "users:read";
    pub const USERS_WRITE: &str = "users:write";
}

/// Role to rights mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRights {
    roles: HashMap<String, HashSet<String>>,
}

impl RoleRights {
    pub fn new(roles: HashMap<String, Vec<String>>) -> Self {
        Self {
            roles: roles
                .into_iter()
                .map(|(role, rights)| (role, rights.into_iter().collect()))
                .collect(),
        }
    }

    /// Parse a JSON object such as `{"user": ["profile:read"], "admin": [...]}`
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let roles: HashMap<String, Vec<String>> = serde_json::from_str(raw)?;
        Ok(Self::new(roles))
    }

    /// Whether `role` holds every right in `required`
    ///
    /// An empty requirement is satisfied by any role, including unknown ones.
    pub fn has_rights(&self, role: &str, required: &[&str]) -> bool {
        if required.is_empty() {
            return true;
        }
        match self.roles.get(role) {
            Some(granted) => required.iter().all(|right| granted.contains(*right)),
            None => false,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_expiration: 15,
            refresh_token_expiration: 60 * 24 * 7,
        }
    }
}

/// Rights used when `ROLE_RIGHTS` is not set
pub fn default_role_rights() -> RoleRights {
    use rights::*;
    let mut roles = HashMap::new();
    roles.insert(
        "user".to_string(),
        vec![PROFILE_READ.to_string(), PROFILE_WRITE.to_string()],
    );
    roles.insert(
        "admin".to_string(),
        vec![
            PROFILE_READ.to_string(),
            PROFILE_WRITE.to_string(),
            USERS_READ.to_string(),
            USERS_WRITE.to_string(),
        ],
    );
    RoleRights::new(roles)
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let debug = parse_bool("DEBUG", get("DEBUG"))?;

        let listen_tls = parse_bool("LISTEN_TLS", get("LISTEN_TLS"))?;
        let tls = if listen_tls {
            Some(TlsConfig {
                cert_file: get("TLS_CERT_FILE").ok_or(ConfigError::Missing("TLS_CERT_FILE"))?,
                key_file: get("TLS_KEY_FILE").ok_or(ConfigError::Missing("TLS_KEY_FILE"))?,
            })
        } else {
            None
        };

        let server = ServerConfig {
            host: get_or("HOST", "0.0.0.0"),
            port: parse_num("PORT", get("PORT"), 8080)?,
            tls,
        };

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            user: get_or("DB_USER", "postgres"),
            password: get_or("DB_PASSWORD", "postgres"),
            name: get_or("DB_NAME", "postgres"),
            host: get_or("DB_HOST", "localhost"),
            port: parse_num("DB_PORT", get("DB_PORT"), 5432)?,
            ssl_mode: get_or("DB_SSL_MODE", "disable"),
        };

        let defaults = JwtConfig::default();
        let jwt = JwtConfig {
            secret: get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            access_token_expiration: parse_num(
                "JWT_ACCESS_TOKEN_EXPIRATION",
                get("JWT_ACCESS_TOKEN_EXPIRATION"),
                defaults.access_token_expiration,
            )?,
            refresh_token_expiration: parse_num(
                "JWT_REFRESH_TOKEN_EXPIRATION",
                get("JWT_REFRESH_TOKEN_EXPIRATION"),
                defaults.refresh_token_expiration,
            )?,
        };
        if jwt.access_token_expiration <= 0 || jwt.refresh_token_expiration <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_*_TOKEN_EXPIRATION",
                message: "token lifetimes must be positive".to_string(),
            });
        }

        let maileroo = MailerooConfig {
            from_email: get_or("MAILEROO_FROM_EMAIL", "no-reply@localhost"),
            sending_api_key: get("MAILEROO_SENDING_API_KEY"),
            verification_api_key: get("MAILEROO_VERIFICATION_API_KEY"),
        };

        let roles = match get("ROLE_RIGHTS") {
            Some(raw) => RoleRights::from_json(&raw).map_err(|e| ConfigError::Invalid {
                key: "ROLE_RIGHTS",
                message: e.to_string(),
            })?,
            None => default_role_rights(),
        };

        Ok(Self {
            debug,
            server,
            database,
            jwt,
            maileroo,
            roles,
        })
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                message: format!("expected a boolean, got '{}'", v),
            }),
        },
    }
}

fn parse_num<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}
