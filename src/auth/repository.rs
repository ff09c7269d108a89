// Database repositories for users and tokens

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::models::{NewToken, NewUser, Token, TokenType, User};

const USER_COLUMNS: &str = "id, email, password_hash, role, verified_email, verification_code, username, created_at, updated_at";
const TOKEN_COLUMNS: &str = "id, user_id, token, token_type, expires_at, created_at";

/// Persistence failures surfaced by the stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated")]
    Conflict,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Database(e),
        }
    }
}

/// User persistence gateway
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Issued-token persistence gateway
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create(&self, token: NewToken) -> Result<Token, StoreError>;
    /// Unexpired tokens of one type for a user, newest first
    async fn find_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<Vec<Token>, StoreError>;
    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64, StoreError>;
    async fn delete_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<u64, StoreError>;
}

/// Postgres-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, role, verified_email, verification_code, username)
            VALUES ($1, $2, $3, $4, FALSE, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.verification_code)
        .bind(&user.username)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = $1,
                password_hash = $2,
                role = $3,
                verified_email = $4,
                verification_code = $5,
                username = $6,
                updated_at = NOW()
            WHERE id = $7
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.verified_email)
        .bind(&user.verification_code)
        .bind(&user.username)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Postgres-backed token store
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(&self, token: NewToken) -> Result<Token, StoreError> {
        let created = sqlx::query_as::<_, Token>(&format!(
            r#"
            INSERT INTO tokens (id, user_id, token, token_type, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.token_type)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<Vec<Token>, StoreError> {
        let tokens = sqlx::query_as::<_, Token>(&format!(
            r#"
            SELECT {}
            FROM tokens
            WHERE user_id = $1 AND token_type = $2 AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .bind(token_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1 AND token_type = $2")
            .bind(user_id)
            .bind(token_type)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
