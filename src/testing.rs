// In-memory stores and a stub mailer for unit and router tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::auth::models::{NewToken, NewUser, Token, TokenType, User};
use crate::auth::repository::{StoreError, TokenStore, UserStore};
use crate::auth::service::{AuthService, TokenService, UserService};
use crate::config::{default_role_rights, JwtConfig, RoleRights};
use crate::email::{EmailApi, EmailError};
use crate::AppState;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes";

/// User store enforcing case-insensitive email uniqueness
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    lookups: AtomicUsize,
    /// Pretend every email is free so the unique check happens at insert
    pub hide_existing: AtomicBool,
    /// Fail every read with a database error
    pub fail_lookups: AtomicBool,
}

impl MemoryUserStore {
    /// Number of read queries served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn begin_lookup(&self) -> Result<(), StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            verified_email: false,
            verification_code: user.verification_code,
            username: user.username,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.begin_lookup()?;
        self.users
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.begin_lookup()?;
        if self.hide_existing.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound);
        }
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        self.begin_lookup()?;
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        let stored = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        *stored = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Vec<Token>>,
    /// Fail every insert of this type
    pub fail_type: Mutex<Option<TokenType>>,
}

impl MemoryTokenStore {
    pub fn count(&self, user_id: Uuid, token_type: TokenType) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.token_type == token_type)
            .count()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(&self, token: NewToken) -> Result<Token, StoreError> {
        if *self.fail_type.lock().unwrap() == Some(token.token_type) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let created = Token {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token: token.token,
            token_type: token.token_type,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        self.tokens.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn find_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<Vec<Token>, StoreError> {
        let now = Utc::now();
        let mut found: Vec<Token> = self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.token_type == token_type && t.expires_at > now)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_by_owner_and_type(
        &self,
        user_id: Uuid,
        token_type: TokenType,
    ) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| !(t.user_id == user_id && t.token_type == token_type));
        Ok((before - tokens.len()) as u64)
    }
}

/// Records sent messages; address validity and send failures are switchable
#[derive(Default)]
pub struct StubMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub reject_addresses: AtomicBool,
    pub fail_send: AtomicBool,
}

impl StubMailer {
    /// Verification code from the last message sent to `to`
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _, _)| recipient == to)
            .and_then(|(_, html, _)| {
                let start = html.find("<b>")? + 3;
                let end = html.find("</b>")?;
                Some(html[start..end].to_string())
            })
    }
}

#[async_trait]
impl EmailApi for StubMailer {
    async fn send(&self, to: &str, html: &str, subject: &str) -> Result<(), EmailError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(EmailError::Provider("sending disabled".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), html.to_string(), subject.to_string()));
        Ok(())
    }

    async fn check(&self, _email: &str) -> Result<bool, EmailError> {
        Ok(!self.reject_addresses.load(Ordering::SeqCst))
    }
}

/// Services wired to in-memory adapters, with handles on each fake
pub struct TestHarness {
    pub users: Arc<MemoryUserStore>,
    pub tokens: Arc<MemoryTokenStore>,
    pub mailer: Arc<StubMailer>,
    pub auth: Arc<AuthService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_jwt(JwtConfig {
            secret: TEST_SECRET.to_string(),
            ..JwtConfig::default()
        })
    }

    pub fn with_jwt(jwt: JwtConfig) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let tokens = Arc::new(MemoryTokenStore::default());
        let mailer = Arc::new(StubMailer::default());

        let auth = Arc::new(AuthService::new(
            UserService::new(users.clone()),
            TokenService::new(tokens.clone(), &jwt),
            mailer.clone(),
        ));

        Self {
            users,
            tokens,
            mailer,
            auth,
        }
    }

    pub fn state(&self) -> AppState {
        self.state_with_roles(default_role_rights())
    }

    pub fn state_with_roles(&self, roles: RoleRights) -> AppState {
        AppState {
            auth: self.auth.clone(),
            roles: Arc::new(roles),
        }
    }
}
