// Authentication services - business logic layer

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    code::generate_code,
    error::AuthError,
    models::{
        AuthTokens, NewToken, NewUser, Token, TokenResponse, TokenType, UpdateUserRequest, User,
        DEFAULT_ROLE,
    },
    password::PasswordService,
    repository::{StoreError, TokenStore, UserStore},
    token::{bearer_token, TokenSigner},
};
use crate::config::JwtConfig;
use crate::email::{verification_email, EmailApi};

fn user_not_found(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound => AuthError::UserNotFound,
        other => AuthError::Store(other),
    }
}

/// User account operations
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create an unverified account carrying `verification_code`
    ///
    /// Duplicate emails are rejected by a pre-check and again by the store's
    /// unique constraint when two registrations race.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
        verification_code: &str,
    ) -> Result<User, AuthError> {
        if self.email_taken(email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = PasswordService::hash_password(password)?;

        let user = self
            .store
            .create(NewUser {
                email: email.to_string(),
                password_hash,
                username: username.to_string(),
                role: DEFAULT_ROLE.to_string(),
                verification_code: Some(verification_code.to_string()),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => AuthError::EmailAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, AuthError> {
        match self.store.get_by_email(email).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.store.get_by_email(email).await.map_err(user_not_found)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User, AuthError> {
        self.store.get_by_id(id).await.map_err(user_not_found)
    }

    /// Confirm the user's email with the code they were sent
    pub async fn verify_email(&self, user: &User, submitted_code: &str) -> Result<User, AuthError> {
        let expected = match (&user.verification_code, user.verified_email) {
            (Some(code), false) => code,
            _ => return Err(AuthError::AlreadyVerified),
        };

        if expected != submitted_code {
            tracing::debug!("Wrong verification code for user {}", user.id);
            return Err(AuthError::InvalidCode);
        }

        let verified = User {
            verified_email: true,
            verification_code: None,
            ..user.clone()
        };
        let updated = self.store.update(&verified).await.map_err(user_not_found)?;

        tracing::info!("User {} verified their email", updated.id);
        Ok(updated)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list(limit, offset).await?)
    }

    /// Apply an administrative patch; omitted fields keep their values
    pub async fn update(&self, id: Uuid, patch: UpdateUserRequest) -> Result<User, AuthError> {
        let existing = self.get_by_id(id).await?;

        let verified_email = patch.verified_email.unwrap_or(existing.verified_email);
        // An unverified account always holds a code it can verify with
        let verification_code = if verified_email {
            None
        } else {
            existing
                .verification_code
                .clone()
                .or_else(|| Some(generate_code()))
        };

        let changed = User {
            username: patch.username.unwrap_or_else(|| existing.username.clone()),
            role: patch.role.unwrap_or_else(|| existing.role.clone()),
            verified_email,
            verification_code,
            ..existing
        };

        self.store.update(&changed).await.map_err(user_not_found)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        self.store.delete(id).await.map_err(user_not_found)?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}

/// Issues, persists and revokes signed tokens
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    signer: TokenSigner,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, jwt: &JwtConfig) -> Self {
        Self {
            store,
            signer: TokenSigner::new(jwt.secret.clone()),
            access_ttl: Duration::minutes(jwt.access_token_expiration),
            refresh_ttl: Duration::minutes(jwt.refresh_token_expiration),
        }
    }

    fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Sign a token of `token_type` for `user_id` and persist it
    pub async fn issue(&self, user_id: Uuid, token_type: TokenType) -> Result<Token, AuthError> {
        let expires_at = Utc::now() + self.ttl(token_type);
        let token = self.signer.issue(user_id, expires_at, token_type)?;

        let stored = self
            .store
            .create(NewToken {
                user_id,
                token,
                token_type,
                expires_at,
            })
            .await?;

        tracing::debug!("Issued {} token for user {}", token_type, user_id);
        Ok(stored)
    }

    /// Issue an access token then a refresh token
    ///
    /// Not atomic: when the refresh token cannot be stored, the access token
    /// already persisted is left in place until it expires.
    pub async fn issue_pair(&self, user_id: Uuid) -> Result<AuthTokens, AuthError> {
        let access = self.issue(user_id, TokenType::Access).await?;
        let refresh = self.issue(user_id, TokenType::Refresh).await.map_err(|e| {
            tracing::warn!(
                "Refresh token issue failed for user {}, access token {} left orphaned: {}",
                user_id,
                access.id,
                e
            );
            e
        })?;

        Ok(AuthTokens {
            access: access.into(),
            refresh: refresh.into(),
        })
    }

    /// Check signature, expiry and type; returns the subject
    pub fn verify(&self, raw: &str, expected: TokenType) -> Result<Uuid, AuthError> {
        Ok(self.signer.verify(raw, expected)?)
    }

    /// Whether this exact token is still stored and unexpired
    pub async fn is_active(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        raw: &str,
    ) -> Result<bool, AuthError> {
        let token = bearer_token(raw);
        let live = self.store.find_by_owner_and_type(user_id, token_type).await?;
        Ok(live.iter().any(|t| t.token == token))
    }

    pub async fn revoke(&self, user_id: Uuid, token_type: TokenType) -> Result<u64, AuthError> {
        let removed = self.store.delete_by_owner_and_type(user_id, token_type).await?;
        tracing::info!("Revoked {} {} tokens of user {}", removed, token_type, user_id);
        Ok(removed)
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let removed = self.store.delete_by_owner(user_id).await?;
        tracing::info!("Revoked {} tokens of user {}", removed, user_id);
        Ok(removed)
    }
}

/// Registration, login and session flows over users, tokens and email
pub struct AuthService {
    users: UserService,
    tokens: TokenService,
    mailer: Arc<dyn EmailApi>,
}

impl AuthService {
    pub fn new(users: UserService, tokens: TokenService, mailer: Arc<dyn EmailApi>) -> Self {
        Self {
            users,
            tokens,
            mailer,
        }
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user
    ///
    /// This method:
    /// 1. Asks the email provider whether the address is deliverable
    /// 2. Rejects emails that are already registered
    /// 3. Generates and emails a verification code
    /// 4. Creates the account
    /// 5. Issues an access/refresh token pair
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(User, AuthTokens), AuthError> {
        // 1. Deliverability
        if !self.mailer.check(email).await? {
            tracing::debug!("Email provider rejected address {}", email);
            return Err(AuthError::InvalidEmail);
        }

        // 2. Uniqueness pre-check, before any mail goes out
        if self.users.email_taken(email).await? {
            tracing::warn!("Attempt to register existing email: {}", email);
            return Err(AuthError::EmailAlreadyExists);
        }

        // 3. Verification code
        let code = generate_code();
        self.mailer
            .send(email, &verification_email(&code), "Verify your email")
            .await?;

        // 4. Account
        let user = self.users.register(email, password, username, &code).await?;

        // 5. Tokens
        let tokens = self.tokens.issue_pair(user.id).await?;

        Ok((user, tokens))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, AuthTokens), AuthError> {
        let user = self.users.get_by_email(email).await?;

        if !PasswordService::verify_password(password, &user.password_hash) {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_pair(user.id).await?;
        tracing::info!("User {} logged in", user.id);
        Ok((user, tokens))
    }

    /// Exchange a stored refresh token for a new access token
    pub async fn refresh(&self, raw_refresh: &str) -> Result<TokenResponse, AuthError> {
        let user_id = self.tokens.verify(raw_refresh, TokenType::Refresh)?;

        if !self
            .tokens
            .is_active(user_id, TokenType::Refresh, raw_refresh)
            .await?
        {
            tracing::debug!("Refresh token of user {} is no longer stored", user_id);
            return Err(AuthError::TokenRevoked);
        }

        let access = self.tokens.issue(user_id, TokenType::Access).await?;
        Ok(access.into())
    }

    /// Resolve an Authorization header to the user it was issued for
    pub async fn authenticate(&self, raw_header: &str) -> Result<User, AuthError> {
        let user_id = self.tokens.verify(raw_header, TokenType::Access)?;

        if !self
            .tokens
            .is_active(user_id, TokenType::Access, raw_header)
            .await?
        {
            return Err(AuthError::TokenRevoked);
        }

        self.users.get_by_id(user_id).await
    }

    pub async fn verify_email(&self, user: &User, code: &str) -> Result<User, AuthError> {
        self.users.verify_email(user, code).await
    }

    /// Revoke every token the user holds
    pub async fn logout(&self, user: &User) -> Result<u64, AuthError> {
        self.tokens.revoke_all(user.id).await
    }

    /// Apply an administrative patch, mailing the code again when the email is marked unverified
    pub async fn update_user(&self, id: Uuid, patch: UpdateUserRequest) -> Result<User, AuthError> {
        let reopened = patch.verified_email == Some(false);
        let user = self.users.update(id, patch).await?;

        if let (true, Some(code)) = (reopened, &user.verification_code) {
            if let Err(e) = self
                .mailer
                .send(&user.email, &verification_email(code), "Verify your email")
                .await
            {
                tracing::warn!("Could not resend verification code to user {}: {}", user.id, e);
            }
        }

        Ok(user)
    }

    /// Delete an account along with its tokens
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AuthError> {
        self.tokens.revoke_all(id).await?;
        self.users.delete(id).await
    }
}
