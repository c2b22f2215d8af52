//! Authentication service: accounts, password checks and bearer tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{Actor, RegisterUser, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Token lifetime in seconds
    pub fn token_lifetime(&self) -> i64 {
        i64::try_from(self.config.jwt_expiration_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(3600)
    }

    /// Create a regular (non-admin) account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;

        let hash = self.hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.username, &hash, false)
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a JWT token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials.".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid credentials.".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Resolve a bearer token to the actor it was issued for
    pub fn current_user(&self, token: &str) -> AppResult<Actor> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;
        Ok(claims.actor())
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn ensure_admin(&self) -> AppResult<Option<User>> {
        let (Some(username), Some(password)) =
            (&self.config.admin_username, &self.config.admin_password)
        else {
            return Ok(None);
        };

        if let Some(existing) = self.repository.users.get_by_username(username).await? {
            if !existing.is_admin {
                tracing::warn!("Configured admin account {} exists without admin rights", username);
            }
            return Ok(Some(existing));
        }

        let hash = self.hash_password(password)?;
        let admin = self.repository.users.create(username, &hash, true).await?;
        tracing::info!(user_id = admin.id, "admin account created");
        Ok(Some(admin))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            is_admin: user.is_admin,
            exp: now.saturating_add(self.token_lifetime()),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
