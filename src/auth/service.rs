/// Authentication flows
///
/// Composes the issuer, validator and the two stores into register, login,
/// refresh and logout. This is the only place where internal outcomes are
/// mapped onto the public `AuthError` kinds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::issuer::{token_digest, TokenIssuer};
use crate::auth::password::{PasswordError, PasswordHasher};
use crate::auth::refresh_token::{RefreshTokenRecord, RevocationStore};
use crate::auth::validator::TokenValidator;
use crate::configuration::{AuthSettings, JwtSettings};
use crate::error::{AuthError, StoreError};
use crate::users::{User, UserStore, UserSummary};
use crate::validators::{is_valid_email, is_valid_password, normalize_email};

/// Compared against when an email is unknown so both login failure paths
/// spend the same hashing work.
const DUMMY_PASSWORD: &str = "Dummy-Password-0";

/// Tokens handed out by a successful login
#[derive(Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful refresh. `refresh_token` is only set when
/// rotation is enabled.
#[derive(Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoginTokens { .. }")
    }
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

/// A refresh token that passed signature/type validation
struct PresentedRefresh {
    user_id: Uuid,
    token_id: String,
    token_hash: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn RevocationStore>,
    hasher: Arc<dyn PasswordHasher>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    store_timeout: Duration,
    rotate_refresh_tokens: bool,
    dummy_hash: Arc<String>,
}

impl AuthService {
    /// Build the service from its collaborators and immutable settings
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the hasher cannot produce a hash
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn RevocationStore>,
        hasher: Arc<dyn PasswordHasher>,
        jwt: &JwtSettings,
        settings: &AuthSettings,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD).map_err(AuthError::internal)?;

        Ok(Self {
            users,
            sessions,
            hasher,
            issuer: TokenIssuer::new(jwt),
            validator: TokenValidator::new(jwt),
            store_timeout: Duration::from_millis(settings.store_timeout_ms),
            rotate_refresh_tokens: settings.rotate_refresh_tokens,
            dummy_hash: Arc::new(dummy_hash),
        })
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl(&self) -> i64 {
        self.issuer.access_token_ttl()
    }

    /// Register a new account
    ///
    /// # Errors
    /// - `Validation` for a malformed email or a weak password
    /// - `EmailExists` if the email is taken
    /// - `Internal` for store or hashing failures
    pub async fn register(&self, email: &str, password: &str) -> Result<UserSummary, AuthError> {
        let email = is_valid_email(email)?;
        is_valid_password(password)?;

        if self.deadline(self.users.find_by_email(&email)).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.hash_password(password).await?;
        let user = User::new(email, password_hash);

        match self.deadline(self.users.create(&user)).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration
            Err(StoreError::UniqueViolation(_)) => return Err(AuthError::EmailExists),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.summary())
    }

    /// Authenticate with email and password and open a new session
    ///
    /// # Errors
    /// - `InvalidCredentials` if the account is unknown or the password is wrong
    /// - `Internal` for store or signing failures; no token is returned then
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let email = normalize_email(email);
        let user = self.deadline(self.users.find_by_email(&email)).await?;

        let user = match user {
            Some(user) => user,
            None => {
                let _ = self.verify_password(&self.dummy_hash, password).await;
                tracing::warn!("Login failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.verify_password(&user.password_hash, password).await? {
            tracing::warn!(user_id = %user.id, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let (access_token, refresh_token) = self.open_session(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginTokens {
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a valid refresh token
    ///
    /// # Errors
    /// - `InvalidRefreshToken` if the token is invalid, expired, revoked or unknown
    /// - `Internal` for store or signing failures
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
        let presented = self.present(raw_refresh_token)?;

        let record = match self.find_session(&presented).await? {
            Some(record) => record,
            None => {
                if self.rotate_refresh_tokens {
                    self.detect_reuse(&presented).await;
                }
                tracing::warn!(
                    user_id = %presented.user_id,
                    jti = %presented.token_id,
                    "Refresh rejected"
                );
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        if !self.rotate_refresh_tokens {
            let access_token = self.issue_access(record.user_id)?;
            tracing::info!(user_id = %record.user_id, jti = %record.token_id, "Access token refreshed");
            return Ok(RefreshedTokens {
                access_token,
                refresh_token: None,
            });
        }

        // Revoke first: a failure after this point costs the client its
        // session but never leaves two live tokens behind.
        self.deadline(self.sessions.revoke(record.id)).await?;
        let (access_token, refresh_token) = self.open_session(record.user_id).await?;

        tracing::info!(user_id = %record.user_id, jti = %record.token_id, "Refresh token rotated");
        Ok(RefreshedTokens {
            access_token,
            refresh_token: Some(refresh_token),
        })
    }

    /// Revoke the session a refresh token belongs to
    ///
    /// # Errors
    /// - `InvalidRefreshToken` if the token is invalid, expired, already revoked or unknown
    /// - `Internal` for store failures
    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AuthError> {
        let presented = self.present(raw_refresh_token)?;

        let record = self.find_session(&presented).await?.ok_or_else(|| {
            tracing::warn!(
                user_id = %presented.user_id,
                jti = %presented.token_id,
                "Logout rejected"
            );
            AuthError::InvalidRefreshToken
        })?;

        self.deadline(self.sessions.revoke(record.id)).await?;

        tracing::info!(user_id = %record.user_id, jti = %record.token_id, "Session revoked");
        Ok(())
    }

    /// Revoke every active session of a user, returning how many were revoked
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self
            .deadline(self.sessions.revoke_all_for_user(user_id))
            .await?;

        tracing::info!(user_id = %user_id, revoked = revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Account summary for an already-authenticated user id
    pub async fn me(&self, user_id: Uuid) -> Result<UserSummary, AuthError> {
        self.deadline(self.users.find_by_id(user_id))
            .await?
            .map(|user| user.summary())
            .ok_or(AuthError::NotFound)
    }

    /// Validate a bearer access token
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        self.validator
            .parse_access(access_token)
            .map_err(|_| AuthError::InvalidAccessToken)
    }

    fn issue_access(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issuer
            .issue_access_token(user_id)
            .map_err(AuthError::internal)
    }

    /// Issue an access/refresh pair and persist the refresh record. The raw
    /// refresh token is only returned once its record is stored.
    async fn open_session(&self, user_id: Uuid) -> Result<(String, String), AuthError> {
        let access_token = self.issue_access(user_id)?;
        let issued = self
            .issuer
            .issue_refresh_token(user_id)
            .map_err(AuthError::internal)?;

        let record = RefreshTokenRecord::for_issued(user_id, &issued);
        if let Err(e) = self.deadline(self.sessions.save(&record)).await {
            tracing::error!(user_id = %user_id, jti = %record.token_id, error = %e, "Failed to persist refresh token");
            return Err(e.into());
        }

        Ok((access_token, issued.token))
    }

    fn present(&self, raw_refresh_token: &str) -> Result<PresentedRefresh, AuthError> {
        let claims = self
            .validator
            .parse_refresh(raw_refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        let token_id = claims.jti.ok_or(AuthError::InvalidRefreshToken)?;

        Ok(PresentedRefresh {
            user_id: claims.sub,
            token_id,
            token_hash: token_digest(raw_refresh_token),
        })
    }

    async fn find_session(
        &self,
        presented: &PresentedRefresh,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let record = self
            .deadline(self.sessions.find_valid(
                presented.user_id,
                &presented.token_id,
                &presented.token_hash,
            ))
            .await?;
        Ok(record)
    }

    /// A correctly signed token whose record is already revoked means the
    /// token was used after rotation. Treat the whole account as compromised.
    async fn detect_reuse(&self, presented: &PresentedRefresh) {
        let record = match self
            .deadline(self.sessions.find_by_token_id(&presented.token_id))
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Reuse check failed");
                return;
            }
        };

        let reused = record.is_revoked()
            && record.user_id == presented.user_id
            && record.token_hash == presented.token_hash;
        if !reused {
            return;
        }

        tracing::warn!(
            user_id = %record.user_id,
            jti = %record.token_id,
            "Revoked refresh token presented again, revoking all sessions"
        );
        if let Err(e) = self
            .deadline(self.sessions.revoke_all_for_user(record.user_id))
            .await
        {
            tracing::error!(user_id = %record.user_id, error = %e, "Failed to revoke sessions after reuse");
        }
    }

    async fn deadline<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(AuthError::internal)?
            .map_err(AuthError::internal)
    }

    async fn verify_password(&self, hash: &str, password: &str) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let hash = hash.to_string();
        let password = password.to_string();

        let outcome = tokio::task::spawn_blocking(move || hasher.compare(&hash, &password))
            .await
            .map_err(AuthError::internal)?;

        match outcome {
            Ok(()) => Ok(true),
            Err(PasswordError::Mismatch) => Ok(false),
            Err(e) => Err(AuthError::internal(e)),
        }
    }
}
