/// Error Handling Module
///
/// A closed set of error kinds for every layer of the service:
/// 1. Request validation errors (caller-facing, specific)
/// 2. Storage errors raised by the user and revocation stores
/// 3. Token errors raised by the issuer and validator (deliberately opaque)
/// 4. The public authentication taxonomy returned by `AuthService`
/// 5. HTTP response mapping with structured error logging

use actix_web::dev::Extensions;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::logger::RequestId;

/// ============================================================================
/// 1. VALIDATION ERRORS
/// ============================================================================

/// Validation errors for request fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(&'static str, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(&'static str),
    #[error("password must contain at least one digit, one lowercase letter, and one uppercase letter")]
    WeakPassword,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// ============================================================================
/// 2. STORAGE ERRORS
/// ============================================================================

/// Errors surfaced by `UserStore` and `RevocationStore` implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("record not found")]
    NotFound,
    #[error("store call exceeded its deadline")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

/// Postgres SQLSTATE for unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                StoreError::UniqueViolation(constraint)
            }
            other => StoreError::Database(other),
        }
    }
}

/// ============================================================================
/// 3. TOKEN ERRORS
/// ============================================================================

/// Errors from the token issuer and validator.
///
/// `Invalid` is the only failure the validator ever reports; which check
/// failed is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// ============================================================================
/// 4. PUBLIC AUTHENTICATION TAXONOMY
/// ============================================================================

/// Outcome kinds returned by every `AuthService` operation
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("email already exists")]
    EmailExists,
    #[error("user not found")]
    NotFound,
    /// Detail is for server-side logs only
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// ============================================================================
/// 5. HTTP RESPONSE MAPPING
/// ============================================================================

/// Transport-level error type returned by route handlers and middleware
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("missing authentication token")]
    MissingToken,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Auth(AuthError::Validation(err))
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid authorization header".to_string(),
            ),
            AppError::Auth(e) => match e {
                AuthError::Validation(v) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", v.to_string())
                }
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    e.to_string(),
                ),
                AuthError::InvalidRefreshToken => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_REFRESH_TOKEN",
                    e.to_string(),
                ),
                AuthError::InvalidAccessToken => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::EmailExists => (StatusCode::CONFLICT, "EMAIL_EXISTS", e.to_string()),
                AuthError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                AuthError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.parts();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Auth(AuthError::Internal(detail)) => {
                tracing::error!(request_id = request_id, error = %detail, "Internal error");
            }
            AppError::Auth(AuthError::Validation(e)) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::EmailExists) => {
                tracing::warn!(request_id = request_id, "Duplicate registration attempt");
            }
            _ => {
                tracing::warn!(request_id = request_id, error = %self, "Authentication error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.parts().0
    }
}

/// Error context carried through a single request for log correlation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
        }
    }

    /// Reuse the `RequestId` assigned by `LoggerMiddleware`, if any
    pub fn from_extensions(extensions: &Extensions, operation: impl Into<String>) -> Self {
        match extensions.get::<RequestId>() {
            Some(RequestId(id)) => Self {
                request_id: id.clone(),
                operation: operation.into(),
            },
            None => Self::new(operation),
        }
    }

    /// Attach this context to an error so it is logged and reported once,
    /// under this request id
    pub fn reject(&self, error: impl Into<AppError>) -> RequestError {
        RequestError {
            context: self.clone(),
            error: error.into(),
        }
    }
}

/// An `AppError` bound to the request it was raised in
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RequestError {
    pub context: ErrorContext,
    pub error: AppError,
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        let request_id = &self.context.request_id;
        tracing::info_span!("request", operation = %self.context.operation)
            .in_scope(|| self.error.log_error(request_id));

        let (status, body) = <AppError as ErrorHandler>::error_response(&self.error, request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.error.parts().0
    }
}
