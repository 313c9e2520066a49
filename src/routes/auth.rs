/// Authentication Routes
///
/// Thin JSON handlers over `AuthService`. Rejections are bound to the
/// request's `ErrorContext` so the log line and the response share one id.

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, Claims};
use crate::error::{ErrorContext, RequestError};

/// Registration and login request body
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Refresh and logout request body
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Login response
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Refresh response. `refresh_token` is only present when rotation is on.
#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<u64>,
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or weak password
/// - 409: email already registered
pub async fn register(
    req: HttpRequest,
    body: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "user_registration");

    let user = service
        .register(&body.email, &body.password)
        .await
        .map_err(|e| context.reject(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "Registration completed"
    );

    Ok(HttpResponse::Created().json(user))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    req: HttpRequest,
    body: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "user_login");

    let tokens = service
        .login(&body.email, &body.password)
        .await
        .map_err(|e| context.reject(e))?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: service.access_token_ttl(),
    }))
}

/// POST /auth/refresh
pub async fn refresh(
    req: HttpRequest,
    body: web::Json<RefreshTokenRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "token_refresh");

    let tokens = service
        .refresh(&body.refresh_token)
        .await
        .map_err(|e| context.reject(e))?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: service.access_token_ttl(),
    }))
}

/// POST /auth/logout
pub async fn logout(
    req: HttpRequest,
    body: web::Json<RefreshTokenRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "user_logout");

    service
        .logout(&body.refresh_token)
        .await
        .map_err(|e| context.reject(e))?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "logged out",
        revoked: None,
    }))
}

/// POST /auth/logout-all (requires a bearer access token)
pub async fn logout_all(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "user_logout_all");

    let revoked = service
        .logout_all(claims.sub)
        .await
        .map_err(|e| context.reject(e))?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "logged out",
        revoked: Some(revoked),
    }))
}

/// GET /me (requires a bearer access token)
pub async fn me(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::from_extensions(&req.extensions(), "current_user");

    let user = service
        .me(claims.sub)
        .await
        .map_err(|e| context.reject(e))?;

    Ok(HttpResponse::Ok().json(user))
}
