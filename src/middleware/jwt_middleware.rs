/// Bearer Authentication Middleware
///
/// Validates the access token from the Authorization header and injects
/// its claims into request extensions for the wrapped handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError, ErrorContext};

const BEARER_PREFIX: &str = "Bearer ";

/// Guards a resource behind a valid access token.
/// Refresh tokens are rejected here even though they are validly signed.
pub struct JwtMiddleware {
    service: AuthService,
}

impl JwtMiddleware {
    pub fn new(service: AuthService) -> Self {
        Self { service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            inner: Rc::new(service),
            auth: self.service.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    inner: Rc<S>,
    auth: AuthService,
}

/// Token portion of a `Bearer <token>` header, if present and non-empty
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let context = ErrorContext::from_extensions(&req.extensions(), "authenticate");

        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(
                    request_id = %context.request_id,
                    path = %req.path(),
                    "Missing or invalid Authorization header"
                );
                let error: Error = context.reject(AppError::MissingToken).into();
                return Box::pin(async move { Err::<ServiceResponse<B>, _>(error) });
            }
        };

        match self.auth.authenticate(&token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token accepted");
                req.extensions_mut().insert(claims);

                let inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %context.request_id,
                    path = %req.path(),
                    "Access token rejected"
                );
                let error: Error = context.reject(AuthError::InvalidAccessToken).into();
                Box::pin(async move { Err::<ServiceResponse<B>, _>(error) })
            }
        }
    }
}
