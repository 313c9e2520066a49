use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, web, App, HttpMessage, HttpRequest, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::error::{ErrorContext, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{health_check, login, logout, logout_all, me, refresh, register};

/// Malformed or mistyped JSON bodies become validation errors
fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    ErrorContext::from_extensions(&req.extensions(), "json_payload")
        .reject(ValidationError::MalformedRequest(err.to_string()))
        .into()
}

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let jwt_middleware_service = service.clone();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(service.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Routes behind a bearer access token
            .service(
                web::resource("/me")
                    .wrap(JwtMiddleware::new(jwt_middleware_service.clone()))
                    .route(web::get().to(me)),
            )
            .service(
                web::resource("/auth/logout-all")
                    .wrap(JwtMiddleware::new(jwt_middleware_service.clone()))
                    .route(web::post().to(logout_all)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
