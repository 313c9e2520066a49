use std::net::TcpListener;
use std::sync::Arc;

use session_auth::auth::{AuthService, BcryptHasher};
use session_auth::configuration::get_configuration;
use session_auth::startup::run;
use session_auth::store::{PgRevocationStore, PgUserStore};
use session_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
        })?;

    tracing::info!("Database ready");

    let service = AuthService::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgRevocationStore::new(pool)),
        Arc::new(BcryptHasher::new(configuration.auth.password_hash_cost)),
        &configuration.jwt,
        &configuration.auth,
    )
    .map_err(|e| {
        tracing::error!("Failed to build auth service: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Service initialization error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, service)?;
    server.await
}
