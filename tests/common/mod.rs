#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use serde_json::{json, Value};
use session_auth::auth::{AuthService, BcryptHasher};
use session_auth::configuration::{AuthSettings, JwtSettings, MIN_HASH_COST};
use session_auth::startup::run;
use session_auth::store::{InMemoryRevocationStore, InMemoryUserStore};

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "Secret123";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub jwt: JwtSettings,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        issuer: "session-auth-test".to_string(),
        access_secret: "integration-access-secret-0123456789".to_string(),
        refresh_secret: "integration-refresh-secret-0123456789".to_string(),
        access_token_minutes: 15,
        refresh_token_days: 7,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(false).await
}

/// Start the server on a random port backed by in-memory stores
pub async fn spawn_app_with(rotate_refresh_tokens: bool) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = jwt_settings();
    let settings = AuthSettings {
        password_hash_cost: MIN_HASH_COST,
        store_timeout_ms: 1_000,
        rotate_refresh_tokens,
    };
    let service = AuthService::new(
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryRevocationStore::new()),
        Arc::new(BcryptHasher::new(settings.password_hash_cost)),
        &jwt,
        &settings,
    )
    .expect("Failed to build auth service");

    let server = run(listener, service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        jwt,
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/register", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn logout(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/logout", &json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn get_me(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/me", &self.address));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Register the default account and log in, returning the login body
    pub async fn login_default_user(&self) -> Value {
        assert_eq!(201, self.register(EMAIL, PASSWORD).await.status().as_u16());
        let response = self.login(EMAIL, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}
