//! Shared helpers for integration tests.
//!
//! Every test spawns its own server on an ephemeral port with an in-memory
//! user directory, so tests never share state.

#![allow(dead_code)]

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use keygate::{create_router, AppState, Config};

/// Matches `Config::default_for_testing`.
pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "password";

pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub state: AppState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default_for_testing()).await
    }

    /// Spawns a server using a customized test configuration.
    pub async fn spawn_with(config: Config) -> Self {
        let state = AppState::new(&config).expect("Failed to build app state");
        let app = create_router(state.clone(), &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn unique_username() -> String {
        format!("user_{}", Uuid::new_v4().simple())
    }

    /// Logs in and returns the raw response.
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_public(
            "/api/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Logs in as the seeded test user and returns the token.
    pub async fn login_token(&self) -> String {
        let body: LoginResponse = self
            .login(TEST_USERNAME, TEST_PASSWORD)
            .await
            .json()
            .await
            .expect("Failed to parse login response");
        assert!(body.success);
        body.token
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_public(
            "/api/register",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Makes an authenticated GET request.
    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an authenticated POST request without a body.
    pub async fn post_empty(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    /// Makes a GET request with a raw `Authorization` header value.
    pub async fn get_with_authorization(&self, path: &str, value: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(reqwest::header::AUTHORIZATION, value)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post_public(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }
}

/// Reads a response body as JSON.
pub async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response body")
}
