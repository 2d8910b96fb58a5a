#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use fwt_api::config::AppConfig;
use fwt_api::server::{router, serve, AppState};
use fwt_api::services::MemoryStore;

pub const PASSWORD: &str = "secret123";

/// A real router on a free local port, backed by a fresh in-memory store.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub config: AppConfig,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let mut config = AppConfig::development();
        // bcrypt's minimum cost keeps the suite fast
        config.security.bcrypt_cost = 4;
        config.security.cors_origins.clear();

        let state = AppState::in_memory(MemoryStore::new(), &config)?;
        let app = router(state, &config);

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let grace = config.server.shutdown_grace();
        tokio::spawn(async move {
            let _ = serve(listener, app, std::future::pending(), grace).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            config,
        };
        server.wait_ready().await?;
        Ok(server)
    }

    async fn wait_ready(&self) -> Result<()> {
        for _ in 0..50 {
            if let Ok(resp) = self.client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {}", self.base_url)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, token: &str, path: &str, body: Value) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn patch(&self, token: &str, path: &str, body: Value) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn delete(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn register(&self, username: &str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/users/register"))
            .json(&json!({ "user": {
                "username": username,
                "email": format!("{}@email.com", username),
                "password": PASSWORD,
            }}))
            .send()
            .await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/users/login"))
            .json(&json!({ "user": { "username": username, "password": password } }))
            .send()
            .await?)
    }

    /// Register `username` and return a bearer token for it.
    pub async fn session(&self, username: &str) -> Result<String> {
        let resp = self.register(username).await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "register {}: {}", username, resp.status());

        let resp = self.login(username, PASSWORD).await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "login {}: {}", username, resp.status());
        let body: Value = resp.json().await?;
        body["access_token"].as_str().map(str::to_string).context("login response without access_token")
    }

    pub async fn exercise(&self, token: &str, name: &str) -> Result<Value> {
        let resp = self
            .post(token, "/exercises", json!({ "exercise": { "name": name, "description": format!("{} description", name) } }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "create exercise {}: {}", name, resp.status());
        let body: Value = resp.json().await?;
        Ok(body["exercise"].clone())
    }

    /// Create a workout scheduled one hour ahead.
    pub async fn workout(&self, token: &str, name: &str, exercises: &[&str]) -> Result<Value> {
        let resp = self
            .post(token, "/workouts", json!({ "workout": {
                "name": name,
                "scheduled_date": in_one_hour(),
                "exercises": exercises,
            }}))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "create workout {}: {}", name, resp.status());
        let body: Value = resp.json().await?;
        Ok(body["workout"].clone())
    }
}

pub fn in_one_hour() -> String {
    (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
}

/// Status code and JSON body, consuming the response.
pub async fn read(resp: Response) -> Result<(StatusCode, Value)> {
    let status = resp.status();
    let body = resp.json::<Value>().await?;
    Ok((status, body))
}
