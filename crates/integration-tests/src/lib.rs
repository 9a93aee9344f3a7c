//! Black-box tests for the Milo API.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the server against a scratch database
//! milo-cli migrate
//! cargo run -p milo-api
//!
//! # Run the ignored tests against it
//! cargo test -p milo-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `MILO_BASE_URL` - API base URL (default `http://localhost:8080`)
//! - `MILO_TEST_EMAIL` / `MILO_TEST_PASSWORD` - seeded account used to log in
//!   (default `admin@milo.com` / `123456`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};

/// Tokens and account returned by `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub account: Value,
}

/// Shared client and target for one test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// Build a context from the environment.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MILO_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned());
        let client = Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Credentials of the seeded account.
    #[must_use]
    pub fn credentials() -> (String, String) {
        (
            std::env::var("MILO_TEST_EMAIL").unwrap_or_else(|_| "admin@milo.com".to_owned()),
            std::env::var("MILO_TEST_PASSWORD").unwrap_or_else(|_| "123456".to_owned()),
        )
    }

    /// POST a login request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the server is unreachable.
    pub async fn login_raw(&self, email: &str, password: &str) -> reqwest::Result<Response> {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
    }

    /// Log in as the seeded account.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn login(&self) -> reqwest::Result<Session> {
        let (email, password) = Self::credentials();
        self.login_raw(&email, &password)
            .await?
            .error_for_status()?
            .json()
            .await
    }
}
