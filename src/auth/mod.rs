//! Authentication probe.
//!
//! Authentication is delegated to an external HTTP endpoint: the service
//! forwards the client's bearer credential and receives an identity record
//! or a rejection. Probe failures are local to the attempt and never affect
//! the connection.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Authenticated user record returned by the probe.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub status: i32,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth probe unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("auth probe rejected credential: {0}")]
    Rejected(StatusCode),

    #[error("auth probe returned malformed identity: {0}")]
    Malformed(#[source] reqwest::Error),
}

/// External capability: given a bearer credential, return an identity or fail.
#[async_trait]
pub trait AuthProbe: Send + Sync {
    async fn check(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Probe backed by an HTTP endpoint.
pub struct HttpAuthProbe {
    client: reqwest::Client,
    check_url: String,
}

impl HttpAuthProbe {
    pub fn new(check_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            check_url: check_url.into(),
        }
    }
}

#[async_trait]
impl AuthProbe for HttpAuthProbe {
    async fn check(&self, credential: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .get(&self.check_url)
            .bearer_auth(credential)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status()));
        }

        response.json::<Identity>().await.map_err(AuthError::Malformed)
    }
}
