//! Shared HTTP client for the external AI and collaborator backends
//!
//! Wraps `reqwest` with a base URL, a timeout and a small retry loop with
//! linear backoff. Transport and status failures are reported as the
//! backend's own provider error; undecodable bodies as malformed responses.

use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Which collaborator a client talks to; decides the error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedding,
    Narrative,
    Discussion,
}

impl BackendKind {
    fn failure(&self, message: String) -> Error {
        match self {
            BackendKind::Embedding => Error::Embedding(message),
            BackendKind::Narrative => Error::Narrative(message),
            BackendKind::Discussion => Error::Other(format!("Discussion backend: {}", message)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Embedding => write!(f, "embedding"),
            BackendKind::Narrative => write!(f, "narrative"),
            BackendKind::Discussion => write!(f, "discussion"),
        }
    }
}

pub struct BackendClient {
    client: Client,
    base_url: Url,
    kind: BackendKind,
    retries: usize,
}

impl BackendClient {
    pub fn new(kind: BackendKind, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            kind,
            retries: 2,
        })
    }

    /// Override the number of retries after the first attempt
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid {} backend URL: {}", self.kind, e)))
    }

    async fn send_with_retry(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let req = request
                .try_clone()
                .ok_or_else(|| self.kind.failure("Failed to clone backend request".to_string()))?;
            match req.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => {
                        return ok
                            .text()
                            .await
                            .map_err(|e| self.kind.failure(e.to_string()))
                    }
                    Err(e) => last_err = Some(self.kind.failure(e.to_string())),
                },
                Err(e) => last_err = Some(self.kind.failure(e.to_string())),
            }

            if attempt < self.retries {
                debug!(backend = %self.kind, attempt = attempt + 1, "Retrying backend request");
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| self.kind.failure("Backend request failed".to_string())))
    }

    /// POST `body` as JSON to `path` and decode the JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let text = self.send_with_retry(self.client.post(url).json(body)).await?;
        serde_json::from_str(&text).map_err(|e| {
            Error::MalformedResponse(format!("{} backend returned invalid JSON: {}", self.kind, e))
        })
    }

    /// POST `body` as JSON to `path`, ignoring the reply body
    pub async fn post(&self, path: &str, body: &impl Serialize) -> Result<()> {
        let url = self.endpoint(path)?;
        self.send_with_retry(self.client.post(url).json(body)).await?;
        Ok(())
    }
}
