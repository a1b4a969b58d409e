//! JSON-over-HTTP repository adapters.
//!
//! ## Endpoints
//!
//! - `POST   /elements`                 create one record
//! - `POST   /elements/batch`           create a subtree
//! - `PUT    /elements/{id}`            overwrite a record
//! - `DELETE /elements/{id}`            remove a record
//! - `POST   /elements/swap`            `{"first": record, "second": record}`
//! - `GET    /projects/{scope}/elements`
//! - `GET    /public/{scope}/elements`
//! - `GET|POST /projects`, `GET|PUT|DELETE /projects/{id}`
//!
//! Reads are retried with exponential backoff; writes are sent once so a
//! timed-out write is never applied twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagekit_core::{ElementRecord, Project};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;
use url::Url;

use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::{ElementRepository, ProjectRepository};

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt number (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64) as u64;
        let jitter = (capped_delay / 4).max(1);
        capped_delay.saturating_add(jitter / 2)
    }
}

/// Shared HTTP client for both repositories.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    base: Url,
    token: Option<String>,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .field("authenticated", &self.inner.token.is_some())
            .field("retry_config", &self.inner.retry_config)
            .finish()
    }
}

impl ApiClient {
    /// Create a client with the default retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidUrl`] if the URL is malformed.
    pub fn new(base_url: impl AsRef<str>, token: Option<String>) -> RepositoryResult<Self> {
        Self::with_retry_config(base_url, token, RetryConfig::default())
    }

    /// Create a client with a custom retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidUrl`] if the URL is malformed or
    /// cannot carry a path, and [`RepositoryError::Http`] if the HTTP client
    /// fails to build.
    pub fn with_retry_config(
        base_url: impl AsRef<str>,
        token: Option<String>,
        retry_config: RetryConfig,
    ) -> RepositoryResult<Self> {
        let base = Url::parse(base_url.as_ref())
            .map_err(|e| RepositoryError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(RepositoryError::InvalidUrl(format!(
                "{base} cannot carry a path"
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("pagekit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                base,
                token: token.filter(|t| !t.is_empty()),
                retry_config,
            }),
        })
    }

    /// Element repository backed by this client.
    #[must_use]
    pub fn elements(&self) -> HttpElementRepository {
        HttpElementRepository {
            client: self.clone(),
        }
    }

    /// Project repository backed by this client.
    #[must_use]
    pub fn projects(&self) -> HttpProjectRepository {
        HttpProjectRepository {
            client: self.clone(),
        }
    }

    fn url(&self, segments: &[&str]) -> RepositoryResult<Url> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| RepositoryError::InvalidUrl(self.inner.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> RepositoryResult<Response> {
        let url = self.url(segments)?;
        let config = &self.inner.retry_config;
        let attempts = if method == Method::GET {
            config.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            let mut request = self.inner.http.request(method.clone(), url.clone());
            if let Some(token) = &self.inner.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let result = match request.send().await {
                Ok(response) => Self::check(response).await,
                Err(e) => Err(RepositoryError::Http(e)),
            };

            match result {
                Err(error) if error.is_retryable() && attempt + 1 < attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        %method,
                        %url,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay,
                        %error,
                        "repository request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn check(response: Response) -> RepositoryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(response.url().path().to_string()));
        }
        let reason = response.text().await.unwrap_or_default();
        Err(RepositoryError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> RepositoryResult<T> {
        let response = self.execute(Method::GET, segments, None).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, method: Method, segments: &[&str], body: Value) -> RepositoryResult<()> {
        self.execute(method, segments, Some(body)).await.map(|_| ())
    }

    async fn send_for<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Value,
    ) -> RepositoryResult<T> {
        let response = self.execute(method, segments, Some(body)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// [`ElementRepository`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpElementRepository {
    client: ApiClient,
}

#[async_trait]
impl ElementRepository for HttpElementRepository {
    async fn create(&self, record: ElementRecord) -> RepositoryResult<()> {
        self.client
            .send(Method::POST, &["elements"], serde_json::to_value(record)?)
            .await
    }

    async fn batch_create(&self, records: Vec<ElementRecord>) -> RepositoryResult<()> {
        self.client
            .send(
                Method::POST,
                &["elements", "batch"],
                serde_json::to_value(records)?,
            )
            .await
    }

    async fn update(&self, record: ElementRecord) -> RepositoryResult<()> {
        let id = record.id.clone();
        self.client
            .send(Method::PUT, &["elements", id.as_str()], serde_json::to_value(record)?)
            .await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.client
            .execute(Method::DELETE, &["elements", id], None)
            .await
            .map(|_| ())
    }

    async fn list_all(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>> {
        self.client.get(&["projects", scope, "elements"]).await
    }

    async fn list_public(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>> {
        self.client.get(&["public", scope, "elements"]).await
    }

    async fn swap_order(
        &self,
        first: ElementRecord,
        second: ElementRecord,
    ) -> RepositoryResult<()> {
        self.client
            .send(
                Method::POST,
                &["elements", "swap"],
                json!({
                    "first": serde_json::to_value(first)?,
                    "second": serde_json::to_value(second)?,
                }),
            )
            .await
    }
}

/// [`ProjectRepository`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProjectRepository {
    client: ApiClient,
}

#[async_trait]
impl ProjectRepository for HttpProjectRepository {
    async fn create(&self, project: Project) -> RepositoryResult<Project> {
        self.client
            .send_for(Method::POST, &["projects"], serde_json::to_value(project)?)
            .await
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Project>> {
        self.client.get(&["projects"]).await
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Project> {
        self.client.get(&["projects", id]).await
    }

    async fn update(&self, project: Project) -> RepositoryResult<Project> {
        let id = project.id.clone();
        self.client
            .send_for(Method::PUT, &["projects", id.as_str()], serde_json::to_value(project)?)
            .await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.client
            .execute(Method::DELETE, &["projects", id], None)
            .await
            .map(|_| ())
    }
}
