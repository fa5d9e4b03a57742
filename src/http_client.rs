//! Cloud Tasks v2 REST transport.
//!
//! Speaks the JSON mapping of the v2 API with a bearer token:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET {base}/v2/{parent}/tasks?pageSize=&pageToken=&responseView=` |
//! | create    | `POST {base}/v2/{parent}/tasks` |
//! | delete    | `DELETE {base}/v2/{name}` |
//!
//! Non-success responses are decoded from the Google error body
//! (`{"error": {"code", "message", "status"}}`) into a [`RemoteError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::client::{CloudTasksClient, RemoteCode, RemoteError, TaskLister};
use crate::types::{CreateTaskRequest, DeleteTaskRequest, ListTasksRequest, ListTasksResponse, WireTask};

/// Production endpoint of the Cloud Tasks API.
pub const DEFAULT_BASE_URL: &str = "https://cloudtasks.googleapis.com/";

/// Supplies the OAuth access token sent with every call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a currently valid access token.
    async fn token(&self) -> Result<String, RemoteError>;
}

/// A fixed access token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps an access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, RemoteError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleStatus,
}

#[derive(Debug, Deserialize)]
struct GoogleStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// [`CloudTasksClient`] over HTTPS.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cloudtask_scheduler::http_client::{HttpCloudTasksClient, StaticToken};
/// use cloudtask_scheduler::{Scheduler, SchedulerConfig};
///
/// let config = SchedulerConfig::from_env().unwrap();
/// let client = HttpCloudTasksClient::new(Arc::new(StaticToken::new("ya29.token"))).unwrap();
/// let scheduler = Scheduler::new(Arc::new(client), &config).unwrap();
/// ```
#[derive(Clone)]
pub struct HttpCloudTasksClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for HttpCloudTasksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCloudTasksClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpCloudTasksClient {
    /// Creates a client for the production endpoint with a 30 second timeout.
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                RemoteError::new(RemoteCode::Internal, "failed to create HTTP client").with_source(e)
            })?;
        Self::with_http_client(http, DEFAULT_BASE_URL, tokens)
    }

    /// Creates a client around an existing [`reqwest::Client`] and endpoint.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            RemoteError::new(RemoteCode::InvalidArgument, format!("invalid base url {base_url:?}"))
                .with_source(e)
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(&format!("v2/{resource}"))
            .map_err(|e| {
                RemoteError::new(RemoteCode::InvalidArgument, format!("invalid resource {resource:?}"))
                    .with_source(e)
            })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(decode_error(status.as_u16(), &body))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
        response.json::<T>().await.map_err(|e| {
            RemoteError::new(RemoteCode::Internal, "failed to parse Cloud Tasks response").with_source(e)
        })
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    let code = if e.is_timeout() {
        RemoteCode::DeadlineExceeded
    } else {
        RemoteCode::Unavailable
    };
    RemoteError::new(code, "Cloud Tasks request failed").with_source(e)
}

fn decode_error(http_status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(GoogleErrorBody { error }) => {
            let code = if error.status.is_empty() {
                RemoteCode::from_http_status(http_status)
            } else {
                RemoteCode::from_status(&error.status)
            };
            RemoteError::new(code, error.message)
        },
        Err(_) => RemoteError::new(
            RemoteCode::from_http_status(http_status),
            format!("HTTP {http_status}: {body}"),
        ),
    }
}

#[async_trait]
impl TaskLister for HttpCloudTasksClient {
    async fn list_tasks(&self, request: ListTasksRequest) -> Result<ListTasksResponse, RemoteError> {
        let mut url = self.endpoint(&format!("{}/tasks", request.parent))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &request.page_size.to_string());
            if !request.page_token.is_empty() {
                query.append_pair("pageToken", &request.page_token);
            }
            query.append_pair("responseView", request.response_view.as_str());
        }

        tracing::debug!(parent = %request.parent, "GET tasks");
        let response = self.send(self.http.get(url)).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl CloudTasksClient for HttpCloudTasksClient {
    async fn create_task(&self, request: CreateTaskRequest) -> Result<WireTask, RemoteError> {
        let url = self.endpoint(&format!("{}/tasks", request.parent))?;

        tracing::debug!(task = %request.task.name, "POST task");
        let response = self.send(self.http.post(url).json(&request)).await?;
        Self::decode(response).await
    }

    async fn delete_task(&self, request: DeleteTaskRequest) -> Result<(), RemoteError> {
        let url = self.endpoint(&request.name)?;

        tracing::debug!(task = %request.name, "DELETE task");
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}
