//! Internal task model.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use crate::constants::INITIAL_VERSION;
use crate::error::ValidationError;
use crate::identity::{comparison_key, encode_task_id, task_name, validate_task_id};

/// Credential the remote queue attaches when dispatching the request.
///
/// Absence of a credential is `Option::None` on [`Task::authorization`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Authorization {
    /// OAuth access token, for calls to Google APIs.
    OAuth {
        /// Service account whose identity signs the token.
        service_account_email: String,
        /// OAuth scope requested for the token.
        scope: String,
    },
    /// OIDC identity token, for calls to services that verify ID tokens.
    Oidc {
        /// Service account whose identity signs the token.
        service_account_email: String,
        /// Audience claim of the token.
        audience: String,
    },
}

impl Authorization {
    /// OAuth token credential.
    pub fn oauth(service_account_email: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::OAuth {
            service_account_email: service_account_email.into(),
            scope: scope.into(),
        }
    }

    /// OIDC token credential.
    pub fn oidc(service_account_email: impl Into<String>, audience: impl Into<String>) -> Self {
        Self::Oidc {
            service_account_email: service_account_email.into(),
            audience: audience.into(),
        }
    }
}

/// The HTTP call the remote queue performs at the scheduled time.
///
/// The body is held as [`Bytes`], so converting a task to the wire format
/// never consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Request headers. Repeated names are folded into one comma-joined value on the wire.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Appends a header value, keeping earlier values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// URL string with a single trailing slash removed.
    ///
    /// `https://example.com` and `https://example.com/` name the same target.
    pub fn normalized_url(&self) -> &str {
        let url = self.url.as_str();
        url.strip_suffix('/').unwrap_or(url)
    }
}

/// A scheduled HTTP dispatch, either desired by the caller or read back from
/// the remote queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Queue the task belongs to (`projects/<p>/locations/<l>/queues/<q>`).
    pub queue_path: String,
    /// Owner prefix marking tasks this scheduler manages.
    pub prefix: String,
    /// Caller-chosen name, unique per schedule time.
    pub id: String,
    /// When the remote queue dispatches the request.
    pub scheduled_at: DateTime<Utc>,
    /// The request to dispatch.
    pub request: HttpRequest,
    /// Credential to attach, if any.
    pub authorization: Option<Authorization>,
    /// Revision number. Zero means unset; creation assigns 1.
    pub version: u64,
}

impl Task {
    /// Creates an unauthenticated task with an unset version.
    pub fn new(
        queue_path: impl Into<String>,
        prefix: impl Into<String>,
        id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        request: HttpRequest,
    ) -> Self {
        Self {
            queue_path: queue_path.into(),
            prefix: prefix.into(),
            id: id.into(),
            scheduled_at,
            request,
            authorization: None,
            version: 0,
        }
    }

    /// Sets the dispatch credential.
    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Sets the revision number.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Identity of this logical task, independent of version.
    pub fn comparison_key(&self) -> String {
        comparison_key(&self.prefix, &self.id, &self.scheduled_at)
    }

    /// The task id: last segment of the remote name.
    pub fn task_id(&self) -> String {
        encode_task_id(&self.prefix, &self.id, &self.scheduled_at, self.version)
    }

    /// Fully-qualified remote name.
    pub fn task_name(&self) -> String {
        task_name(&self.queue_path, &self.task_id())
    }

    /// The version creation will use: 1 when unset.
    pub fn effective_version(&self) -> u64 {
        if self.version == 0 {
            INITIAL_VERSION
        } else {
            self.version
        }
    }

    /// Checks the id and the encoded task id against the remote naming rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let task_id = self.task_id();
        if self.scheduled_at.timestamp_subsec_nanos() >= 1_000_000_000 {
            return Err(ValidationError::LeapSecond { task_id });
        }
        validate_task_id(&task_id)
    }

    /// Whether `remote` already fulfils this desired task.
    ///
    /// Comparison covers the comparison key, authorization, method and URL
    /// (trailing slash insensitive). Body and headers are not compared: the
    /// queue does not return bodies when listing. A desired version higher
    /// than the remote one is how a caller signals a payload change, so it
    /// also counts as a mismatch.
    pub fn is_satisfied_by(&self, remote: &Task) -> bool {
        if self.comparison_key() != remote.comparison_key() {
            return false;
        }

        if self.version > remote.version {
            return false;
        }

        self.authorization == remote.authorization
            && self.request.method == remote.request.method
            && self.request.normalized_url() == remote.request.normalized_url()
    }
}
