//! Wire representation of a Cloud Tasks task.
//!
//! Field names and encodings follow the protobuf JSON mapping used by the
//! v2 REST API: camelCase keys, RFC 3339 timestamps and base64 bodies.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A task as stored by the remote queue.
///
/// # Examples
///
/// ```
/// use cloudtask_scheduler::types::{HttpMethod, Timestamp, WireHttpRequest, WireTask};
///
/// let task = WireTask {
///     name: "projects/p/locations/l/queues/q/tasks/pre-a_3b9aca02v1".to_string(),
///     schedule_time: Some(Timestamp { seconds: 1, nanos: 2 }),
///     http_request: Some(WireHttpRequest {
///         url: "https://example.com/".to_string(),
///         http_method: HttpMethod::Get,
///         ..Default::default()
///     }),
///     ..Default::default()
/// };
/// let json = serde_json::to_value(&task).unwrap();
/// assert_eq!(json["scheduleTime"], "1970-01-01T00:00:01.000000002Z");
/// assert_eq!(json["httpRequest"]["httpMethod"], "GET");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    /// `projects/<p>/locations/<l>/queues/<q>/tasks/<task id>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// When the queue dispatches the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<Timestamp>,

    /// HTTP dispatch target. Set for every task this crate manages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<WireHttpRequest>,

    /// App Engine dispatch target. Kept opaque; such tasks are not convertible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_engine_http_request: Option<Value>,
}

/// Which dispatch variant a [`WireTask`] carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageType<'a> {
    /// Plain HTTP dispatch.
    HttpRequest(&'a WireHttpRequest),
    /// App Engine dispatch.
    AppEngineHttpRequest(&'a Value),
}

impl WireTask {
    /// The populated dispatch variant, if any.
    pub fn message_type(&self) -> Option<MessageType<'_>> {
        if let Some(request) = &self.http_request {
            return Some(MessageType::HttpRequest(request));
        }
        self.app_engine_http_request
            .as_ref()
            .map(MessageType::AppEngineHttpRequest)
    }
}

/// HTTP request the queue performs on dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHttpRequest {
    /// Target URL.
    pub url: String,

    /// Request method.
    #[serde(default)]
    pub http_method: HttpMethod,

    /// Headers, one value per name; repeated values are comma-joined.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Request body. Omitted by the queue in BASIC views.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_body"
    )]
    pub body: Option<Bytes>,

    /// OAuth token authorization header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<OAuthToken>,

    /// OIDC token authorization header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_token: Option<OidcToken>,
}

/// OAuth token the queue mints for the dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    /// Service account used to mint the token.
    pub service_account_email: String,
    /// OAuth scope.
    #[serde(default)]
    pub scope: String,
}

/// OIDC token the queue mints for the dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcToken {
    /// Service account used to mint the token.
    pub service_account_email: String,
    /// Audience claim.
    #[serde(default)]
    pub audience: String,
}

/// HTTP methods the queue can dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    /// Not set.
    #[default]
    HttpMethodUnspecified,
    /// POST.
    Post,
    /// GET.
    Get,
    /// HEAD.
    Head,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
    /// PATCH.
    Patch,
    /// OPTIONS.
    Options,
}

impl HttpMethod {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpMethodUnspecified => "HTTP_METHOD_UNSPECIFIED",
            Self::Post => "POST",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds and nanoseconds since the Unix epoch.
///
/// Serialized as an RFC 3339 string in UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    /// Whole seconds.
    pub seconds: i64,
    /// Nanoseconds within the second, `0..1_000_000_000`.
    pub nanos: i32,
}

impl Timestamp {
    /// Splits an instant into seconds and nanoseconds.
    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            // Always below 2e9, so it fits.
            nanos: at.timestamp_subsec_nanos() as i32,
        }
    }

    /// The instant, or `None` when out of range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !(0..1_000_000_000).contains(&self.nanos) {
            return None;
        }
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(&at)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let at = self.to_datetime().ok_or_else(|| {
            serde::ser::Error::custom(format!(
                "timestamp out of range: {}s {}ns",
                self.seconds, self.nanos
            ))
        })?;
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let at = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self::from_datetime(&at.with_timezone(&Utc)))
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        STANDARD
            .decode(encoded.as_bytes())
            .map(|decoded| Some(Bytes::from(decoded)))
            .map_err(serde::de::Error::custom)
    }
}
