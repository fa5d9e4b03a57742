//! Mapping between [`Task`] and the wire model.
//!
//! Conversion is lossy in one place: repeated header values are folded into
//! one comma-joined value on the way out and come back as that single value.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use crate::domain::{Authorization, HttpRequest, Task};
use crate::error::{ConversionError, Result};
use crate::identity::decode;
use crate::types::{HttpMethod, MessageType, OAuthToken, OidcToken, Timestamp, WireHttpRequest, WireTask};

/// Converts a task into its wire form, named with the task's current version.
///
/// # Errors
///
/// - [`ConversionError::UnsupportedMethod`] for methods the queue cannot dispatch.
/// - [`ConversionError::InvalidHeader`] for header values that are not visible ASCII.
pub fn task_to_wire(task: &Task) -> Result<WireTask, ConversionError> {
    let request = &task.request;

    let http_request = WireHttpRequest {
        url: request.url.to_string(),
        http_method: method_to_wire(&request.method)?,
        headers: fold_headers(&request.headers)?,
        body: request.body.clone(),
        oauth_token: match &task.authorization {
            Some(Authorization::OAuth {
                service_account_email,
                scope,
            }) => Some(OAuthToken {
                service_account_email: service_account_email.clone(),
                scope: scope.clone(),
            }),
            _ => None,
        },
        oidc_token: match &task.authorization {
            Some(Authorization::Oidc {
                service_account_email,
                audience,
            }) => Some(OidcToken {
                service_account_email: service_account_email.clone(),
                audience: audience.clone(),
            }),
            _ => None,
        },
    };

    Ok(WireTask {
        name: task.task_name(),
        schedule_time: Some(Timestamp::from_datetime(&task.scheduled_at)),
        http_request: Some(http_request),
        app_engine_http_request: None,
    })
}

/// Converts a listed wire task back into a [`Task`] owned by `prefix`.
///
/// The id and version come from the task name; the schedule time comes from
/// the wire task itself.
///
/// # Errors
///
/// - [`SchedulerError::Identity`](crate::SchedulerError::Identity) when the name cannot be decoded.
/// - [`SchedulerError::Conversion`](crate::SchedulerError::Conversion) for unsupported
///   message types, methods or authorization headers, and for a missing or
///   invalid schedule time, URL or header.
pub fn wire_to_task(queue_path: &str, prefix: &str, wire: &WireTask) -> Result<Task> {
    let identity = decode(prefix, &wire.name)?;

    let http = match wire.message_type() {
        Some(MessageType::HttpRequest(http)) => http,
        Some(MessageType::AppEngineHttpRequest(_)) => {
            return Err(ConversionError::UnsupportedMessageType("appEngineHttpRequest").into());
        },
        None => return Err(ConversionError::UnsupportedMessageType("none").into()),
    };

    let timestamp = wire
        .schedule_time
        .ok_or(ConversionError::MissingScheduleTime)?;
    let scheduled_at = timestamp
        .to_datetime()
        .ok_or(ConversionError::InvalidScheduleTime {
            seconds: timestamp.seconds,
            nanos: timestamp.nanos,
        })?;

    let url = Url::parse(&http.url).map_err(|e| ConversionError::InvalidUrl {
        url: http.url.clone(),
        reason: e.to_string(),
    })?;

    let request = HttpRequest {
        method: method_from_wire(http.http_method)?,
        url,
        headers: unfold_headers(http)?,
        body: http.body.clone(),
    };

    let authorization = match (&http.oauth_token, &http.oidc_token) {
        (Some(_), Some(_)) => {
            return Err(ConversionError::UnsupportedAuthorizationType("oauthToken and oidcToken").into());
        },
        (Some(oauth), None) => Some(Authorization::oauth(
            oauth.service_account_email.clone(),
            oauth.scope.clone(),
        )),
        (None, Some(oidc)) => Some(Authorization::oidc(
            oidc.service_account_email.clone(),
            oidc.audience.clone(),
        )),
        (None, None) => None,
    };

    Ok(Task {
        queue_path: queue_path.to_string(),
        prefix: prefix.to_string(),
        id: identity.id,
        scheduled_at,
        request,
        authorization,
        version: identity.version,
    })
}

fn method_to_wire(method: &Method) -> Result<HttpMethod, ConversionError> {
    let wire = match *method {
        Method::POST => HttpMethod::Post,
        Method::GET => HttpMethod::Get,
        Method::HEAD => HttpMethod::Head,
        Method::PUT => HttpMethod::Put,
        Method::DELETE => HttpMethod::Delete,
        Method::PATCH => HttpMethod::Patch,
        Method::OPTIONS => HttpMethod::Options,
        _ => return Err(ConversionError::UnsupportedMethod(method.to_string())),
    };
    Ok(wire)
}

fn method_from_wire(method: HttpMethod) -> Result<Method, ConversionError> {
    let method = match method {
        HttpMethod::Post => Method::POST,
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::HttpMethodUnspecified => {
            return Err(ConversionError::UnsupportedMethod(method.to_string()));
        },
    };
    Ok(method)
}

fn fold_headers(
    headers: &HeaderMap,
) -> Result<std::collections::BTreeMap<String, String>, ConversionError> {
    let mut folded = std::collections::BTreeMap::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|value| {
                value.to_str().map_err(|e| ConversionError::InvalidHeader {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        folded.insert(name.to_string(), values.join(","));
    }
    Ok(folded)
}

fn unfold_headers(http: &WireHttpRequest) -> Result<HeaderMap, ConversionError> {
    let mut headers = HeaderMap::with_capacity(http.headers.len());
    for (name, value) in &http.headers {
        let invalid = |reason: String| ConversionError::InvalidHeader {
            name: name.clone(),
            reason,
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}
