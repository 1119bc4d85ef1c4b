//! Request and response envelopes.
//!
//! Handlers never see HTTP types. Each invocation arrives as a
//! [`RequestEnvelope`] (headers, path parameters, query parameters, raw
//! body) and leaves as a [`ResponseEnvelope`]. The wire names match the
//! API-gateway event shape so envelopes can be fed in as JSON directly.

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// An inbound request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    /// Correlation id, used only for logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RequestEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters.as_ref()?.get(name).map(String::as_str)
    }

    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()?
            .get(name)
            .map(String::as_str)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_path_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.path_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_query_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON document, numbers decimal-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl ResponseEnvelope {
    fn with_status(status_code: u16) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: None,
            error: None,
            debug: None,
        }
    }

    /// 200 with a JSON body.
    pub fn ok(body: String) -> Self {
        Self {
            body: Some(body),
            ..Self::with_status(200)
        }
    }

    /// 200 without a body.
    pub fn ok_empty() -> Self {
        Self::with_status(200)
    }

    /// 204.
    pub fn no_content() -> Self {
        Self::with_status(204)
    }

    /// A request refused before reaching the store.
    pub fn rejected(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(status_code)
        }
    }

    /// A request the store refused, with its structured error body.
    pub fn store_error(status_code: u16, body: String, debug: Option<String>) -> Self {
        Self {
            body: Some(body),
            debug,
            ..Self::with_status(status_code)
        }
    }

    /// The body parsed as JSON, if any.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Error-only envelope body as rendered over HTTP.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<&'a str>,
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = match (&self.body, &self.error) {
            (Some(body), _) => Response::new(Body::from(body.clone())),
            (None, Some(error)) => Json(ErrorBody {
                error,
                debug: self.debug.as_deref(),
            })
            .into_response(),
            (None, None) => Response::new(Body::empty()),
        };
        *response.status_mut() = status;

        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }

        if status == StatusCode::NO_CONTENT {
            response.headers_mut().remove(http::header::CONTENT_TYPE);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_deserializes_gateway_shape() {
        let json = r#"{
            "headers": {"app_user_id": "u1", "App_User_Name": "U One"},
            "pathParameters": {"timestamp": "123"},
            "queryStringParameters": null,
            "body": "{\"Item\":{}}"
        }"#;
        let envelope: RequestEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.header("app_user_id"), Some("u1"));
        assert_eq!(envelope.header("app_user_name"), Some("U One"));
        assert_eq!(envelope.path_parameter("timestamp"), Some("123"));
        assert_eq!(envelope.query_parameter("limit"), None);
        assert_eq!(envelope.body.as_deref(), Some("{\"Item\":{}}"));
    }

    #[test]
    fn test_request_envelope_missing_maps() {
        let envelope: RequestEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(envelope.header("app_user_id"), None);
        assert_eq!(envelope.path_parameter("note_id"), None);
        assert_eq!(envelope.body, None);
    }

    #[test]
    fn test_response_envelope_serializes_camel_case() {
        let response = ResponseEnvelope::rejected(400, "nope");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["error"], "nope");
        assert_eq!(json["headers"]["Content-Type"], "application/json");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_into_response_error_only() {
        let response = ResponseEnvelope::rejected(404, "No 'note_id' in 'pathParameters'")
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_into_response_no_content_has_no_content_type() {
        let response = ResponseEnvelope::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get("content-type").is_none());
    }
}
