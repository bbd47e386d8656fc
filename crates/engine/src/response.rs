use error::GraphqlError;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::ser::SerializeMap;

use crate::cache_control::CachePolicy;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub data: Option<serde_json::Value>,
    pub errors: Vec<GraphqlError>,
    pub extensions: serde_json::Map<String, serde_json::Value>,
    pub http: ResponseHttp,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseHttp {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Response {
    pub fn data(data: serde_json::Value) -> Self {
        Response {
            data: Some(data),
            ..Default::default()
        }
    }

    /// A request error, nothing was executed.
    pub fn request_errors(errors: Vec<GraphqlError>) -> Self {
        let status = errors
            .iter()
            .map(|error| error.code.into_http_status_code_with_priority())
            .max_by_key(|(_, priority)| *priority)
            .map(|(status, _)| status)
            .unwrap_or(StatusCode::BAD_REQUEST);

        Response {
            data: None,
            errors,
            extensions: Default::default(),
            http: ResponseHttp {
                status,
                headers: HeaderMap::new(),
            },
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.http
            .headers
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
    }

    pub(crate) fn set_cache_control(&mut self, policy: &CachePolicy) {
        let Some(cacheable) = policy.policy_if_cacheable() else {
            return;
        };

        match HeaderValue::from_str(&cacheable.to_string()) {
            Ok(value) => {
                self.http.headers.insert(header::CACHE_CONTROL, value);
            }
            Err(err) => tracing::warn!("could not render the Cache-Control header: {err}"),
        }
    }
}

impl serde::Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;

        // A request error has no data entry at all, an execution error has `data: null`.
        if self.data.is_some() || self.errors.is_empty() {
            map.serialize_entry("data", &self.data)?;
        }

        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }

        if !self.extensions.is_empty() {
            map.serialize_entry("extensions", &self.extensions)?;
        }

        map.end()
    }
}

#[cfg(test)]
mod tests {
    use error::ErrorCode;

    use super::*;
    use crate::cache_control::{CacheHint, CacheScope};

    #[test]
    fn request_error_status() {
        let response = Response::request_errors(vec![
            GraphqlError::new("bad", ErrorCode::BadRequest),
            GraphqlError::internal_server_error(),
        ]);

        assert_eq!(response.http.status, StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(response, @r###"
        {
          "errors": [
            {
              "message": "bad",
              "extensions": {
                "code": "BAD_REQUEST"
              }
            },
            {
              "message": "Internal server error",
              "extensions": {
                "code": "INTERNAL_SERVER_ERROR"
              }
            }
          ]
        }
        "###);
    }

    #[test]
    fn cache_control_header() {
        let mut response = Response::data(serde_json::json!({ "me": null }));

        response.set_cache_control(&CachePolicy::from(CacheHint::max_age(0)));
        assert_eq!(response.cache_control(), None);

        response.set_cache_control(&CachePolicy::from(CacheHint::max_age(30).with_scope(CacheScope::Private)));
        assert_eq!(response.cache_control(), Some("max-age=30, private"));
    }
}
