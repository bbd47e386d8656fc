use serde::Deserialize;

/// A GraphQL request as received by the transport layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extensions: RequestExtensions,
    /// Not part of the body, filled in by the transport.
    #[serde(skip)]
    pub http: HttpRequestParts,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExtensions {
    #[serde(default)]
    pub persisted_query: Option<PersistedQueryRequestExtension>,
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueryRequestExtension {
    pub version: u32,
    pub sha256_hash: String,
}

#[derive(Debug, Clone)]
pub struct HttpRequestParts {
    pub method: http::Method,
    pub headers: http::HeaderMap,
}

impl Default for HttpRequestParts {
    fn default() -> Self {
        HttpRequestParts {
            method: http::Method::POST,
            headers: http::HeaderMap::new(),
        }
    }
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Request {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    /// A request sending only the hash of a previously registered query.
    pub fn persisted(sha256_hash: impl Into<String>) -> Self {
        Request::default().with_persisted_query(sha256_hash)
    }

    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_persisted_query(mut self, sha256_hash: impl Into<String>) -> Self {
        self.extensions.persisted_query = Some(PersistedQueryRequestExtension {
            version: 1,
            sha256_hash: sha256_hash.into(),
        });
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.http.headers.insert(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.http.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
