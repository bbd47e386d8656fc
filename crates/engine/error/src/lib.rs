mod code;
mod path;

pub use code::*;
pub use path::*;
use serde::ser::SerializeMap;
use std::borrow::Cow;

pub type GraphqlResult<T> = Result<T, GraphqlError>;

/// Position of an error in the query document, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlError {
    pub message: Cow<'static, str>,
    pub code: ErrorCode,
    pub locations: Vec<Location>,
    pub path: Option<ResponsePath>,
    // Serialized as a map, but kept as a Vec for efficiency.
    pub extensions: Vec<(Cow<'static, str>, serde_json::Value)>,
}

impl GraphqlError {
    pub fn new(message: impl Into<Cow<'static, str>>, code: ErrorCode) -> Self {
        GraphqlError {
            message: message.into(),
            code,
            locations: Vec::new(),
            path: None,
            extensions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    #[must_use]
    pub fn with_locations(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.locations.extend(locations);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<ResponsePath>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        self.extensions.push((key, value.into()));
        self
    }

    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions
            .iter()
            .find_map(|(name, value)| (name == key).then_some(value))
    }

    // ------------- //
    // Common errors //
    // ------------- //

    pub fn internal_server_error() -> Self {
        GraphqlError::new("Internal server error", ErrorCode::InternalServerError)
    }

    pub fn internal_extension_error() -> Self {
        GraphqlError::new("Internal extension error", ErrorCode::ExtensionError)
    }
}

impl std::fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(f)
    }
}

impl std::error::Error for GraphqlError {}

impl serde::Serialize for GraphqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;

        if !self.locations.is_empty() {
            map.serialize_entry("locations", &self.locations)?;
        }

        if let Some(path) = &self.path {
            map.serialize_entry("path", path)?;
        }

        map.serialize_entry("extensions", &SerializableExtensions(self))?;
        map.end()
    }
}

struct SerializableExtensions<'a>(&'a GraphqlError);

impl serde::Serialize for SerializableExtensions<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.extensions.len() + 1))?;
        for (key, value) in &self.0.extensions {
            if key != "code" {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("code", &self.0.code)?;
        map.end()
    }
}
