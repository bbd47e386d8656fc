use std::fmt;

/// Path of a value inside a GraphQL response, from the root down.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Default, Hash)]
pub struct ResponsePath(Vec<PathSegment>);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl ResponsePath {
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub fn parent(&self) -> Option<ResponsePath> {
        let (_, parent) = self.0.split_last()?;
        Some(ResponsePath(parent.to_vec()))
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Root fields have no parent path, `{ a }` resolves `a` at depth 1.
    pub fn is_root_field(&self) -> bool {
        self.0.len() == 1
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Materialized key, segments joined with `.`. The root path is the empty string.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(name.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        PathSegment::Field(name)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for ResponsePath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ResponsePath(iter.into_iter().map(Into::into).collect())
    }
}

impl serde::Serialize for ResponsePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => seq.serialize_element(name)?,
                PathSegment::Index(index) => seq.serialize_element(index)?,
            }
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_segments() {
        let path: ResponsePath = [PathSegment::from("hero"), PathSegment::from(0), PathSegment::from("name")]
            .into_iter()
            .collect();

        assert_eq!(path.to_key(), "hero.0.name");
        assert_eq!(path.parent().map(|p| p.to_key()).as_deref(), Some("hero.0"));
        assert_eq!(ResponsePath::root().to_key(), "");
        assert!(ResponsePath::root().parent().is_none());
    }

    #[test]
    fn serializes_indices_as_numbers() {
        let path = ResponsePath::root().child("droids").child(2usize);
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["droids",2]"#);
    }
}
