//! Performance oriented JSON manipulation.

use std::fmt;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

pub use serde_json_bytes::ByteString;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = serde_json_bytes::Map<ByteString, Value>;

/// One segment of a [`Path`] into response data.
///
/// Serialized the way GraphQL responses carry paths: keys as strings,
/// list positions as numbers.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum PathElement {
    /// A field name in an object.
    Key(String),

    /// An index in a list.
    Index(usize),
}

impl Serialize for PathElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PathElement::Key(key) => serializer.serialize_str(key),
            PathElement::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl<'de> Deserialize<'de> for PathElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PathElementVisitor)
    }
}

struct PathElementVisitor;

impl de::Visitor<'_> for PathElementVisitor {
    type Value = PathElement;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string key or an array index")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(PathElement::Index(value as usize))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        usize::try_from(value)
            .map(PathElement::Index)
            .map_err(|_| E::custom("path indices must not be negative"))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(PathElement::Key(value.to_owned()))
    }
}

/// A path into the result data, identifying the position an incremental
/// response element must be merged at.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> From<T> for Path
where
    T: AsRef<str>,
{
    fn from(s: T) -> Self {
        Self(
            s.as_ref()
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    segment
                        .parse::<usize>()
                        .map(PathElement::Index)
                        .unwrap_or_else(|_| PathElement::Key(segment.to_string()))
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/")?;
            match element {
                PathElement::Key(key) => write!(f, "{key}")?,
                PathElement::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn path_from_string_parses_keys_and_indices() {
        let path = Path::from("hero/friends/1/name");
        assert_eq!(
            path,
            Path(vec![
                PathElement::Key("hero".to_string()),
                PathElement::Key("friends".to_string()),
                PathElement::Index(1),
                PathElement::Key("name".to_string()),
            ])
        );
    }

    #[test]
    fn path_ignores_empty_segments() {
        assert_eq!(Path::from("/hero//name"), Path::from("hero/name"));
    }

    #[test]
    fn path_length_tracks_segments() {
        assert!(Path::empty().is_empty());
        assert_eq!(Path::empty(), Path::from(""));

        let path = Path::from("hero/friends/1");
        assert_eq!(path.len(), 3);
        assert!(!path.is_empty());
    }

    #[test]
    fn path_displays_with_leading_slashes() {
        let path = Path::from("hero/friends/1/name");
        assert_eq!(path.to_string(), "/hero/friends/1/name");
    }

    #[test]
    fn path_serializes_as_mixed_array() {
        let path = Path::from("hero/friends/1/name");
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            json!(["hero", "friends", 1, "name"]),
        );
    }

    #[test]
    fn path_deserializes_from_mixed_array() {
        let path: Path = serde_json::from_value(json!(["hero", "friends", 1, "name"])).unwrap();
        assert_eq!(path, Path::from("hero/friends/1/name"));
    }

    #[test]
    fn path_rejects_negative_indices() {
        assert!(serde_json::from_value::<Path>(json!(["hero", -1])).is_err());
    }
}
