use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;

use crate::error::RequestError;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// A GraphQL response.
///
/// A server answering over a multipart protocol (`@defer`, subscriptions)
/// produces one of these per part; [`Response::path`] and [`Response::label`]
/// then identify where the partial data belongs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The label that was passed to the defer or stream directive for this patch.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,

    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The path that the data should be merged at.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,

    /// `Some(true)` while the server has more parts to deliver.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_next: Option<bool>,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        label: Option<String>,
        data: Option<Value>,
        path: Option<Path>,
        errors: Vec<Error>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        extensions: JsonMap<ByteString, Value>,
        has_next: Option<bool>,
    ) -> Self {
        Self {
            label,
            data,
            path,
            errors,
            extensions,
            has_next,
        }
    }

    /// If path is None, this is a primary response.
    pub fn is_primary(&self) -> bool {
        self.path.is_none()
    }

    /// Create a [`Response`] from the supplied [`Bytes`].
    ///
    /// The field extraction is done by hand rather than through the serde
    /// derive so that `"data": null` (a valid execution result) stays
    /// distinguishable from an absent `data` entry.
    pub fn from_bytes(b: Bytes) -> Result<Response, RequestError> {
        let value = Value::from_bytes(b).map_err(|error| RequestError::MalformedResponse {
            reason: error.to_string(),
        })?;
        let mut object = match value {
            Value::Object(object) => object,
            _ => {
                return Err(RequestError::MalformedResponse {
                    reason: "invalid type, expected an object".to_string(),
                })
            }
        };

        let data = object.remove("data");
        let errors: Vec<Error> = remove_field(&mut object, "errors")?.unwrap_or_default();
        let extensions: Object = remove_field(&mut object, "extensions")?.unwrap_or_default();
        let label: Option<String> = remove_field(&mut object, "label")?;
        let path: Option<Path> = remove_field(&mut object, "path")?;
        let has_next: Option<bool> = remove_field(&mut object, "hasNext")?;

        // Graphql spec says:
        // If the data entry in the response is not present, the errors entry in the response must not be empty.
        // It must contain at least one error. The errors it contains should indicate why no data was able to be returned.
        if data.is_none() && errors.is_empty() {
            return Err(RequestError::MalformedResponse {
                reason: "graphql response without data must contain at least one error".to_string(),
            });
        }

        Ok(Response {
            label,
            data,
            path,
            errors,
            extensions,
            has_next,
        })
    }
}

fn remove_field<T: DeserializeOwned>(
    object: &mut Object,
    key: &str,
) -> Result<Option<T>, RequestError> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            serde_json_bytes::from_value(value)
                .map(Some)
                .map_err(|err| RequestError::MalformedResponse {
                    reason: format!("invalid `{key}`: {err}"),
                })
        }
    }
}
