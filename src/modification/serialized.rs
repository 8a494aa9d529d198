use std::borrow::Cow;

use hashlink::LinkedHashMap;
use saphyr::{Scalar, Yaml};
use snafu::Snafu;

use crate::filesystem::RelPath;
use crate::modification::Modification;

const TYPE_KEY: &str = "type";
const PATH_KEY: &str = "path";
const FROM_KEY: &str = "from";
const TO_KEY: &str = "to";

const UPDATED_TYPE: &str = "Updated";
const DELETED_TYPE: &str = "Deleted";
const MOVED_TYPE: &str = "Moved";

fn string_node(value: impl Into<String>) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Owned(value.into())))
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn string_field<'a>(
    mapping: &'a LinkedHashMap<Yaml<'_>, Yaml<'_>>,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    mapping
        .get(&key(name))
        .ok_or(DecodeError::MissingField { field: name })?
        .as_str()
        .ok_or(DecodeError::InvalidField { field: name })
}

impl Modification {
    /// Structural form: a mapping with a `type` discriminator and `path`, or
    /// `from`/`to` for moves. Directory paths carry a trailing `/`.
    pub fn to_yaml(&self) -> Yaml<'static> {
        let mut mapping = LinkedHashMap::new();
        match self {
            Modification::Updated { path } => {
                mapping.insert(key(TYPE_KEY), string_node(UPDATED_TYPE));
                mapping.insert(key(PATH_KEY), string_node(path.to_tagged_string()));
            }
            Modification::Deleted { path } => {
                mapping.insert(key(TYPE_KEY), string_node(DELETED_TYPE));
                mapping.insert(key(PATH_KEY), string_node(path.to_tagged_string()));
            }
            Modification::Moved { from, to } => {
                mapping.insert(key(TYPE_KEY), string_node(MOVED_TYPE));
                mapping.insert(key(FROM_KEY), string_node(from.to_tagged_string()));
                mapping.insert(key(TO_KEY), string_node(to.to_tagged_string()));
            }
        }
        Yaml::Mapping(mapping)
    }

    pub fn from_yaml(node: &Yaml) -> Result<Self, DecodeError> {
        let mapping = node.as_mapping().ok_or(DecodeError::NotMapping)?;

        let field = |name| string_field(mapping, name);

        match field(TYPE_KEY)? {
            UPDATED_TYPE => Ok(Modification::Updated {
                path: RelPath::from_tagged_string(field(PATH_KEY)?),
            }),
            DELETED_TYPE => Ok(Modification::Deleted {
                path: RelPath::from_tagged_string(field(PATH_KEY)?),
            }),
            MOVED_TYPE => Ok(Modification::Moved {
                from: RelPath::from_tagged_string(field(FROM_KEY)?),
                to: RelPath::from_tagged_string(field(TO_KEY)?),
            }),
            other => Err(DecodeError::UnknownType {
                type_name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("Serialized modification should be a map"))]
    NotMapping,
    #[snafu(display("Serialized modification is missing field '{}'", field))]
    MissingField { field: &'static str },
    #[snafu(display("Field '{}' of serialized modification should be a string", field))]
    InvalidField { field: &'static str },
    #[snafu(display("Unknown modification type '{}'", type_name))]
    UnknownType { type_name: String },
}
