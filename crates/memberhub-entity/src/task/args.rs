//! Task argument encoding.
//!
//! Arguments are stored as JSON. Plain values are kept as they are; domain
//! entities are stored as a reference (`{"$entity": {"kind", "id"}}`) and
//! re-fetched when the task runs, so a handler always sees current state
//! instead of a snapshot taken at enqueue time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use memberhub_core::error::AppError;

/// Object key marking an encoded entity reference.
pub const ENTITY_MARKER: &str = "$entity";

/// A `(type tag, primary key)` reference to a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type tag (e.g. `"documents.node"`).
    pub kind: String,
    /// Primary key.
    pub id: Uuid,
}

impl EntityRef {
    /// Create a new reference.
    pub fn new(kind: impl Into<String>, id: impl Into<Uuid>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// One encoded task argument.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskArg {
    /// A plain JSON value.
    Value(Value),
    /// A reference to an entity, resolved at execution time.
    Entity(EntityRef),
}

impl TaskArg {
    /// Encode into the stored JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Entity(entity) => {
                let mut map = Map::new();
                map.insert(
                    ENTITY_MARKER.to_string(),
                    serde_json::json!({ "kind": entity.kind, "id": entity.id }),
                );
                Value::Object(map)
            }
        }
    }

    /// Decode from the stored JSON form.
    ///
    /// Only an object whose single key is the entity marker is treated as a
    /// reference; everything else is a plain value.
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(inner) = map.get(ENTITY_MARKER) {
                    let entity: EntityRef = serde_json::from_value(inner.clone())?;
                    return Ok(Self::Entity(entity));
                }
            }
        }
        Ok(Self::Value(value))
    }
}

/// Positional and keyword arguments of a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskArgs {
    /// Positional arguments.
    pub positional: Vec<TaskArg>,
    /// Keyword arguments.
    pub keyword: BTreeMap<String, TaskArg>,
}

impl TaskArgs {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain positional value.
    pub fn arg(mut self, value: impl Serialize) -> Result<Self, AppError> {
        self.positional.push(TaskArg::Value(serde_json::to_value(value)?));
        Ok(self)
    }

    /// Append a positional entity reference.
    pub fn entity(mut self, entity: EntityRef) -> Self {
        self.positional.push(TaskArg::Entity(entity));
        self
    }

    /// Set a plain keyword value.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self, AppError> {
        self.keyword
            .insert(key.into(), TaskArg::Value(serde_json::to_value(value)?));
        Ok(self)
    }

    /// Set a keyword entity reference.
    pub fn kwarg_entity(mut self, key: impl Into<String>, entity: EntityRef) -> Self {
        self.keyword.insert(key.into(), TaskArg::Entity(entity));
        self
    }

    /// Encode into the `(args, kwargs)` columns.
    pub fn encode(&self) -> (Value, Value) {
        let args = Value::Array(self.positional.iter().map(TaskArg::to_json).collect());
        let kwargs = Value::Object(
            self.keyword
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        );
        (args, kwargs)
    }

    /// Decode the stored `(args, kwargs)` columns.
    pub fn decode(args: &Value, kwargs: &Value) -> Result<Self, AppError> {
        let positional = match args {
            Value::Array(items) => items
                .iter()
                .cloned()
                .map(TaskArg::from_json)
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            other => {
                return Err(AppError::validation(format!(
                    "Task args must be a JSON array, got {other}"
                )));
            }
        };

        let keyword = match kwargs {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), TaskArg::from_json(v.clone())?)))
                .collect::<Result<BTreeMap<_, _>, AppError>>()?,
            Value::Null => BTreeMap::new(),
            other => {
                return Err(AppError::validation(format!(
                    "Task kwargs must be a JSON object, got {other}"
                )));
            }
        };

        Ok(Self {
            positional,
            keyword,
        })
    }
}
