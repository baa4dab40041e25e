//! Execution context handed to task handlers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use memberhub_core::types::id::TaskId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_entity::task::EntityRef;

/// Errors raised while reading task arguments.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("missing positional argument {0}")]
    MissingPositional(usize),

    #[error("missing keyword argument '{0}'")]
    MissingKeyword(String),

    #[error("argument {name} has an unexpected shape: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("task has no tenant")]
    NoTenant,
}

/// An argument after entity references were re-fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArg {
    /// A plain value, as enqueued.
    Value(Value),
    /// A referenced entity with its current state.
    Entity {
        /// The stored reference.
        reference: EntityRef,
        /// The entity as it is now.
        current: Value,
    },
}

impl ResolvedArg {
    /// The JSON value a handler sees.
    pub fn value(&self) -> &Value {
        match self {
            Self::Value(value) => value,
            Self::Entity { current, .. } => current,
        }
    }

    /// The entity reference, for entity arguments.
    pub fn reference(&self) -> Option<&EntityRef> {
        match self {
            Self::Value(_) => None,
            Self::Entity { reference, .. } => Some(reference),
        }
    }
}

/// Everything a handler knows about the task it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task being executed.
    pub task_id: TaskId,
    /// Registered name.
    pub name: String,
    /// Tenant the task was enqueued for.
    pub tenant: Option<TenantContext>,
    /// Positional arguments.
    pub args: Vec<ResolvedArg>,
    /// Keyword arguments.
    pub kwargs: BTreeMap<String, ResolvedArg>,
}

impl TaskContext {
    /// The tenant, for tasks that only make sense inside one.
    pub fn tenant(&self) -> Result<&TenantContext, ArgumentError> {
        self.tenant.as_ref().ok_or(ArgumentError::NoTenant)
    }

    /// Deserialize positional argument `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgumentError> {
        let arg = self
            .args
            .get(index)
            .ok_or(ArgumentError::MissingPositional(index))?;
        decode(&index.to_string(), arg)
    }

    /// Deserialize keyword argument `key`.
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> Result<T, ArgumentError> {
        self.kwarg_opt(key)?
            .ok_or_else(|| ArgumentError::MissingKeyword(key.to_string()))
    }

    /// Deserialize keyword argument `key` if it was given.
    pub fn kwarg_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ArgumentError> {
        self.kwargs.get(key).map(|arg| decode(key, arg)).transpose()
    }
}

fn decode<T: DeserializeOwned>(name: &str, arg: &ResolvedArg) -> Result<T, ArgumentError> {
    serde_json::from_value(arg.value().clone()).map_err(|source| ArgumentError::Decode {
        name: name.to_string(),
        source,
    })
}
