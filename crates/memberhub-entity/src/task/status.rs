//! Task status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a background task.
///
/// Status only moves forward: a queued task ends in exactly one of the
/// terminal statuses and never returns to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for, or claimed by, a worker.
    Queued,
    /// The handler returned successfully.
    Completed,
    /// No handler is registered under the task name.
    #[sqlx(rename = "not_registered")]
    #[serde(rename = "not_registered")]
    UnknownTask,
    /// The handler returned an error or panicked.
    Exception,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 4] = [
        Self::Queued,
        Self::Completed,
        Self::UnknownTask,
        Self::Exception,
    ];

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued)
    }

    /// Return the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Completed => "completed",
            Self::UnknownTask => "not_registered",
            Self::Exception => "exception",
        }
    }

    /// Parse a stored status string.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::UnknownTask.is_terminal());
        assert!(TaskStatus::Exception.is_terminal());
    }

    #[test]
    fn test_string_forms_agree() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_value(status).expect("serialize");
            assert_eq!(json, status.as_str());
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("running"), None);
    }
}
