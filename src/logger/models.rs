//! Log document models.

use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// What a log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogType {
    /// An inbound update.
    #[default]
    Event,
    /// A background task.
    Task,
}

/// Who produced the logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventFrom {
    #[default]
    User,
    Bot,
}

/// A failure attached to a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub traceback: String,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, value: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            traceback: traceback.into(),
        }
    }

    /// Describe a typed error; the traceback lists its source chain.
    pub fn from_error<E: std::error::Error + 'static>(error: &E) -> Self {
        let mut traceback = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            traceback.push_str("\n\nCaused by:\n    ");
            traceback.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::new(std::any::type_name::<E>(), error.to_string(), traceback)
    }

    /// Describe an `anyhow` error.
    ///
    /// The kind is the concrete type when it is one this crate or its
    /// collaborators produce. The traceback is anyhow's report: context
    /// chain plus backtrace when `RUST_BACKTRACE` enables capture.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        Self::new(error_kind(error), error.to_string(), format!("{error:?}"))
    }
}

fn error_kind(error: &anyhow::Error) -> &'static str {
    macro_rules! known_kinds {
        ($($ty:ty),* $(,)?) => {
            $(
                if error.is::<$ty>() {
                    return std::any::type_name::<$ty>();
                }
            )*
        };
    }

    known_kinds!(
        StorageError,
        ValidationError,
        super::LoggerError,
        mongodb::error::Error,
        teloxide::RequestError,
        serde_json::Error,
        std::io::Error,
    );
    "anyhow::Error"
}

/// Serialized user and chat of the logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user: Option<serde_json::Value>,
    pub chat: Option<serde_json::Value>,
}

/// One document of the log collection. Entries are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub datetime: bson::DateTime,

    pub level: LogLevel,

    #[serde(rename = "type")]
    pub kind: LogType,

    pub came_from: EventFrom,

    pub user_info: Option<UserInfo>,

    /// Raw inbound update, for `EVENT` entries.
    pub update: Option<serde_json::Value>,

    /// Task descriptor, for `TASK` entries.
    pub task: Option<serde_json::Value>,

    pub exception: Option<ExceptionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enums_serialize_uppercase() {
        assert_eq!(serde_json::to_value(LogLevel::Warning).unwrap(), "WARNING");
        assert_eq!(serde_json::to_value(LogType::Task).unwrap(), "TASK");
        assert_eq!(serde_json::to_value(EventFrom::Bot).unwrap(), "BOT");
    }

    #[test]
    fn test_exception_from_anyhow_known_kind() {
        let error = anyhow::Error::from(ValidationError::MissingAddress);
        let info = ExceptionInfo::from_anyhow(&error);

        assert!(info.kind.ends_with("ValidationError"), "{}", info.kind);
        assert_eq!(info.value, ValidationError::MissingAddress.to_string());
    }

    #[test]
    fn test_exception_from_anyhow_context_chain() {
        let error = anyhow::anyhow!("disk full").context("saving answers");
        let info = ExceptionInfo::from_anyhow(&error);

        assert_eq!(info.kind, "anyhow::Error");
        assert_eq!(info.value, "saving answers");
        assert!(info.traceback.contains("disk full"));
    }

    #[test]
    fn test_exception_from_error_lists_sources() {
        let error = StorageError::Validation(ValidationError::MissingAddress);
        let info = ExceptionInfo::from_error(&error);

        assert!(info.kind.ends_with("StorageError"));
        assert!(info.traceback.contains("Caused by"));
    }

    #[test]
    fn test_exception_field_named_type() {
        let value = serde_json::to_value(ExceptionInfo::new("E", "v", "tb")).unwrap();
        assert_eq!(value["type"], "E");
    }
}
