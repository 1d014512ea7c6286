//! Structured logging into MongoDB.
//!
//! [`MongoLogger`] appends one [`LogEntry`] per call to the log
//! collection. Entries carrying an exception also produce a rendered
//! [`NotificationTemplate`], meant to be forwarded to a log chat.

mod models;
mod record;
mod template;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use mongodb::bson::Bson;
use mongodb::Collection;
use thiserror::Error;
use tracing::debug;

pub use models::{EventFrom, ExceptionInfo, LogEntry, LogLevel, LogType, UserInfo};
pub use record::{LogRecord, Loggable};
pub use template::{Notification, NotificationTemplate, TemplateError, DEFAULT_TEMPLATE};

use crate::database::Database;

/// Default name of the log collection.
pub const DEFAULT_COLLECTION: &str = "logs";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to serialize payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Logger settings.
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub collection: String,

    /// Zone the notification timestamp is shown in.
    pub timezone: FixedOffset,

    pub default_level: LogLevel,

    pub default_type: LogType,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            timezone: Utc.fix(),
            default_level: LogLevel::Info,
            default_type: LogType::Event,
        }
    }
}

impl LoggerOptions {
    #[must_use]
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn default_type(mut self, kind: LogType) -> Self {
        self.default_type = kind;
        self
    }
}

/// Writes log entries to MongoDB.
#[derive(Debug, Clone)]
pub struct MongoLogger {
    collection: Collection<LogEntry>,
    template: NotificationTemplate,
    options: LoggerOptions,
}

impl MongoLogger {
    pub fn new(db: &Database, template: NotificationTemplate, options: LoggerOptions) -> Self {
        Self {
            collection: db.collection(&options.collection),
            template,
            options,
        }
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    /// Append `record` to the log collection.
    ///
    /// Returns the rendered notification when the record carries an
    /// exception, `None` otherwise.
    pub async fn log(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        let now = Utc::now();
        let entry = record.into_entry(&self.options, now);

        let result = self.collection.insert_one(&entry).await?;
        debug!("Logged {:?} {:?} entry {}", entry.level, entry.kind, result.inserted_id);

        Ok(entry
            .exception
            .as_ref()
            .map(|exception| self.render(exception, now, &result.inserted_id)))
    }

    pub async fn debug(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        self.log(record.level(LogLevel::Debug)).await
    }

    pub async fn info(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        self.log(record.level(LogLevel::Info)).await
    }

    pub async fn warning(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        self.log(record.level(LogLevel::Warning)).await
    }

    pub async fn error(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        self.log(record.level(LogLevel::Error)).await
    }

    pub async fn critical(&self, record: LogRecord) -> Result<Option<String>, LoggerError> {
        self.log(record.level(LogLevel::Critical)).await
    }

    /// Render the notification for an entry stored under `id`.
    pub fn render(&self, exception: &ExceptionInfo, at: DateTime<Utc>, id: &Bson) -> String {
        render_notification(&self.template, exception, at.with_timezone(&self.options.timezone), id)
    }
}

fn render_notification(
    template: &NotificationTemplate,
    exception: &ExceptionInfo,
    at: DateTime<FixedOffset>,
    id: &Bson,
) -> String {
    let object_id = match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    };
    let datetime = at.format("%Y-%m-%d %H:%M:%S %:z").to_string();

    template.render(&Notification {
        error_type: &exception.kind,
        error_value: &exception.value,
        traceback: &exception.traceback,
        datetime: &datetime,
        object_id: &object_id,
    })
}
