//! Log records: what callers hand to the logger.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::Serialize;
use teloxide::types::{CallbackQuery, Chat, Message, Update, User};

use super::models::{EventFrom, ExceptionInfo, LogEntry, LogLevel, LogType, UserInfo};
use super::LoggerOptions;

/// Inbound payloads that can be logged as events.
pub trait Loggable: Serialize {
    /// Chat and user the payload came from, when known.
    fn origin(&self) -> (Option<&Chat>, Option<&User>);
}

impl Loggable for Update {
    fn origin(&self) -> (Option<&Chat>, Option<&User>) {
        (self.chat(), self.from())
    }
}

impl Loggable for Message {
    fn origin(&self) -> (Option<&Chat>, Option<&User>) {
        (Some(&self.chat), self.from.as_ref())
    }
}

impl Loggable for CallbackQuery {
    fn origin(&self) -> (Option<&Chat>, Option<&User>) {
        (self.message.as_ref().map(|m| m.chat()), Some(&self.from))
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Update(serde_json::Value),
    Task(serde_json::Value),
}

/// One thing to log, built with chained setters.
#[derive(Debug, Clone)]
pub struct LogRecord {
    payload: Payload,
    user_info: Option<UserInfo>,
    level: Option<LogLevel>,
    kind: Option<LogType>,
    from_bot: bool,
    exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// Record an inbound event.
    pub fn event<T: Loggable + ?Sized>(event: &T) -> serde_json::Result<Self> {
        let (chat, user) = event.origin();
        let user_info = UserInfo {
            user: user.map(serde_json::to_value).transpose()?,
            chat: chat.map(serde_json::to_value).transpose()?,
        };

        Ok(Self::with_payload(
            Payload::Update(serde_json::to_value(event)?),
            Some(user_info),
            None,
        ))
    }

    /// Record a background task described by `task`.
    pub fn task<T: Serialize + ?Sized>(task: &T) -> serde_json::Result<Self> {
        Ok(Self::with_payload(
            Payload::Task(serde_json::to_value(task)?),
            None,
            Some(LogType::Task),
        ))
    }

    fn with_payload(payload: Payload, user_info: Option<UserInfo>, kind: Option<LogType>) -> Self {
        Self {
            payload,
            user_info,
            level: None,
            kind,
            from_bot: false,
            exception: None,
        }
    }

    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: LogType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Mark the event as produced by the bot itself.
    #[must_use]
    pub fn from_bot(mut self, from_bot: bool) -> Self {
        self.from_bot = from_bot;
        self
    }

    #[must_use]
    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Attach an `anyhow` error as the exception.
    #[must_use]
    pub fn error(self, error: &anyhow::Error) -> Self {
        self.exception(ExceptionInfo::from_anyhow(error))
    }

    /// Build the document, filling unset fields from `options`.
    pub(crate) fn into_entry(self, options: &LoggerOptions, now: DateTime<Utc>) -> LogEntry {
        let (update, task) = match self.payload {
            Payload::Update(value) => (Some(value), None),
            Payload::Task(value) => (None, Some(value)),
        };

        LogEntry {
            id: None,
            datetime: bson::DateTime::from_millis(now.timestamp_millis()),
            level: self.level.unwrap_or(options.default_level),
            kind: self.kind.unwrap_or(options.default_type),
            came_from: if self.from_bot { EventFrom::Bot } else { EventFrom::User },
            user_info: self.user_info,
            update,
            task,
            exception: self.exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message() -> Message {
        serde_json::from_value(json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": { "id": 5, "type": "private", "first_name": "Ann" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "text": "hello"
        }))
        .unwrap()
    }

    #[test]
    fn test_event_entry_defaults() {
        let now = Utc::now();
        let entry = LogRecord::event(&message())
            .unwrap()
            .into_entry(&LoggerOptions::default(), now);

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.kind, LogType::Event);
        assert_eq!(entry.came_from, EventFrom::User);
        assert_eq!(entry.datetime.timestamp_millis(), now.timestamp_millis());
        assert!(entry.task.is_none());
        assert!(entry.exception.is_none());

        let update = entry.update.unwrap();
        assert_eq!(update["text"], "hello");

        let user_info = entry.user_info.unwrap();
        assert_eq!(user_info.user.unwrap()["id"], 7);
        assert_eq!(user_info.chat.unwrap()["id"], 5);
    }

    #[test]
    fn test_task_entry_overrides() {
        let entry = LogRecord::task(&json!({ "name": "cleanup" }))
            .unwrap()
            .level(LogLevel::Critical)
            .from_bot(true)
            .error(&anyhow::anyhow!("timed out"))
            .into_entry(&LoggerOptions::default(), Utc::now());

        assert_eq!(entry.level, LogLevel::Critical);
        assert_eq!(entry.kind, LogType::Task);
        assert_eq!(entry.came_from, EventFrom::Bot);
        assert!(entry.update.is_none());
        assert!(entry.user_info.is_none());
        assert_eq!(entry.task.unwrap()["name"], "cleanup");
        assert_eq!(entry.exception.unwrap().value, "timed out");
    }

    #[test]
    fn test_options_supply_defaults() {
        let options = LoggerOptions::default()
            .default_level(LogLevel::Debug)
            .default_type(LogType::Task);

        let entry = LogRecord::event(&message()).unwrap().into_entry(&options, Utc::now());

        assert_eq!(entry.level, LogLevel::Debug);
        assert_eq!(entry.kind, LogType::Task);
    }
}
