//! Failure notification templates.
//!
//! A template is plain text with `{placeholder}` slots:
//!
//! - `{error_type}` - kind of the failure
//! - `{error_value}` - failure message
//! - `{traceback}` - error report
//! - `{datetime}` - time of the log entry
//! - `{object_id}` - id of the stored log entry
//!
//! Substituted values are HTML-escaped; templates are meant to be sent
//! with the HTML parse mode.

use thiserror::Error;

use crate::utils::html_escape;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "\u{26a0}\u{fe0f} <b>{error_type}</b>: {error_value}\n\n\
<pre>{traceback}</pre>\n\n\
{datetime}\n\
<code>{object_id}</code>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unclosed placeholder at byte {0}")]
    Unclosed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    ErrorType,
    ErrorValue,
    Traceback,
    Datetime,
    ObjectId,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "error_type" => Some(Self::ErrorType),
            "error_value" => Some(Self::ErrorValue),
            "traceback" => Some(Self::Traceback),
            "datetime" => Some(Self::Datetime),
            "object_id" => Some(Self::ObjectId),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Placeholder),
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct Notification<'a> {
    pub error_type: &'a str,
    pub error_value: &'a str,
    pub traceback: &'a str,
    pub datetime: &'a str,
    pub object_id: &'a str,
}

/// A parsed notification template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    segments: Vec<Segment>,
}

impl NotificationTemplate {
    /// Parse `source`, rejecting unknown or unclosed placeholders.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }

            let after = &rest[open + 1..];
            let close = after.find('}').ok_or(TemplateError::Unclosed(offset + open))?;
            let name = after[..close].trim();
            let slot = Placeholder::from_name(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
            segments.push(Segment::Slot(slot));

            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Substitute `values` into the template in one pass.
    pub fn render(&self, values: &Notification<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    let value = match slot {
                        Placeholder::ErrorType => values.error_type,
                        Placeholder::ErrorValue => values.error_value,
                        Placeholder::Traceback => values.traceback,
                        Placeholder::Datetime => values.datetime,
                        Placeholder::ObjectId => values.object_id,
                    };
                    out.push_str(&html_escape(value));
                }
            }
        }
        out
    }
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self { segments: Vec::new() })
    }
}
