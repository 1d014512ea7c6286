//! Keyboard builders.

use serde::{Deserialize, Serialize};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};
use url::Url;

use super::ContentError;

/// Telegram's limit on callback data, in bytes.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

/// Check that `value` fits into a callback button.
pub fn callback_data(value: impl Into<String>) -> Result<String, ContentError> {
    let value = value.into();
    let length = value.len();
    if length > MAX_CALLBACK_DATA_BYTES {
        return Err(ContentError::CallbackTooLong {
            value,
            length,
            max: MAX_CALLBACK_DATA_BYTES,
        });
    }
    Ok(value)
}

/// Encode `value` as compact JSON callback data.
pub fn callback_data_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ContentError> {
    callback_data(serde_json::to_string(value)?)
}

/// One reply keyboard button: plain text, or text with a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ButtonSource {
    Text(String),
    Button {
        text: String,
        #[serde(default)]
        request_contact: bool,
        #[serde(default)]
        request_location: bool,
    },
}

impl ButtonSource {
    pub fn into_button(self) -> KeyboardButton {
        match self {
            Self::Text(text) => KeyboardButton::new(text),
            Self::Button {
                text,
                request_contact,
                request_location,
            } => {
                let button = KeyboardButton::new(text);
                if request_contact {
                    button.request(ButtonRequest::Contact)
                } else if request_location {
                    button.request(ButtonRequest::Location)
                } else {
                    button
                }
            }
        }
    }
}

impl From<&str> for ButtonSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ButtonSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A keyboard row, or a single button taking a row of its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RowSource<T> {
    Row(Vec<T>),
    Single(T),
}

impl<T> RowSource<T> {
    fn into_row(self) -> Vec<T> {
        match self {
            Self::Row(row) => row,
            Self::Single(button) => vec![button],
        }
    }
}

/// Build a resized reply keyboard from rows of buttons.
pub fn reply_keyboard<R, B>(rows: R) -> KeyboardMarkup
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = B>,
    B: Into<ButtonSource>,
{
    let keyboard = rows.into_iter().map(|row| {
        row.into_iter()
            .map(|button| ButtonSource::into_button(button.into()))
            .collect::<Vec<_>>()
    });
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

/// One inline button, as written in content files.
///
/// `callback_data` may be any value: strings are used as they are, other
/// values are encoded as compact JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlineButtonSource {
    pub text: String,
    #[serde(default)]
    pub callback_data: Option<serde_json::Value>,
    #[serde(default)]
    pub url: Option<String>,
}

impl InlineButtonSource {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(serde_json::Value::String(data.into())),
            url: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }

    pub fn into_button(self) -> Result<InlineKeyboardButton, ContentError> {
        match (self.callback_data, self.url) {
            (Some(serde_json::Value::String(data)), None) => {
                Ok(InlineKeyboardButton::callback(self.text, callback_data(data)?))
            }
            (Some(data), None) => {
                Ok(InlineKeyboardButton::callback(self.text, callback_data_json(&data)?))
            }
            (None, Some(url)) => match Url::parse(&url) {
                Ok(url) => Ok(InlineKeyboardButton::url(self.text, url)),
                Err(source) => Err(ContentError::InvalidUrl {
                    text: self.text,
                    source,
                }),
            },
            _ => Err(ContentError::InvalidButton(self.text)),
        }
    }
}

/// Build an inline keyboard from rows of buttons.
///
/// Fails on the first button with oversized callback data, a bad url, or
/// not exactly one action.
pub fn inline_keyboard<R>(rows: R) -> Result<InlineKeyboardMarkup, ContentError>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = InlineButtonSource>,
{
    let keyboard = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(InlineButtonSource::into_button)
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InlineKeyboardMarkup::new(keyboard))
}

pub(super) fn rows<T>(source: Vec<RowSource<T>>) -> Vec<Vec<T>> {
    source.into_iter().map(RowSource::into_row).collect()
}
