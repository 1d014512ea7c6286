//! Bot content helpers.
//!
//! Keyboards built from nested rows, validated callback data, and texts
//! loaded from YAML files with their indentation removed.

mod keyboard;
mod yaml;

use std::path::PathBuf;

use thiserror::Error;

pub use keyboard::{
    callback_data, callback_data_json, inline_keyboard, reply_keyboard, ButtonSource,
    InlineButtonSource, RowSource, MAX_CALLBACK_DATA_BYTES,
};
pub use yaml::{dedent, load_yaml_file, load_yaml_files, CallbackString, InlineKeyboard, ReplyKeyboard, Text};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("callback data {value:?} is too long, {length} > {max} bytes")]
    CallbackTooLong {
        value: String,
        length: usize,
        max: usize,
    },

    #[error("inline button {0:?} needs exactly one of callback_data or url")]
    InvalidButton(String),

    #[error("invalid url of button {text:?}: {source}")]
    InvalidUrl {
        text: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to encode callback data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
