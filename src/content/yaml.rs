//! Bot texts and keyboards kept in YAML files.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use teloxide::types::{InlineKeyboardMarkup, KeyboardMarkup};

use super::keyboard::{self, ButtonSource, InlineButtonSource, RowSource};
use super::ContentError;

/// Remove the whitespace prefix shared by all non-blank lines.
///
/// Lines holding only whitespace come out empty.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or(a.len().min(b.len()), |((i, _), _)| i);
    &a[..end]
}

/// Read and parse one YAML file.
pub fn load_yaml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ContentError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ContentError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse several YAML files, keyed by path.
pub fn load_yaml_files<T, I, P>(paths: I) -> Result<BTreeMap<PathBuf, T>, ContentError>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .map(|path| {
            let path = path.as_ref();
            load_yaml_file(path).map(|content| (path.to_path_buf(), content))
        })
        .collect()
}

/// A text block, dedented on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Deref for Text {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|text| Self(dedent(&text)))
    }
}

/// Callback data checked against the size limit on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackString(pub String);

impl Deref for CallbackString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CallbackString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        keyboard::callback_data(value)
            .map(Self)
            .map_err(D::Error::custom)
    }
}

/// A reply keyboard written as a list of rows.
#[derive(Debug, Clone)]
pub struct ReplyKeyboard(pub KeyboardMarkup);

impl<'de> Deserialize<'de> for ReplyKeyboard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = Vec::<RowSource<ButtonSource>>::deserialize(deserializer)?;
        Ok(Self(keyboard::reply_keyboard(keyboard::rows(source))))
    }
}

/// An inline keyboard written as a list of rows.
#[derive(Debug, Clone)]
pub struct InlineKeyboard(pub InlineKeyboardMarkup);

impl<'de> Deserialize<'de> for InlineKeyboard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = Vec::<RowSource<InlineButtonSource>>::deserialize(deserializer)?;
        keyboard::inline_keyboard(keyboard::rows(source))
            .map(Self)
            .map_err(D::Error::custom)
    }
}
