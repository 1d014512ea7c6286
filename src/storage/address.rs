//! Conversation addresses.
//!
//! Every storage operation is keyed by an [`Address`]: a (chat, user)
//! pair of integers. Callers may hold ids as Telegram newtypes, plain
//! integers or numeric strings; [`Address::normalize`] turns any of them
//! into the canonical form used as the lookup key.

use std::fmt;

use teloxide::types::{CallbackQuery, ChatId, Message, Update, UserId};

use super::error::ValidationError;

/// Canonical (chat, user) pair identifying one conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub chat_id: i64,
    pub user_id: i64,
}

/// An identifier as supplied by a caller, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawId {
    Int(i64),
    Unsigned(u64),
    Text(String),
}

impl From<i64> for RawId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RawId {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u64> for RawId {
    fn from(value: u64) -> Self {
        Self::Unsigned(value)
    }
}

impl From<&str> for RawId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ChatId> for RawId {
    fn from(value: ChatId) -> Self {
        Self::Int(value.0)
    }
}

impl From<UserId> for RawId {
    fn from(value: UserId) -> Self {
        Self::Unsigned(value.0)
    }
}

impl RawId {
    /// Coerce to `i64`, naming `field` in the error.
    fn to_i64(&self, field: &'static str) -> Result<i64, ValidationError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Unsigned(v) => i64::try_from(*v).map_err(|_| ValidationError::NotAnInteger {
                field,
                value: v.to_string(),
            }),
            Self::Text(s) => s.trim().parse::<i64>().map_err(|_| ValidationError::NotAnInteger {
                field,
                value: s.clone(),
            }),
        }
    }
}

impl Address {
    /// Build an address from ids that are already integers.
    pub const fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }

    /// Address of a chat where the chat itself is the participant
    /// (private chats, channels).
    pub const fn for_chat(chat_id: i64) -> Self {
        Self::new(chat_id, chat_id)
    }

    /// Normalize a possibly partial pair.
    ///
    /// A missing component mirrors the present one. Fails when both are
    /// missing or when a present component is not integer-coercible.
    pub fn normalize(chat: Option<RawId>, user: Option<RawId>) -> Result<Self, ValidationError> {
        let chat = chat.map(|c| c.to_i64("chat")).transpose()?;
        let user = user.map(|u| u.to_i64("user")).transpose()?;

        match (chat, user) {
            (Some(chat_id), Some(user_id)) => Ok(Self::new(chat_id, user_id)),
            (Some(chat_id), None) => Ok(Self::new(chat_id, chat_id)),
            (None, Some(user_id)) => Ok(Self::new(user_id, user_id)),
            (None, None) => Err(ValidationError::MissingAddress),
        }
    }

    /// Normalize a complete pair.
    pub fn parse(chat: impl Into<RawId>, user: impl Into<RawId>) -> Result<Self, ValidationError> {
        Self::normalize(Some(chat.into()), Some(user.into()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// Events that belong to a conversation address.
pub trait Addressed {
    fn address(&self) -> Result<Address, ValidationError>;
}

impl Addressed for Address {
    fn address(&self) -> Result<Address, ValidationError> {
        Ok(*self)
    }
}

impl Addressed for Message {
    fn address(&self) -> Result<Address, ValidationError> {
        Address::normalize(
            Some(self.chat.id.into()),
            self.from.as_ref().map(|u| u.id.into()),
        )
    }
}

impl Addressed for CallbackQuery {
    fn address(&self) -> Result<Address, ValidationError> {
        Address::normalize(
            self.message.as_ref().map(|m| m.chat().id.into()),
            Some(self.from.id.into()),
        )
    }
}

impl Addressed for Update {
    fn address(&self) -> Result<Address, ValidationError> {
        Address::normalize(
            self.chat().map(|c| c.id.into()),
            self.from().map(|u| u.id.into()),
        )
    }
}
