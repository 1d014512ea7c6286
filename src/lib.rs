//! tgstarter - Telegram bot starter kit
//!
//! Building blocks for conversational Telegram bots on teloxide and
//! MongoDB.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration
//! - `storage` - Per-(chat, user) conversation state, data and bucket
//! - `router` - State-scoped handler registry and dispatch
//! - `logger` - Structured event and failure logging into MongoDB
//! - `bot` - teloxide wiring (with Throttle for API rate limiting) and
//!   outbound helpers
//! - `content` - Keyboards, callback data and YAML texts
//! - `utils` - Utility functions

pub mod bot;
pub mod config;
pub mod content;
pub mod database;
pub mod logger;
pub mod router;
pub mod storage;
pub mod utils;
