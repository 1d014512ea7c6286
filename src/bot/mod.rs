//! Bot module - teloxide wiring and outbound helpers.

pub mod dispatcher;
mod runtime;
pub mod sender;
pub mod webhook;

pub use dispatcher::{
    build_dispatcher, report_failure, AppState, CallbackEvent, MessageEvent, Routers, ThrottledBot,
};
pub use runtime::run;
pub use sender::{
    send_large_message, send_large_message_with, send_typing, send_with_action, split_chunks, Outbound,
    SendOptions,
};
