//! Message dispatcher setup.
//!
//! Plugs the state routers into a teloxide dispatcher: every update is
//! logged first, then messages and callback queries are routed by the
//! stored state of their (chat, user) address.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, error, warn};

use super::sender::{send_large_message, MAX_MESSAGE_LENGTH};
use crate::logger::{LogRecord, MongoLogger};
use crate::router::{DispatchOutcome, StateRouter};
use crate::storage::{Address, Addressed, StateStorage, ValidationError};
use crate::utils::strip_html;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Logger for updates and failures.
    pub logger: Arc<MongoLogger>,

    /// Chat receiving failure notifications.
    pub log_chat: Option<ChatId>,

    /// Store every inbound update in the log collection.
    pub log_updates: bool,
}

impl AppState {
    pub fn new(logger: Arc<MongoLogger>, log_chat: Option<ChatId>, log_updates: bool) -> Self {
        Self {
            logger,
            log_chat,
            log_updates,
        }
    }
}

/// A message together with the bot that received it.
#[derive(Clone)]
pub struct MessageEvent {
    pub bot: ThrottledBot,
    pub msg: Message,
}

impl MessageEvent {
    /// Text of the message, if any.
    pub fn text(&self) -> Option<&str> {
        self.msg.text()
    }
}

impl Addressed for MessageEvent {
    fn address(&self) -> Result<Address, ValidationError> {
        self.msg.address()
    }
}

/// A callback query together with the bot that received it.
#[derive(Clone)]
pub struct CallbackEvent {
    pub bot: ThrottledBot,
    pub query: CallbackQuery,
}

impl CallbackEvent {
    pub fn data(&self) -> Option<&str> {
        self.query.data.as_deref()
    }
}

impl Addressed for CallbackEvent {
    fn address(&self) -> Result<Address, ValidationError> {
        self.query.address()
    }
}

type UpdateHookFn =
    Arc<dyn Fn(ThrottledBot, Arc<Update>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// State routers for the update kinds the bot handles, plus hooks run
/// for every update before routing.
pub struct Routers {
    pub messages: StateRouter<MessageEvent>,
    pub callbacks: StateRouter<CallbackEvent>,
    update_hooks: Vec<UpdateHookFn>,
}

impl Routers {
    /// Empty routers sharing `storage`.
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            messages: StateRouter::new(storage.clone()),
            callbacks: StateRouter::new(storage),
            update_hooks: Vec::new(),
        }
    }

    /// Register `hook` to run for every update, whatever its kind.
    ///
    /// Hooks run in registration order after the update is logged and
    /// before it is routed. A failing hook is logged and does not stop
    /// the others or the routing.
    pub fn on_any_update<F, Fut>(&mut self, hook: F)
    where
        F: Fn(ThrottledBot, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.update_hooks.push(Arc::new(move |bot, update| hook(bot, update).boxed()));
    }

    /// Run the any-update hooks for `update`. Returns how many failed.
    pub async fn run_update_hooks(&self, bot: &ThrottledBot, update: Update) -> usize {
        let update = Arc::new(update);
        let mut failed = 0;
        for hook in &self.update_hooks {
            if let Err(e) = hook(bot.clone(), update.clone()).await {
                warn!("Update hook failed for update {}: {:#}", update.id.0, e);
                failed += 1;
            }
        }
        failed
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
    routers: Routers,
) -> Dispatcher<ThrottledBot, anyhow::Error, DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, Arc::new(routers)])
        .error_handler(LoggingErrorHandler::with_custom_text("Error while handling update"))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    dptree::entry()
        .inspect_async(log_update)
        .inspect_async(run_update_hooks)
        .branch(Update::filter_message().endpoint(route_message))
        .branch(Update::filter_callback_query().endpoint(route_callback))
}

/// Store the update in the log collection (runs before all handlers).
async fn log_update(update: Update, state: AppState) {
    if !state.log_updates {
        return;
    }

    let record = match LogRecord::event(&update) {
        Ok(record) => record,
        Err(e) => {
            warn!("Failed to serialize update {}: {}", update.id.0, e);
            return;
        }
    };

    if let Err(e) = state.logger.log(record).await {
        warn!("Failed to log update {}: {}", update.id.0, e);
    }
}

async fn run_update_hooks(bot: ThrottledBot, update: Update, routers: Arc<Routers>) {
    routers.run_update_hooks(&bot, update).await;
}

async fn route_message(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    routers: Arc<Routers>,
) -> anyhow::Result<()> {
    let event = MessageEvent {
        bot: bot.clone(),
        msg: msg.clone(),
    };

    match routers.messages.dispatch(event).await {
        Ok(outcome) => {
            trace_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            error!("Failed to handle message {} in chat {}: {:#}", msg.id.0, msg.chat.id, e);
            let record = LogRecord::event(&msg)?.error(&e);
            report_failure(&bot, &state, record).await
        }
    }
}

async fn route_callback(
    bot: ThrottledBot,
    query: CallbackQuery,
    state: AppState,
    routers: Arc<Routers>,
) -> anyhow::Result<()> {
    let event = CallbackEvent {
        bot: bot.clone(),
        query: query.clone(),
    };

    match routers.callbacks.dispatch(event).await {
        Ok(outcome) => {
            if outcome == DispatchOutcome::Unhandled {
                // Stop the client's loading spinner for buttons nobody handles.
                bot.answer_callback_query(query.id.clone()).await?;
            }
            trace_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            error!("Failed to handle callback query {} from {}: {:#}", query.id, query.from.id, e);
            if let Err(answer_error) = bot.answer_callback_query(query.id.clone()).await {
                warn!("Failed to answer callback query {}: {}", query.id, answer_error);
            }
            let record = LogRecord::event(&query)?.error(&e);
            report_failure(&bot, &state, record).await
        }
    }
}

fn trace_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Handled { handler, next_state } => {
            debug!("Handled by {}, next state {:?}", handler, next_state);
        }
        DispatchOutcome::ErrorHandled { handler } => {
            debug!("Failure of {} handled by an error hook", handler);
        }
        DispatchOutcome::Unhandled => debug!("Update left unhandled"),
    }
}

/// Log `record` at ERROR level and forward the notification to the log
/// chat, if one is configured.
pub async fn report_failure(
    bot: &ThrottledBot,
    state: &AppState,
    record: LogRecord,
) -> anyhow::Result<()> {
    let notification = state
        .logger
        .error(record)
        .await
        .context("failed to store failure report")?;

    let (Some(chat_id), Some(text)) = (state.log_chat, notification) else {
        return Ok(());
    };

    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .context("failed to send failure notification")?;
    } else {
        // Markup does not survive splitting, send the long report as plain text.
        send_large_message(bot, chat_id, &strip_html(&text), MAX_MESSAGE_LENGTH)
            .await
            .context("failed to send failure notification")?;
    }

    Ok(())
}
