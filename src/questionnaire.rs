//! Questionnaire flow.
//!
//! `/start` (or any plain message from a new user) asks for a name, then
//! an age, then sums the answers up. `/cancel` drops the answers from any
//! step. The number of completed runs is kept in the user's bucket.

use std::sync::Arc;

use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use tgstarter::bot::sender::MAX_MESSAGE_LENGTH;
use tgstarter::bot::{
    send_large_message_with, send_typing, CallbackEvent, MessageEvent, Routers, SendOptions,
};
use tgstarter::content::{inline_keyboard, InlineButtonSource};
use tgstarter::router::{ErrorContext, RouteOptions, StateContext, Transition};
use tgstarter::storage::Bag;
use tgstarter::utils::user_fullname;

/// Callback data of the "start over" button.
const RESTART: &str = "questionnaire:restart";

/// Bucket key counting completed runs.
const COMPLETED: &str = "completed";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the questionnaire over")]
    Start,

    #[command(description = "drop your answers")]
    Cancel,

    #[command(description = "show this text")]
    Help,
}

/// Register the questionnaire routes.
pub fn install(routers: &mut Routers, bot_username: String) {
    let username: Arc<str> = bot_username.into();
    let messages = &mut routers.messages;

    messages.register(
        RouteOptions::new().any_state().filter(command_is(username.clone(), Command::Cancel)),
        cancel,
    );
    messages.register(
        RouteOptions::new().any_state().filter(command_is(username.clone(), Command::Help)),
        help,
    );
    messages.register(
        RouteOptions::new().any_state().filter(command_is(username.clone(), Command::Start)),
        start,
    );
    messages.register(RouteOptions::new().primary().filter(is_answer), start);
    messages.register(RouteOptions::new().filter(is_answer), ask_name);
    messages.register(RouteOptions::new().filter(is_answer), ask_age);
    messages.on_error(apologize);

    routers.callbacks.register(
        RouteOptions::new()
            .any_state()
            .filter(|event: &CallbackEvent| event.data() == Some(RESTART)),
        restart,
    );
}

fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    Command::parse(text, bot_username).ok()
}

fn command_is(
    bot_username: Arc<str>,
    expected: Command,
) -> impl Fn(&MessageEvent) -> bool + Send + Sync + 'static {
    move |event: &MessageEvent| {
        event
            .text()
            .and_then(|text| parse_command(text, &bot_username))
            .is_some_and(|command| command == expected)
    }
}

/// Plain text that is not a command.
fn is_answer(event: &MessageEvent) -> bool {
    event.text().is_some_and(|text| !text.starts_with('/'))
}

fn parse_age(text: &str) -> Option<u8> {
    text.trim().parse().ok().filter(|age| (1..=120).contains(age))
}

fn summary(name: &str, age: u8, completed: u64) -> String {
    format!(
        "Here is what I know about you:\n\nName: {}\nAge: {}\n\nQuestionnaires completed: {}",
        name, age, completed
    )
}

async fn start(ctx: StateContext<MessageEvent>) -> anyhow::Result<Transition> {
    let MessageEvent { bot, msg } = &*ctx.event;
    ctx.finish().await?;

    let greeting = match msg.from.as_ref() {
        Some(user) => format!("Hi, {}!", user_fullname(&user.first_name, user.last_name.as_deref())),
        None => "Hi!".to_string(),
    };
    bot.send_message(msg.chat.id, format!("{} What is your name?", greeting))
        .await?;

    Ok(Transition::to_handler(ask_name))
}

async fn ask_name(ctx: StateContext<MessageEvent>) -> anyhow::Result<Transition> {
    let MessageEvent { bot, msg } = &*ctx.event;
    let name = msg.text().unwrap_or_default().trim();

    let mut data = ctx.data().await?;
    data.insert("name".to_string(), json!(name));
    ctx.set_data(data).await?;

    bot.send_message(msg.chat.id, format!("Nice to meet you, {}! How old are you?", name))
        .await?;

    Ok(Transition::to_handler(ask_age))
}

async fn ask_age(ctx: StateContext<MessageEvent>) -> anyhow::Result<Transition> {
    let MessageEvent { bot, msg } = &*ctx.event;
    let chat_id = msg.chat.id;

    let Some(age) = msg.text().and_then(parse_age) else {
        bot.send_message(chat_id, "Please send your age as a number.")
            .await?;
        return Ok(Transition::Stay);
    };

    let text = send_typing(bot, chat_id, async {
        let mut data = ctx.data().await?;
        data.insert("age".to_string(), json!(age));
        ctx.set_data(data.clone()).await?;

        let bucket = ctx.bucket().await?;
        let completed = bucket.get(COMPLETED).and_then(Value::as_u64).unwrap_or(0) + 1;
        let overrides = Bag::from_iter([(COMPLETED.to_string(), json!(completed))]);
        ctx.storage()
            .update_bucket(ctx.address, Some(bucket), overrides)
            .await?;

        let name = data.get("name").and_then(Value::as_str).unwrap_or("stranger");
        anyhow::Ok(summary(name, age, completed))
    })
    .await?;

    let options = SendOptions::default().reply_to(msg.id);
    send_large_message_with(bot, chat_id, &text, MAX_MESSAGE_LENGTH, options).await?;

    let keyboard = inline_keyboard([vec![InlineButtonSource::callback("Start over", RESTART)]])?;
    bot.send_message(chat_id, "Thanks! Want to go again?")
        .reply_markup(keyboard)
        .await?;

    ctx.storage().reset_data(ctx.address).await?;
    Ok(Transition::Reset)
}

async fn cancel(ctx: StateContext<MessageEvent>) -> anyhow::Result<()> {
    let MessageEvent { bot, msg } = &*ctx.event;
    ctx.finish().await?;

    bot.send_message(msg.chat.id, "Cancelled. Send /start to begin again.")
        .await?;
    Ok(())
}

async fn help(ctx: StateContext<MessageEvent>) -> anyhow::Result<()> {
    let MessageEvent { bot, msg } = &*ctx.event;

    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn restart(ctx: StateContext<CallbackEvent>) -> anyhow::Result<Transition> {
    let CallbackEvent { bot, query } = &*ctx.event;
    bot.answer_callback_query(query.id.clone()).await?;
    ctx.finish().await?;

    bot.send_message(ChatId(ctx.address.chat_id), "What is your name?")
        .await?;

    Ok(Transition::to_handler(ask_name))
}

async fn apologize(ctx: ErrorContext<MessageEvent>) -> anyhow::Result<bool> {
    let MessageEvent { bot, msg } = &*ctx.event;

    bot.send_message(msg.chat.id, "Something went wrong, please try again later.")
        .await?;

    // Still report the failure.
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start", "demo_bot"), Some(Command::Start));
        assert_eq!(parse_command("/cancel@demo_bot", "demo_bot"), Some(Command::Cancel));
        assert_eq!(parse_command("/cancel@other_bot", "demo_bot"), None);
        assert_eq!(parse_command("Ann", "demo_bot"), None);
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age(" 42 "), Some(42));
        assert_eq!(parse_age("0"), None);
        assert_eq!(parse_age("300"), None);
        assert_eq!(parse_age("forty"), None);
    }

    #[test]
    fn test_summary() {
        let text = summary("Ann", 30, 2);
        assert!(text.contains("Name: Ann"));
        assert!(text.contains("Age: 30"));
        assert!(text.ends_with("completed: 2"));
    }

    #[test]
    fn test_handler_states_follow_function_paths() {
        let Transition::To(label) = Transition::to_handler(ask_name) else {
            panic!("expected a state label");
        };
        assert!(label.ends_with("questionnaire::ask_name"), "{}", label);
    }
}
