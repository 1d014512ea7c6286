//! Outbound helpers: chunked sending and chat action heartbeats.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Request;
use teloxide::types::{ChatAction, LinkPreviewOptions, MessageId, ReplyParameters};
use tracing::{debug, warn};

/// Telegram's limit on the length of one text message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// How often the chat action is repeated. Telegram clears it after ~5s.
pub const DEFAULT_ACTION_INTERVAL: Duration = Duration::from_secs(5);

/// Delivery options applied to every message [`send_large_message_with`]
/// sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub disable_link_preview: bool,
    pub disable_notification: bool,
    pub reply_to: Option<MessageId>,
}

impl SendOptions {
    #[must_use]
    pub fn disable_link_preview(mut self, disable: bool) -> Self {
        self.disable_link_preview = disable;
        self
    }

    #[must_use]
    pub fn disable_notification(mut self, disable: bool) -> Self {
        self.disable_notification = disable;
        self
    }

    /// Send as a reply to `message_id`.
    #[must_use]
    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// The two calls these helpers need from a bot client.
#[async_trait]
pub trait Outbound: Send + Sync {
    type Sent: Send;
    type Err: std::error::Error + Send;

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        options: SendOptions,
    ) -> Result<Self::Sent, Self::Err>;

    async fn send_action(&self, chat_id: ChatId, action: ChatAction) -> Result<(), Self::Err>;
}

#[async_trait]
impl<R> Outbound for R
where
    R: Requester + Send + Sync,
    R::SendMessage: Send,
    <R::SendMessage as Request>::Send: Send,
    R::SendChatAction: Send,
    <R::SendChatAction as Request>::Send: Send,
{
    type Sent = Message;
    type Err = R::Err;

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        options: SendOptions,
    ) -> Result<Message, R::Err> {
        let mut request = self
            .send_message(chat_id, text)
            .disable_notification(options.disable_notification);
        if options.disable_link_preview {
            request = request.link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            });
        }
        if let Some(message_id) = options.reply_to {
            request = request.reply_parameters(ReplyParameters::new(message_id));
        }
        request.send().await
    }

    async fn send_action(&self, chat_id: ChatId, action: ChatAction) -> Result<(), R::Err> {
        self.send_chat_action(chat_id, action).send().await?;
        Ok(())
    }
}

/// Split `text` into consecutive pieces of at most `max_length` chars.
///
/// Splits may fall mid-word. Empty text or a zero `max_length` yields no
/// pieces.
pub fn split_chunks(text: &str, max_length: usize) -> Vec<&str> {
    if max_length == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_length)
            .map_or(rest.len(), |(idx, _)| idx);
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// Send `text` as consecutive messages of at most `max_length` chars.
///
/// Returns the sent messages in order. Stops at the first failed send;
/// chunks sent before it stay sent. Text is sent without parse mode, as
/// a split could break markup.
pub async fn send_large_message<O>(
    out: &O,
    chat_id: ChatId,
    text: &str,
    max_length: usize,
) -> Result<Vec<O::Sent>, O::Err>
where
    O: Outbound + ?Sized,
{
    send_large_message_with(out, chat_id, text, max_length, SendOptions::default()).await
}

/// [`send_large_message`] applying `options` to every chunk.
pub async fn send_large_message_with<O>(
    out: &O,
    chat_id: ChatId,
    text: &str,
    max_length: usize,
    options: SendOptions,
) -> Result<Vec<O::Sent>, O::Err>
where
    O: Outbound + ?Sized,
{
    let chunks = split_chunks(text, max_length);
    debug!("Sending {} chars to {} in {} messages", text.chars().count(), chat_id, chunks.len());

    let mut sent = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        sent.push(out.send_text(chat_id, chunk.to_string(), options).await?);
    }
    Ok(sent)
}

/// Run `operation` while showing `action` in the chat.
///
/// The operation is polled first: one that finishes without waiting never
/// triggers the action. Otherwise the action is sent right away and then
/// every `interval` until the operation finishes. A failed action send is
/// logged and ends the heartbeat; the operation keeps running.
pub async fn send_with_action<O, F>(
    out: &O,
    chat_id: ChatId,
    operation: F,
    action: ChatAction,
    interval: Duration,
) -> F::Output
where
    O: Outbound + ?Sized,
    F: Future,
{
    let heartbeat = async {
        loop {
            if let Err(e) = out.send_action(chat_id, action).await {
                warn!("Failed to send chat action to {}: {}", chat_id, e);
                return;
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::pin!(operation);
    tokio::select! {
        biased;
        output = &mut operation => output,
        () = heartbeat => operation.await,
    }
}

/// [`send_with_action`] with the typing action and default interval.
pub async fn send_typing<O, F>(out: &O, chat_id: ChatId, operation: F) -> F::Output
where
    O: Outbound + ?Sized,
    F: Future,
{
    send_with_action(out, chat_id, operation, ChatAction::Typing, DEFAULT_ACTION_INTERVAL).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("mock failure")]
    struct MockError;

    #[derive(Default)]
    struct MockBot {
        texts: Mutex<Vec<String>>,
        options: Mutex<Vec<SendOptions>>,
        actions: AtomicUsize,
        fail_actions: bool,
    }

    #[async_trait]
    impl Outbound for MockBot {
        type Sent = usize;
        type Err = MockError;

        async fn send_text(
            &self,
            _chat_id: ChatId,
            text: String,
            options: SendOptions,
        ) -> Result<usize, MockError> {
            let len = text.chars().count();
            self.texts.lock().unwrap().push(text);
            self.options.lock().unwrap().push(options);
            Ok(len)
        }

        async fn send_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<(), MockError> {
            self.actions.fetch_add(1, Ordering::SeqCst);
            if self.fail_actions { Err(MockError) } else { Ok(()) }
        }
    }

    const CHAT: ChatId = ChatId(1);

    #[test]
    fn test_split_chunks() {
        assert_eq!(split_chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(split_chunks("abc", 3), vec!["abc"]);
        assert!(split_chunks("", 3).is_empty());
        assert!(split_chunks("abc", 0).is_empty());
    }

    #[test]
    fn test_split_chunks_counts_chars_not_bytes() {
        let chunks = split_chunks("привет мир", 4);
        assert_eq!(chunks, vec!["прив", "ет м", "ир"]);
    }

    #[tokio::test]
    async fn test_large_message_is_split_in_order() {
        let bot = MockBot::default();
        let text: String = ('a'..='z').cycle().take(10_000).collect();

        let sent = send_large_message(&bot, CHAT, &text, MAX_MESSAGE_LENGTH).await.unwrap();

        assert_eq!(sent, vec![4096, 4096, 1808]);
        assert_eq!(bot.texts.lock().unwrap().concat(), text);
    }

    #[tokio::test]
    async fn test_options_apply_to_every_chunk() {
        let bot = MockBot::default();
        let options = SendOptions::default()
            .disable_notification(true)
            .disable_link_preview(true)
            .reply_to(MessageId(77));

        let sent = send_large_message_with(&bot, CHAT, "abcdefg", 3, options).await.unwrap();

        assert_eq!(sent, vec![3, 3, 1]);
        assert_eq!(*bot.options.lock().unwrap(), vec![options; 3]);
    }

    #[tokio::test]
    async fn test_plain_send_uses_default_options() {
        let bot = MockBot::default();

        send_large_message(&bot, CHAT, "abc", MAX_MESSAGE_LENGTH).await.unwrap();

        assert_eq!(*bot.options.lock().unwrap(), vec![SendOptions::default()]);
    }

    #[tokio::test]
    async fn test_empty_text_sends_nothing() {
        let bot = MockBot::default();

        let sent = send_large_message(&bot, CHAT, "", MAX_MESSAGE_LENGTH).await.unwrap();

        assert!(sent.is_empty());
        assert!(bot.texts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_operation_sends_at_most_one_action() {
        let bot = MockBot::default();

        let result = send_typing(&bot, CHAT, async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            42
        })
        .await;

        assert_eq!(result, 42);
        assert_eq!(bot.actions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_operation_sends_no_action() {
        let bot = MockBot::default();

        let result = send_typing(&bot, CHAT, async { "done" }).await;

        assert_eq!(result, "done");
        assert_eq!(bot.actions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_repeats_while_operation_runs() {
        let bot = MockBot::default();

        send_with_action(
            &bot,
            CHAT,
            tokio::time::sleep(Duration::from_secs(12)),
            ChatAction::UploadDocument,
            Duration::from_secs(5),
        )
        .await;

        // Sent at 0s, 5s and 10s.
        assert_eq!(bot.actions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_propagates() {
        let bot = MockBot::default();

        let result: Result<(), &str> = send_typing(&bot, CHAT, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err("failed")
        })
        .await;

        assert_eq!(result, Err("failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_does_not_abort_operation() {
        let bot = MockBot { fail_actions: true, ..Default::default() };

        let result = send_typing(&bot, CHAT, async {
            tokio::time::sleep(Duration::from_secs(11)).await;
            7
        })
        .await;

        assert_eq!(result, 7);
        assert_eq!(bot.actions.load(Ordering::SeqCst), 1);
    }
}
