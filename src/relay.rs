//! Message relay and channel control commands.
//!
//! Message path: self/bot filter, channel allow-list, language gate,
//! translation, webhook resolution, post. Each step either continues or ends
//! the message for good; nothing is retried.

use crate::endpoint::EndpointCache;
use crate::error::PersistError;
use crate::language::LanguageGate;
use crate::platform::{Command, CommandInvocation, IncomingMessage, Platform, RelayPost};
use crate::registry::ChannelRegistry;
use crate::translation::Translator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Appended to the author's name on relayed posts.
pub const TRANSLATED_SUFFIX: &str = " (Translated)";

pub const LISTEN_REPLY: &str = "DumTranslator is now listening to this channel.";
pub const IGNORE_REPLY: &str = "DumTranslator stopped listening to this channel.";

/// Discord limits for webhook posts.
const MAX_USERNAME_CHARS: usize = 80;
const MAX_CONTENT_CHARS: usize = 2000;

/// Where a message left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    SelfAuthored,
    BotAuthored,
    ChannelNotRelayed,
    EmptyContent,
    AlreadyTargetLanguage,
    TranslationFailed,
    EndpointFailed,
    PostFailed,
    Relayed,
}

pub struct Relay {
    bot_user_id: String,
    registry: Arc<ChannelRegistry>,
    gate: Arc<dyn LanguageGate>,
    translator: Arc<dyn Translator>,
    endpoints: EndpointCache,
    platform: Arc<dyn Platform>,
}

impl Relay {
    pub fn new(
        bot_user_id: impl Into<String>,
        registry: Arc<ChannelRegistry>,
        gate: Arc<dyn LanguageGate>,
        translator: Arc<dyn Translator>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            registry,
            gate,
            translator,
            endpoints: EndpointCache::new(Arc::clone(&platform)),
            platform,
        }
    }

    pub async fn handle_message(&self, message: &IncomingMessage) -> RelayOutcome {
        if message.author.id == self.bot_user_id {
            return RelayOutcome::SelfAuthored;
        }
        if message.author.bot {
            return RelayOutcome::BotAuthored;
        }
        if !self.registry.contains(&message.channel_id) {
            return RelayOutcome::ChannelNotRelayed;
        }
        if message.content.trim().is_empty() {
            return RelayOutcome::EmptyContent;
        }
        if self.gate.is_target_language(&message.content) {
            debug!(
                "Message in channel {} already in target language",
                message.channel_id
            );
            return RelayOutcome::AlreadyTargetLanguage;
        }

        let translated = match self.translator.translate(&message.content).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Translation error in channel {} (author {}): {}",
                    message.channel_id, message.author.id, e
                );
                return RelayOutcome::TranslationFailed;
            }
        };

        let endpoint = match self.endpoints.get_or_create(&message.channel_id).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(
                    "Webhook lookup failed for channel {}: {}",
                    message.channel_id, e
                );
                return RelayOutcome::EndpointFailed;
            }
        };

        let post = RelayPost {
            content: truncate_chars(&translated, MAX_CONTENT_CHARS),
            username: relay_username(&message.author.name),
            avatar_url: message.author.avatar_url.clone(),
        };

        match self.platform.post_via_endpoint(&endpoint, &post).await {
            Ok(()) => {
                debug!(
                    "Relayed translation for {} in channel {}",
                    message.author.id, message.channel_id
                );
                RelayOutcome::Relayed
            }
            Err(e) => {
                warn!(
                    "Webhook error in channel {} (webhook {}): {}",
                    message.channel_id, endpoint.id, e
                );
                if e.is_not_found() {
                    self.endpoints.invalidate(&message.channel_id).await;
                }
                RelayOutcome::PostFailed
            }
        }
    }

    /// Apply a control command and reply in the channel it came from.
    ///
    /// Returns the reply text. A failed reply is logged only.
    pub async fn handle_command(&self, invocation: &CommandInvocation) -> String {
        let channel_id = &invocation.channel_id;
        let command = invocation.command;

        // The registry writes to disk; keep that off the async workers.
        let registry = Arc::clone(&self.registry);
        let channel = channel_id.clone();
        let result = tokio::task::spawn_blocking(move || match command {
            Command::Listen => registry.add(&channel),
            Command::Ignore => registry.remove(&channel),
        })
        .await
        .unwrap_or_else(|e| Err(PersistError::from(e)));

        let reply = match result {
            Ok(()) => {
                info!("/{} applied to channel {}", command.name(), channel_id);
                match command {
                    Command::Listen => LISTEN_REPLY.to_string(),
                    Command::Ignore => {
                        self.endpoints.evict(channel_id);
                        IGNORE_REPLY.to_string()
                    }
                }
            }
            Err(e) => {
                warn!(
                    "/{} in channel {} failed to persist: {}",
                    invocation.command.name(),
                    channel_id,
                    e
                );
                format!("Error saving channel: {}", e)
            }
        };

        if let Err(e) = self.platform.reply_to_command(invocation, &reply).await {
            warn!("Failed to reply to /{}: {}", invocation.command.name(), e);
        }

        reply
    }
}

fn relay_username(author_name: &str) -> String {
    let budget = MAX_USERNAME_CHARS - TRANSLATED_SUFFIX.chars().count();
    format!("{}{}", truncate_chars(author_name, budget), TRANSLATED_SUFFIX)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
