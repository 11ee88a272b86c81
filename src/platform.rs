//! Types exchanged with the chat platform and the outbound calls the relay
//! makes against it.

use crate::error::PlatformError;
use async_trait::async_trait;
use serde::Deserialize;

/// Author identity as shown on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub author: Author,
    pub channel_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Listen,
    Ignore,
}

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "listen" => Some(Command::Listen),
            "ignore" => Some(Command::Ignore),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Listen => "listen",
            Command::Ignore => "ignore",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Listen => "Start translating messages in this channel",
            Command::Ignore => "Stop translating messages in this channel",
        }
    }

    pub const ALL: [Command; 2] = [Command::Listen, Command::Ignore];
}

/// A slash command issued in a channel. The interaction id and token are
/// what the platform needs to accept a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: Command,
    pub channel_id: String,
    pub interaction_id: String,
    pub interaction_token: String,
}

/// A channel webhook the relay posts through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayEndpoint {
    pub id: String,
    /// Absent on webhooks the bot cannot execute (e.g. channel follower webhooks).
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Null on some webhook kinds; never used to route posts.
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// A post made through a relay endpoint with an overridden identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPost {
    pub content: String,
    pub username: String,
    pub avatar_url: String,
}

#[async_trait]
pub trait Platform: Send + Sync {
    async fn list_endpoints(&self, channel_id: &str) -> Result<Vec<RelayEndpoint>, PlatformError>;

    async fn create_endpoint(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<RelayEndpoint, PlatformError>;

    async fn post_via_endpoint(
        &self,
        endpoint: &RelayEndpoint,
        post: &RelayPost,
    ) -> Result<(), PlatformError>;

    async fn reply_to_command(
        &self,
        invocation: &CommandInvocation,
        content: &str,
    ) -> Result<(), PlatformError>;
}
