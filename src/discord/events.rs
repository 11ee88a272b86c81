//! Gateway dispatch payloads and their conversion into relay inputs.

use crate::platform::{Author, Command, CommandInvocation, IncomingMessage};
use serde::Deserialize;
use serde_json::Value;

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// Interaction type for slash commands.
const APPLICATION_COMMAND: u8 = 2;

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Avatar image URL, falling back to the default avatar for users
    /// without a custom one.
    pub fn avatar_url(&self) -> String {
        match self.avatar.as_deref() {
            Some(hash) if !hash.is_empty() => {
                let ext = if hash.starts_with("a_") { "gif" } else { "png" };
                format!("{}/avatars/{}/{}.{}", CDN_BASE, self.id, hash, ext)
            }
            _ => format!(
                "{}/embed/avatars/{}.png",
                CDN_BASE,
                self.default_avatar_index()
            ),
        }
    }

    fn default_avatar_index(&self) -> u64 {
        match self.discriminator.as_deref() {
            // Legacy username#1234 accounts
            Some(d) if d != "0" => d.parse::<u64>().map(|n| n % 5).unwrap_or(0),
            _ => self.id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    channel_id: String,
    #[serde(default)]
    content: String,
    author: User,
    #[serde(default)]
    webhook_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractionCreate {
    id: String,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
struct InteractionData {
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct Ready {
    pub user: User,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Parse a `MESSAGE_CREATE` payload. Webhook posts count as bot-authored.
pub fn parse_message_create(data: &Value) -> Option<IncomingMessage> {
    let msg: MessageCreate = serde_json::from_value(data.clone()).ok()?;
    let avatar_url = msg.author.avatar_url();

    Some(IncomingMessage {
        author: Author {
            bot: msg.author.bot || msg.webhook_id.is_some(),
            avatar_url,
            id: msg.author.id,
            name: msg.author.username,
        },
        channel_id: msg.channel_id,
        content: msg.content,
    })
}

/// Parse an `INTERACTION_CREATE` payload, keeping only `listen` / `ignore`
/// slash commands issued in a channel.
pub fn parse_interaction_create(data: &Value) -> Option<CommandInvocation> {
    let interaction: InteractionCreate = serde_json::from_value(data.clone()).ok()?;
    if interaction.kind != APPLICATION_COMMAND {
        return None;
    }

    let command = Command::from_name(&interaction.data?.name)?;
    Some(CommandInvocation {
        command,
        channel_id: interaction.channel_id?,
        interaction_id: interaction.id,
        interaction_token: interaction.token,
    })
}

pub fn parse_ready(data: &Value) -> Option<Ready> {
    serde_json::from_value(data.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, discriminator: &str, avatar: Option<&str>) -> User {
        User {
            id: id.to_string(),
            username: "maria".to_string(),
            discriminator: Some(discriminator.to_string()),
            avatar: avatar.map(|a| a.to_string()),
            bot: false,
        }
    }

    // ==================== Avatar Tests ====================

    #[test]
    fn test_avatar_url_static() {
        let u = user("80351110224678912", "0", Some("8342729096ea3675442027381ff50dfe"));
        assert_eq!(
            u.avatar_url(),
            "https://cdn.discordapp.com/avatars/80351110224678912/8342729096ea3675442027381ff50dfe.png"
        );
    }

    #[test]
    fn test_avatar_url_animated() {
        let u = user("80351110224678912", "0", Some("a_1269e74af4df7417b13759eae50c83dc"));
        assert!(u.avatar_url().ends_with("a_1269e74af4df7417b13759eae50c83dc.gif"));
    }

    #[test]
    fn test_default_avatar_new_username() {
        // (80351110224678912 >> 22) % 6 == 5
        let u = user("80351110224678912", "0", None);
        assert_eq!(
            u.avatar_url(),
            "https://cdn.discordapp.com/embed/avatars/5.png"
        );
    }

    #[test]
    fn test_default_avatar_legacy_discriminator() {
        let u = user("80351110224678912", "1337", None);
        assert_eq!(
            u.avatar_url(),
            "https://cdn.discordapp.com/embed/avatars/2.png"
        );
    }

    #[test]
    fn test_default_avatar_empty_hash() {
        let u = user("80351110224678912", "0", Some(""));
        assert!(u.avatar_url().contains("/embed/avatars/"));
    }

    // ==================== MESSAGE_CREATE Tests ====================

    #[test]
    fn test_parse_message_create() {
        let data = json!({
            "id": "1000",
            "channel_id": "C1",
            "guild_id": "G1",
            "content": "Hola",
            "author": {
                "id": "80351110224678912",
                "username": "maria",
                "discriminator": "0",
                "avatar": "abc123"
            }
        });

        let message = parse_message_create(&data).expect("Should parse");
        assert_eq!(message.channel_id, "C1");
        assert_eq!(message.content, "Hola");
        assert_eq!(message.author.id, "80351110224678912");
        assert_eq!(message.author.name, "maria");
        assert!(!message.author.bot);
        assert!(message.author.avatar_url.ends_with("/abc123.png"));
    }

    #[test]
    fn test_parse_message_create_bot_author() {
        let data = json!({
            "channel_id": "C1",
            "content": "beep",
            "author": { "id": "1", "username": "robot", "bot": true }
        });

        let message = parse_message_create(&data).expect("Should parse");
        assert!(message.author.bot);
    }

    #[test]
    fn test_parse_message_create_webhook_is_bot() {
        let data = json!({
            "channel_id": "C1",
            "content": "Hello",
            "webhook_id": "wh-1",
            "author": { "id": "wh-1", "username": "maria (Translated)" }
        });

        let message = parse_message_create(&data).expect("Should parse");
        assert!(message.author.bot);
    }

    #[test]
    fn test_parse_message_create_without_content() {
        let data = json!({
            "channel_id": "C1",
            "author": { "id": "1", "username": "maria" }
        });

        let message = parse_message_create(&data).expect("Should parse");
        assert!(message.content.is_empty());
    }

    #[test]
    fn test_parse_message_create_malformed() {
        assert!(parse_message_create(&json!({ "content": "no author" })).is_none());
    }

    // ==================== INTERACTION_CREATE Tests ====================

    fn interaction(kind: u8, name: &str) -> Value {
        json!({
            "id": "I1",
            "application_id": "A1",
            "type": kind,
            "token": "interaction-token",
            "channel_id": "C3",
            "data": { "id": "cmd-1", "name": name, "type": 1 }
        })
    }

    #[test]
    fn test_parse_interaction_listen() {
        let invocation =
            parse_interaction_create(&interaction(2, "listen")).expect("Should parse");
        assert_eq!(invocation.command, Command::Listen);
        assert_eq!(invocation.channel_id, "C3");
        assert_eq!(invocation.interaction_id, "I1");
        assert_eq!(invocation.interaction_token, "interaction-token");
    }

    #[test]
    fn test_parse_interaction_ignore() {
        let invocation =
            parse_interaction_create(&interaction(2, "ignore")).expect("Should parse");
        assert_eq!(invocation.command, Command::Ignore);
    }

    #[test]
    fn test_parse_interaction_unknown_command() {
        assert!(parse_interaction_create(&interaction(2, "status")).is_none());
    }

    #[test]
    fn test_parse_interaction_non_command_type() {
        // Type 3 is a message component interaction
        assert!(parse_interaction_create(&interaction(3, "listen")).is_none());
    }

    #[test]
    fn test_parse_interaction_without_channel() {
        let mut data = interaction(2, "listen");
        if let Some(map) = data.as_object_mut() {
            map.remove("channel_id");
        }
        assert!(parse_interaction_create(&data).is_none());
    }

    // ==================== READY Tests ====================

    #[test]
    fn test_parse_ready() {
        let data = json!({
            "v": 10,
            "user": { "id": "B1", "username": "DumTranslator", "bot": true },
            "session_id": "abc",
            "guilds": []
        });

        let ready = parse_ready(&data).expect("Should parse");
        assert_eq!(ready.user.id, "B1");
        assert!(ready.user.bot);
        assert_eq!(ready.session_id.as_deref(), Some("abc"));
    }
}
