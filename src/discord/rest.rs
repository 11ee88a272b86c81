use crate::error::PlatformError;
use crate::platform::{Command, CommandInvocation, Platform, RelayEndpoint, RelayPost};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Interaction callback type: reply with a channel message.
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

#[derive(Debug, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct Application {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct ExecuteWebhookRequest<'a> {
    content: &'a str,
    username: &'a str,
    avatar_url: &'a str,
    allowed_mentions: serde_json::Value,
}

/// Discord REST API v10 client authenticated as the bot.
#[derive(Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl DiscordRest {
    /// Every request is bounded by `timeout`, so a stalled call only holds
    /// up the event that made it.
    pub fn new(
        api_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The bot's own user, used to drop self-authored messages.
    pub async fn current_user(&self) -> Result<CurrentUser, PlatformError> {
        let request = self.authed(self.http.get(self.url("/users/@me")));
        parse_json(request.send().await?).await
    }

    pub async fn application_id(&self) -> Result<String, PlatformError> {
        let request = self.authed(self.http.get(self.url("/oauth2/applications/@me")));
        let application: Application = parse_json(request.send().await?).await?;
        Ok(application.id)
    }

    /// Replace the application's global slash commands with `listen` and
    /// `ignore`. Global commands can take a while to propagate.
    pub async fn register_commands(&self, application_id: &str) -> Result<(), PlatformError> {
        let commands: Vec<_> = Command::ALL
            .iter()
            .map(|c| {
                json!({
                    "name": c.name(),
                    "description": c.description(),
                    "type": 1
                })
            })
            .collect();

        let request = self
            .authed(
                self.http
                    .put(self.url(&format!("/applications/{}/commands", application_id))),
            )
            .json(&commands);
        check_status(request.send().await?).await
    }

    /// WebSocket URL for the gateway, with version and encoding selected.
    pub async fn gateway_url(&self) -> Result<String, PlatformError> {
        let request = self.authed(self.http.get(self.url("/gateway")));
        let gateway: GatewayResponse = parse_json(request.send().await?).await?;

        let url = gateway.url.trim();
        if url.is_empty() {
            return Err(PlatformError::Decode(
                "gateway response missing URL".to_string(),
            ));
        }
        Ok(format!("{}/?v=10&encoding=json", url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }
}

#[async_trait]
impl Platform for DiscordRest {
    async fn list_endpoints(&self, channel_id: &str) -> Result<Vec<RelayEndpoint>, PlatformError> {
        let request = self.authed(
            self.http
                .get(self.url(&format!("/channels/{}/webhooks", channel_id))),
        );
        parse_json(request.send().await?).await
    }

    async fn create_endpoint(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<RelayEndpoint, PlatformError> {
        let request = self
            .authed(
                self.http
                    .post(self.url(&format!("/channels/{}/webhooks", channel_id))),
            )
            .json(&json!({ "name": name }));
        parse_json(request.send().await?).await
    }

    async fn post_via_endpoint(
        &self,
        endpoint: &RelayEndpoint,
        post: &RelayPost,
    ) -> Result<(), PlatformError> {
        let token = endpoint.token.as_deref().ok_or_else(|| {
            PlatformError::Decode(format!("webhook {} has no token", endpoint.id))
        })?;

        // Translated text must not ping anyone a second time.
        let body = ExecuteWebhookRequest {
            content: &post.content,
            username: &post.username,
            avatar_url: &post.avatar_url,
            allowed_mentions: json!({ "parse": [] }),
        };

        let request = self
            .http
            .post(self.url(&format!("/webhooks/{}/{}", endpoint.id, token)))
            .query(&[("wait", "true")])
            .json(&body);
        check_status(request.send().await?).await
    }

    async fn reply_to_command(
        &self,
        invocation: &CommandInvocation,
        content: &str,
    ) -> Result<(), PlatformError> {
        let request = self
            .http
            .post(self.url(&format!(
                "/interactions/{}/{}/callback",
                invocation.interaction_id, invocation.interaction_token
            )))
            .json(&json!({
                "type": CHANNEL_MESSAGE_WITH_SOURCE,
                "data": { "content": content }
            }));
        check_status(request.send().await?).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), PlatformError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
}
