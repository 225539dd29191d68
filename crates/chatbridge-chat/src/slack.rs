//! Slack implementation of [`ChatAdapter`], talking to the Slack Web API
//! directly over `reqwest` (bot token auth, JSON request/response bodies).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{ChatAdapter, MessageRef, Reaction, StatusEmoji};
use crate::error::{Error, Result};

const SLACK_API_BASE: &str = "https://slack.com/api";

pub struct SlackAdapter {
    http: reqwest::Client,
    bot_token: String,
    bot_user_id: String,
}

#[derive(Deserialize)]
struct SlackEnvelope {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    message: Option<SlackMessageReactions>,
}

#[derive(Deserialize)]
struct SlackMessageReactions {
    #[serde(default)]
    reactions: Vec<SlackReaction>,
}

#[derive(Deserialize)]
struct SlackReaction {
    name: String,
    #[serde(default)]
    users: Vec<String>,
}

impl SlackAdapter {
    pub fn new(bot_token: impl Into<String>, bot_user_id: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("chatbridge")
            .build()
            .map_err(Error::Request)?;
        Ok(Self {
            http,
            bot_token: bot_token.into(),
            bot_user_id: bot_user_id.into(),
        })
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<SlackEnvelope> {
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?
            .json::<SlackEnvelope>()
            .await?;
        if !response.ok {
            return Err(Error::Api(format!(
                "slack {method} failed: {}",
                response.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatAdapter for SlackAdapter {
    async fn post_message(
        &self,
        channel: &str,
        thread_key: Option<&str>,
        text: &str,
    ) -> Result<MessageRef> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(thread_ts) = thread_key {
            body["thread_ts"] = json!(thread_ts);
        }
        let response = self.call("chat.postMessage", body).await?;
        let ts = response
            .ts
            .ok_or_else(|| Error::Api("chat.postMessage response missing ts".into()))?;
        Ok(MessageRef {
            channel_id: response.channel.unwrap_or_else(|| channel.to_string()),
            message_key: ts,
        })
    }

    async fn add_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()> {
        self.call(
            "reactions.add",
            json!({ "channel": channel, "timestamp": message_key, "name": emoji.slack_name() }),
        )
        .await?;
        Ok(())
    }

    async fn remove_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()> {
        self.call(
            "reactions.remove",
            json!({ "channel": channel, "timestamp": message_key, "name": emoji.slack_name() }),
        )
        .await?;
        Ok(())
    }

    async fn get_reactions(&self, channel: &str, message_key: &str) -> Result<Vec<Reaction>> {
        let response = self
            .call(
                "reactions.get",
                json!({ "channel": channel, "timestamp": message_key }),
            )
            .await?;
        Ok(response
            .message
            .map(|m| {
                m.reactions
                    .into_iter()
                    .map(|r| Reaction { name: r.name, user_ids: r.users })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_mentions(&self, text: &str) -> Result<String> {
        // Slack already delivers mention text as `<@U123>`; a full
        // implementation would batch-resolve user IDs to display names via
        // `users.info`. Out of scope here (resolveMentions is a Non-goal);
        // pass through unchanged.
        Ok(text.to_string())
    }

    async fn permalink(&self, channel: &str, message_key: &str) -> Result<String> {
        let response = self
            .call(
                "chat.getPermalink",
                json!({ "channel": channel, "message_ts": message_key }),
            )
            .await?;
        response
            .permalink
            .ok_or_else(|| Error::Api("chat.getPermalink response missing permalink".into()))
    }

    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }
}

/// Looks up the bot's own user id via `auth.test`, used once at startup so
/// `SlackAdapter::new` doesn't need it passed in out-of-band.
pub async fn fetch_bot_user_id(http: &reqwest::Client, bot_token: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct AuthTest {
        ok: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
    }

    let response: AuthTest = http
        .post(format!("{SLACK_API_BASE}/auth.test"))
        .bearer_auth(bot_token)
        .send()
        .await?
        .json()
        .await?;
    if !response.ok {
        return Err(Error::Api(format!(
            "slack auth.test failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        )));
    }
    response
        .user_id
        .ok_or_else(|| Error::Api("auth.test response missing user_id".into()))
}
