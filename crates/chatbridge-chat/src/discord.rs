//! Discord implementation of [`ChatAdapter`], talking to the Discord REST
//! API directly over `reqwest` (bot token auth, JSON bodies).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{ChatAdapter, MessageRef, Reaction, StatusEmoji};
use crate::error::{Error, Result};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

pub struct DiscordAdapter {
    http: reqwest::Client,
    bot_token: String,
    bot_user_id: String,
}

#[derive(Deserialize)]
struct DiscordMessage {
    id: String,
    channel_id: String,
}

#[derive(Deserialize)]
struct DiscordChannel {
    id: String,
}

#[derive(Deserialize)]
struct DiscordUser {
    id: String,
}

impl DiscordAdapter {
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

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.bot_token))
    }

    async fn check_ok(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api(format!("discord {context} failed ({status}): {body}")))
        }
    }
}

/// Discord reaction emoji must be percent-encoded in the URL path; the
/// built-in emoji glyphs this bot uses are all multi-byte UTF-8.
fn percent_encode_emoji(emoji: &str) -> String {
    let mut out = String::with_capacity(emoji.len() * 3);
    for byte in emoji.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl ChatAdapter for DiscordAdapter {
    async fn post_message(
        &self,
        channel: &str,
        thread_key: Option<&str>,
        text: &str,
    ) -> Result<MessageRef> {
        // A Discord "thread reply" is just a message posted into the thread
        // channel itself — thread_key, when present, IS the channel to post
        // into (§9 open-question resolution: thread_id is the thread's own
        // channel id).
        let target_channel = thread_key.unwrap_or(channel);
        let response = self
            .authorize(
                self.http
                    .post(format!("{DISCORD_API_BASE}/channels/{target_channel}/messages")),
            )
            .json(&json!({ "content": text }))
            .send()
            .await?;
        let response = Self::check_ok(response, "post message").await?;
        let message: DiscordMessage = response.json().await?;
        Ok(MessageRef {
            channel_id: message.channel_id,
            message_key: message.id,
        })
    }

    async fn add_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()> {
        let encoded = percent_encode_emoji(emoji.discord_glyph());
        let response = self
            .authorize(self.http.put(format!(
                "{DISCORD_API_BASE}/channels/{channel}/messages/{message_key}/reactions/{encoded}/@me"
            )))
            .send()
            .await?;
        Self::check_ok(response, "add reaction").await?;
        Ok(())
    }

    async fn remove_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()> {
        let encoded = percent_encode_emoji(emoji.discord_glyph());
        let response = self
            .authorize(self.http.delete(format!(
                "{DISCORD_API_BASE}/channels/{channel}/messages/{message_key}/reactions/{encoded}/@me"
            )))
            .send()
            .await?;
        Self::check_ok(response, "remove reaction").await?;
        Ok(())
    }

    async fn get_reactions(&self, channel: &str, message_key: &str) -> Result<Vec<Reaction>> {
        // Discord's message-get response carries the reaction summary
        // (name + count) but not the reacting user IDs without a separate
        // per-emoji call; the orchestrator only needs to know which of the
        // bot's own reactions are present, so the bot's own id stands in
        // for a full user list here.
        #[derive(Deserialize)]
        struct MessageWithReactions {
            #[serde(default)]
            reactions: Vec<ReactionSummary>,
        }
        #[derive(Deserialize)]
        struct ReactionSummary {
            emoji: EmojiName,
            me: bool,
        }
        #[derive(Deserialize)]
        struct EmojiName {
            name: Option<String>,
        }

        let response = self
            .authorize(
                self.http
                    .get(format!("{DISCORD_API_BASE}/channels/{channel}/messages/{message_key}")),
            )
            .send()
            .await?;
        let response = Self::check_ok(response, "get message").await?;
        let message: MessageWithReactions = response.json().await?;
        Ok(message
            .reactions
            .into_iter()
            .filter(|r| r.me)
            .filter_map(|r| r.emoji.name)
            .map(|name| Reaction { name, user_ids: vec![self.bot_user_id.clone()] })
            .collect())
    }

    async fn create_thread(&self, channel: &str, message_key: &str, name: &str) -> Result<String> {
        let response = self
            .authorize(self.http.post(format!(
                "{DISCORD_API_BASE}/channels/{channel}/messages/{message_key}/threads"
            )))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let response = Self::check_ok(response, "create thread").await?;
        let thread: DiscordChannel = response.json().await?;
        Ok(thread.id)
    }

    async fn permalink(&self, channel: &str, message_key: &str) -> Result<String> {
        // Discord has no permalink API call; the URL is a fixed shape once
        // the channel's guild is known. The guild id is out of scope for
        // this adapter's constructor, so callers that need a fully
        // qualified link should compose it from the integration's
        // workspace_id (the guild id) themselves; this returns the
        // channel-relative form.
        Ok(format!("discord://channels/{channel}/{message_key}"))
    }

    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }
}

/// Looks up the bot's own user id via `/users/@me`, used once at startup so
/// `DiscordAdapter::new` doesn't need it passed in out-of-band.
pub async fn fetch_bot_user_id(http: &reqwest::Client, bot_token: &str) -> Result<String> {
    let response = http
        .get(format!("{DISCORD_API_BASE}/users/@me"))
        .header("Authorization", format!("Bot {bot_token}"))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(Error::Api(format!(
            "discord get self failed: {}",
            response.status()
        )));
    }
    let user: DiscordUser = response.json().await?;
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encodes_multibyte_emoji() {
        let encoded = percent_encode_emoji("⌛");
        assert!(encoded.starts_with('%'));
        assert!(!encoded.contains('⌛'));
    }

    #[test]
    fn percent_encode_leaves_ascii_alone() {
        assert_eq!(percent_encode_emoji("x"), "x");
    }
}
