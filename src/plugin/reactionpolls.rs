//! Polls voted on with reactions.
//!
//! The bot seeds the poll message with one reaction per option, so every tally is one higher than
//! the number of votes.  Reactions outside the options, and votes beyond a poll's limit, are
//! removed again as they come in.

use crate::{
    discord::Embed,
    error::CommandError,
    helper::split_args,
    i18n::get_text,
    log_internal,
    permissions::{require_bot_admin, require_module, Module},
    plugin::*,
    store::TypedStore,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;

const COLLECTION: &str = "reaction_polls";
const MAX_EMOTES: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ReactionPoll {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    message_id: MessageId,
    text: String,
    max_votes: u32,
    allowed_emotes: Vec<String>,
    created_by: UserId,
    created_by_name: String,
    created_at: DateTime<Utc>,
}

/// API name of an emote as typed in a message: `<:blob:123>` becomes `blob:123`
fn emote_name(typed: &str) -> String {
    typed
        .strip_prefix("<a:")
        .or_else(|| typed.strip_prefix("<:"))
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(typed)
        .to_owned()
}

fn emote_display(name: &str) -> String {
    if name.contains(':') {
        format!("<:{}>", name)
    } else {
        name.to_owned()
    }
}

fn poll_embed(poll: &ReactionPoll, votes: &[(String, u64)]) -> Embed {
    let total: u64 = votes.iter().map(|(_, n)| n).sum();
    let tally: Vec<String> = votes
        .iter()
        .map(|(emote, n)| format!("{} **{}**", emote_display(emote), n))
        .collect();

    Embed::new()
        .description(format!("{}\n\n{}", poll.text, tally.join("\n")))
        .footer(format!(
            "Created By {} | Total Votes {} | Poll ID {}",
            poll.created_by_name,
            total,
            poll.id.as_deref().unwrap_or("-")
        ))
}

pub struct PluginReactionPolls {
    cache: RwLock<HashMap<MessageId, ReactionPoll>>,
}

impl PluginReactionPolls {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn reload(&self, ctx: &Context) -> Result<usize> {
        let polls: Vec<ReactionPoll> = ctx.store.find_all_as(COLLECTION, &json!({})).await?;
        let count = polls.len();
        *self.cache.write().await = polls.into_iter().map(|p| (p.message_id, p)).collect();
        Ok(count)
    }

    async fn create(&self, ctx: &Context, inv: &Invocation, args: &[String]) -> Result<()> {
        let [text, max_votes, emotes @ ..] = args else {
            return Err(CommandError::TooFewArguments.into());
        };
        if emotes.is_empty() {
            return Err(CommandError::TooFewArguments.into());
        }
        let max_votes: u32 = max_votes
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or(CommandError::InvalidArguments)?;
        if emotes.len() > MAX_EMOTES {
            ctx.reply(
                &inv.msg,
                &get_text("plugins.reactionpolls.create-too-many-reactions"),
            )
            .await?;
            return Ok(());
        }

        let mut allowed_emotes: Vec<String> = Vec::with_capacity(emotes.len());
        for emote in emotes.iter().map(|e| emote_name(e)) {
            if !allowed_emotes.contains(&emote) {
                allowed_emotes.push(emote);
            }
        }

        let message_id = ctx
            .reply(&inv.msg, &get_text("plugins.reactionpolls.creating"))
            .await?;
        let mut poll = ReactionPoll {
            id: None,
            guild_id: inv.msg.guild_id,
            channel_id: inv.msg.channel_id,
            message_id,
            text: text.clone(),
            max_votes,
            allowed_emotes,
            created_by: inv.msg.author.id,
            created_by_name: inv.msg.author.name.clone(),
            created_at: Utc::now(),
        };
        poll.id = Some(ctx.store.insert_as(COLLECTION, &poll).await?);

        let votes: Vec<(String, u64)> = poll
            .allowed_emotes
            .iter()
            .map(|e| (e.clone(), 0))
            .collect();
        ctx.discord
            .edit_embed(poll.channel_id, message_id, &poll_embed(&poll, &votes))
            .await?;
        for emote in &poll.allowed_emotes {
            ctx.discord
                .add_reaction(poll.channel_id, message_id, emote)
                .await?;
        }

        log_internal!(
            "Created reaction poll {} in channel {}",
            poll.id.as_deref().unwrap_or("-"),
            poll.channel_id
        );
        self.cache.write().await.insert(message_id, poll);
        Ok(())
    }

    /// Rewrite the poll message with the current tally
    async fn update_tally(&self, ctx: &Context, poll: &ReactionPoll) -> Result<()> {
        let counts = ctx
            .discord
            .reaction_counts(poll.channel_id, poll.message_id)
            .await?;
        let votes: Vec<(String, u64)> = poll
            .allowed_emotes
            .iter()
            .map(|emote| {
                let count = counts
                    .iter()
                    .find(|c| &c.emoji == emote)
                    .map_or(0, |c| c.count);
                // Minus the bot's own reaction
                (emote.clone(), count.saturating_sub(1))
            })
            .collect();

        ctx.discord
            .edit_embed(poll.channel_id, poll.message_id, &poll_embed(poll, &votes))
            .await
    }

    /// How many of the poll's options `user_id` currently reacts with
    async fn votes_of(&self, ctx: &Context, poll: &ReactionPoll, user_id: UserId) -> Result<u32> {
        let mut votes = 0;
        for emote in &poll.allowed_emotes {
            let users = ctx
                .discord
                .reaction_users(poll.channel_id, poll.message_id, emote)
                .await?;
            if users.contains(&user_id) {
                votes += 1;
            }
        }
        Ok(votes)
    }

    async fn poll_for(&self, message_id: MessageId) -> Option<ReactionPoll> {
        self.cache.read().await.get(&message_id).cloned()
    }
}

impl Default for PluginReactionPolls {
    fn default() -> Self {
        Self::new()
    }
}

#[serenity::async_trait]
impl Plugin for PluginReactionPolls {
    fn name(&self) -> &'static str {
        "reactionpolls"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["reactionpolls", "reactionpoll"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}reactionpoll create \"<text>\" <max votes> <emotes...> - start a poll",
            prefix
        ))
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::REACTION_ADD | Callbacks::REACTION_REMOVE
    }

    async fn init(&self, ctx: &Context) -> Result<()> {
        let count = self.reload(ctx).await?;
        log_internal!("Loaded {} reaction polls", count);
        Ok(())
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let args = split_args(&inv.args);
        match args.split_first() {
            Some((sub, rest)) if sub == "create" => {
                if !require_module(ctx, &inv.msg, Module::REACTION_POLLS).await? {
                    return Ok(());
                }
                self.create(ctx, inv, rest).await
            }
            Some((sub, _)) if sub == "refresh" => {
                if !require_bot_admin(ctx, &inv.msg).await? {
                    return Ok(());
                }
                self.reload(ctx).await?;
                ctx.reply(&inv.msg, &get_text("plugins.reactionpolls.refreshed-polls"))
                    .await?;
                Ok(())
            }
            Some(_) => Err(CommandError::InvalidArguments.into()),
            None => Err(CommandError::TooFewArguments.into()),
        }
    }

    async fn on_reaction_add(&self, ctx: &Context, event: &ReactionEvent) -> Result<()> {
        let Some(poll) = self.poll_for(event.message_id).await else {
            return Ok(());
        };
        let Some(user_id) = event.user_id else {
            return Ok(());
        };
        if user_id == ctx.discord.current_user_id() {
            return Ok(());
        }

        let over_limit = !poll.allowed_emotes.contains(&event.emoji)
            || self.votes_of(ctx, &poll, user_id).await? > poll.max_votes;
        if over_limit {
            ctx.discord
                .remove_reaction(event.channel_id, event.message_id, &event.emoji, user_id)
                .await?;
        }

        self.update_tally(ctx, &poll).await
    }

    async fn on_reaction_remove(&self, ctx: &Context, event: &ReactionEvent) -> Result<()> {
        let Some(poll) = self.poll_for(event.message_id).await else {
            return Ok(());
        };
        self.update_tally(ctx, &poll).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockDiscord, Outbound};

    fn reaction(message_id: MessageId, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            channel_id: testing::CHANNEL,
            message_id,
            guild_id: Some(testing::GUILD),
            user_id: Some(testing::USER),
            emoji: emoji.to_owned(),
        }
    }

    /// Create a one-vote poll on 🐶 and 🐱, returning its message
    async fn create_poll(
        discord: &MockDiscord,
        ctx: &Context,
        plugin: &PluginReactionPolls,
    ) -> MessageId {
        plugin
            .action(
                ctx,
                &testing::invocation("reactionpoll", "create \"Best pet?\" 1 🐶 🐱"),
            )
            .await
            .unwrap();
        discord
            .outbound()
            .into_iter()
            .find_map(|o| match o {
                Outbound::Message { message_id, .. } => Some(message_id),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn custom_emotes_use_api_names() {
        assert_eq!(emote_name("<:blob:123>"), "blob:123");
        assert_eq!(emote_name("<a:party:456>"), "party:456");
        assert_eq!(emote_name("🐶"), "🐶");
        assert_eq!(emote_display("blob:123"), "<:blob:123>");
    }

    #[tokio::test]
    async fn create_seeds_the_poll() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReactionPolls::new();

        let message_id = create_poll(&discord, &ctx, &plugin).await;

        assert_eq!(
            discord.sent_texts(),
            vec![get_text("plugins.reactionpolls.creating")]
        );
        let polls: Vec<ReactionPoll> = ctx.store.find_all_as(COLLECTION, &json!({})).await.unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].allowed_emotes, vec!["🐶", "🐱"]);

        let edited = discord.edited_embeds();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].0, message_id);
        assert_eq!(
            edited[0].1.footer,
            Some(format!(
                "Created By user300 | Total Votes 0 | Poll ID {}",
                polls[0].id.as_deref().unwrap()
            ))
        );
        assert!(edited[0].1.description.as_deref().unwrap().starts_with("Best pet?"));

        let seeded: Vec<String> = discord
            .reactions_added()
            .into_iter()
            .map(|(_, _, emoji)| emoji)
            .collect();
        assert_eq!(seeded, vec!["🐶", "🐱"]);
    }

    #[tokio::test]
    async fn too_many_emotes_are_refused() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let emotes = vec!["🐶"; MAX_EMOTES + 1].join(" ");

        PluginReactionPolls::new()
            .action(
                &ctx,
                &testing::invocation("reactionpoll", &format!("create \"Q\" 1 {}", emotes)),
            )
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![get_text("plugins.reactionpolls.create-too-many-reactions")]
        );
        assert!(discord.edited_embeds().is_empty());
    }

    #[tokio::test]
    async fn bad_vote_limits_are_invalid() {
        let ctx = testing::context(MockDiscord::new()).await;
        let err = PluginReactionPolls::new()
            .action(&ctx, &testing::invocation("reactionpoll", "create \"Q\" 0 🐶"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<CommandError>(),
            Some(&CommandError::InvalidArguments)
        );
    }

    #[tokio::test]
    async fn votes_are_enforced_and_tallied() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReactionPolls::new();
        let message_id = create_poll(&discord, &ctx, &plugin).await;

        // A valid first vote stays.
        discord.set_reaction_users(message_id, "🐶", vec![testing::BOT_USER, testing::USER]);
        plugin
            .on_reaction_add(&ctx, &reaction(message_id, "🐶"))
            .await
            .unwrap();
        assert!(discord.reactions_removed().is_empty());

        // A second vote exceeds the limit.
        discord.set_reaction_users(message_id, "🐱", vec![testing::BOT_USER, testing::USER]);
        plugin
            .on_reaction_add(&ctx, &reaction(message_id, "🐱"))
            .await
            .unwrap();

        // Not an option at all.
        discord.set_reaction_users(message_id, "🐍", vec![testing::USER]);
        plugin
            .on_reaction_add(&ctx, &reaction(message_id, "🐍"))
            .await
            .unwrap();

        assert_eq!(
            discord.reactions_removed(),
            vec![
                (message_id, "🐱".to_owned(), testing::USER),
                (message_id, "🐍".to_owned(), testing::USER),
            ]
        );

        let (_, last) = discord.edited_embeds().pop().unwrap();
        assert!(last.footer.unwrap().contains("Total Votes 1 "));
        assert!(last.description.unwrap().ends_with("🐶 **1**\n🐱 **0**"));
    }

    #[tokio::test]
    async fn unrelated_reactions_are_ignored() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReactionPolls::new();

        plugin
            .on_reaction_add(&ctx, &reaction(MessageId::new(1), "🐍"))
            .await
            .unwrap();
        plugin
            .on_reaction_remove(&ctx, &reaction(MessageId::new(1), "🐍"))
            .await
            .unwrap();
        assert!(discord.outbound().is_empty());
    }

    #[tokio::test]
    async fn refresh_is_for_bot_admins() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReactionPolls::new();

        plugin
            .action(&ctx, &testing::invocation("reactionpolls", "refresh"))
            .await
            .unwrap();
        plugin
            .action(
                &ctx,
                &testing::invocation_from(testing::BOT_ADMIN, "reactionpolls", "refresh"),
            )
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![
                get_text("botadmin.no_permission"),
                get_text("plugins.reactionpolls.refreshed-polls"),
            ]
        );
    }
}
