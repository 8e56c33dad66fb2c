//! Outbound side of the Discord connection.
//!
//! Plugins never touch serenity's HTTP client directly; they go through the `Discord` trait so the
//! dispatch core and every plugin can be exercised against a recording fake.

use anyhow::{anyhow, Result};
use serenity::all::{
    ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage, GuildId, Http,
    MessageId, ReactionType, RoleId, UserId,
};
use std::sync::Arc;

/// A rich message
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Robyul's house color
pub const EMBED_COLOR: u32 = 0x0FADED;

impl Embed {
    pub fn new() -> Self {
        Self {
            color: EMBED_COLOR,
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    fn to_serenity(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().colour(self.color);
        if let Some(title) = &self.title {
            embed = embed.title(title);
        }
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        for field in &self.fields {
            embed = embed.field(&field.name, &field.value, field.inline);
        }
        if let Some(footer) = &self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }
        embed
    }
}

/// A guild role as far as authorization cares
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub name: String,
    pub administrator: bool,
}

/// A guild member with their roles resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: UserId,
    pub guild_owner: UserId,
    pub roles: Vec<RoleInfo>,
}

/// Count of one emoji on a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: u64,
}

/// Operations the bot performs against Discord.
///
/// Emoji are passed the way the API names them: the unicode character itself, or `name:id` for
/// custom emoji.
#[serenity::async_trait]
pub trait Discord: Send + Sync {
    /// The bot's own user
    fn current_user_id(&self) -> UserId;

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<MessageId>;
    async fn send_embed(&self, channel_id: ChannelId, embed: &Embed) -> Result<MessageId>;
    async fn edit_message(&self, channel_id: ChannelId, message_id: MessageId, content: &str)
        -> Result<()>;
    async fn edit_embed(&self, channel_id: ChannelId, message_id: MessageId, embed: &Embed)
        -> Result<()>;
    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<MessageId>;
    async fn broadcast_typing(&self, channel_id: ChannelId) -> Result<()>;

    async fn add_reaction(&self, channel_id: ChannelId, message_id: MessageId, emoji: &str)
        -> Result<()>;
    async fn remove_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()>;
    async fn reaction_counts(&self, channel_id: ChannelId, message_id: MessageId)
        -> Result<Vec<ReactionCount>>;
    async fn reaction_users(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<Vec<UserId>>;

    async fn user_name(&self, user_id: UserId) -> Result<String>;
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo>;
    async fn add_member_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId)
        -> Result<()>;
}

/// `Discord` over serenity's REST client
pub struct SerenityDiscord {
    http: Arc<Http>,
    current_user_id: UserId,
}

impl SerenityDiscord {
    /// Resolves the bot's own user, so this performs one request.
    pub async fn new(http: Arc<Http>) -> Result<Self> {
        let current_user_id = http.get_current_user().await?.id;
        Ok(Self {
            http,
            current_user_id,
        })
    }

    fn http(&self) -> &Http {
        &self.http
    }
}

fn reaction_type(emoji: &str) -> Result<ReactionType> {
    ReactionType::try_from(emoji).map_err(|e| anyhow!("Invalid emoji `{}`: {}", emoji, e))
}

/// API name of a reaction, the inverse of `reaction_type`
pub fn emoji_name(reaction: &ReactionType) -> String {
    match reaction {
        ReactionType::Custom { id, name, .. } => {
            format!("{}:{}", name.as_deref().unwrap_or_default(), id)
        }
        ReactionType::Unicode(s) => s.clone(),
        _ => "<unknown-emoji>".to_owned(),
    }
}

#[serenity::async_trait]
impl Discord for SerenityDiscord {
    fn current_user_id(&self) -> UserId {
        self.current_user_id
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<MessageId> {
        Ok(channel_id.say(self.http(), content).await?.id)
    }

    async fn send_embed(&self, channel_id: ChannelId, embed: &Embed) -> Result<MessageId> {
        let msg = channel_id
            .send_message(self.http(), CreateMessage::new().embed(embed.to_serenity()))
            .await?;
        Ok(msg.id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<()> {
        channel_id
            .edit_message(self.http(), message_id, EditMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn edit_embed(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        embed: &Embed,
    ) -> Result<()> {
        channel_id
            .edit_message(
                self.http(),
                message_id,
                EditMessage::new().embed(embed.to_serenity()),
            )
            .await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<MessageId> {
        let channel = user_id.create_dm_channel(self.http()).await?;
        Ok(channel.id.say(self.http(), content).await?.id)
    }

    async fn broadcast_typing(&self, channel_id: ChannelId) -> Result<()> {
        Ok(self.http.broadcast_typing(channel_id).await?)
    }

    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()> {
        let reaction = reaction_type(emoji)?;
        Ok(self
            .http
            .create_reaction(channel_id, message_id, &reaction)
            .await?)
    }

    async fn remove_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()> {
        let reaction = reaction_type(emoji)?;
        Ok(self
            .http
            .delete_reaction(channel_id, message_id, user_id, &reaction)
            .await?)
    }

    async fn reaction_counts(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Vec<ReactionCount>> {
        let msg = self.http.get_message(channel_id, message_id).await?;
        Ok(msg
            .reactions
            .iter()
            .map(|r| ReactionCount {
                emoji: emoji_name(&r.reaction_type),
                count: r.count,
            })
            .collect())
    }

    async fn reaction_users(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<Vec<UserId>> {
        let reaction = reaction_type(emoji)?;
        let users = self
            .http
            .get_reaction_users(channel_id, message_id, &reaction, 100, None)
            .await?;
        Ok(users.into_iter().map(|u| u.id).collect())
    }

    async fn user_name(&self, user_id: UserId) -> Result<String> {
        Ok(user_id.to_user(self.http()).await?.name)
    }

    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo> {
        let guild = guild_id.to_partial_guild(self.http()).await?;
        let member = guild_id.member(self.http(), user_id).await?;

        let roles = member
            .roles
            .iter()
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| RoleInfo {
                id: role.id,
                name: role.name.clone(),
                administrator: role.permissions.administrator(),
            })
            .collect();

        Ok(MemberInfo {
            user_id,
            guild_owner: guild.owner_id,
            roles,
        })
    }

    async fn add_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<()> {
        Ok(self
            .http
            .add_member_role(guild_id, user_id, role_id, Some("Robyul auto role"))
            .await?)
    }
}
