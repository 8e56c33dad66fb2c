use crate::{
    error::CommandError,
    i18n::{get_text, get_text_f},
    permissions::{require_bot_moderator, require_module, Module},
    plugin::*,
    store::TypedStore,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::UserId;

const COLLECTION: &str = "dog_links";

/// Random dog pictures, curated by bot moderators
pub struct PluginDog;

#[derive(Debug, Serialize, Deserialize)]
struct DogLink {
    url: String,
    #[serde(default)]
    added_by: Option<UserId>,
    #[serde(default)]
    added_at: Option<DateTime<Utc>>,
}

impl PluginDog {
    async fn add(&self, ctx: &Context, inv: &Invocation, url: Option<&str>) -> Result<()> {
        if !require_bot_moderator(ctx, &inv.msg).await? {
            return Ok(());
        }
        let url = url.ok_or(CommandError::TooFewArguments)?;

        let link = DogLink {
            url: url.to_owned(),
            added_by: Some(inv.msg.author.id),
            added_at: Some(Utc::now()),
        };
        ctx.store.insert_as(COLLECTION, &link).await?;

        ctx.reply(&inv.msg, &get_text_f("plugins.dog.add-success", &[&url]))
            .await?;
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for PluginDog {
    fn name(&self) -> &'static str {
        "dog"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["dog"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}dog - random dog picture", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::ANIMALS).await? {
            return Ok(());
        }
        ctx.discord.broadcast_typing(inv.msg.channel_id).await?;

        let mut args = inv.args.split_whitespace();
        if args.next() == Some("add") {
            return self.add(ctx, inv, args.next()).await;
        }

        let links: Vec<DogLink> = ctx.store.find_all_as(COLLECTION, &json!({})).await?;
        let text = match links.choose(&mut rand::thread_rng()) {
            Some(link) => get_text_f("plugins.dog.result", &[&link.url]),
            None => get_text("plugins.dog.none"),
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}
