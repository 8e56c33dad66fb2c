use crate::{
    i18n::get_text,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;
use std::time::Instant;

pub struct PluginPing;

#[serenity::async_trait]
impl Plugin for PluginPing {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["ping"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}ping - round trip time to Discord", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::STATS).await? {
            return Ok(());
        }

        let pong = get_text("plugins.ping.pong");
        let start = Instant::now();
        let message_id = ctx.reply(&inv.msg, &pong).await?;
        // Send and acknowledge, so halve it.
        let latency = start.elapsed().as_millis() / 2;

        ctx.discord
            .edit_message(
                inv.msg.channel_id,
                message_id,
                &format!("{} ({}ms)", pong, latency),
            )
            .await?;
        Ok(())
    }
}
