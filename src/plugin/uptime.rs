use crate::{
    helper::format_duration,
    i18n::get_text_f,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;

pub struct PluginUptime;

#[serenity::async_trait]
impl Plugin for PluginUptime {
    fn name(&self) -> &'static str {
        "uptime"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["uptime"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}uptime - how long I've been running", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::STATS).await? {
            return Ok(());
        }

        let uptime = format_duration(ctx.started_at.elapsed());
        ctx.reply(&inv.msg, &get_text_f("plugins.uptime.message", &[&uptime]))
            .await?;
        Ok(())
    }
}
