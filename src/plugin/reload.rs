use crate::{i18n::get_text, permissions::require_bot_admin, plugin::*};
use anyhow::Result;

pub struct PluginReload;

#[serenity::async_trait]
impl Plugin for PluginReload {
    fn name(&self) -> &'static str {
        "reload"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["reload"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}reload - reread the configuration file (bot admins only)",
            prefix
        ))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_bot_admin(ctx, &inv.msg).await? {
            return Ok(());
        }

        ctx.cfg.write().await.reload().await?;
        tracing::info!("Configuration reloaded by {}", inv.msg.author.id);
        ctx.reply(&inv.msg, &get_text("plugins.reload.success"))
            .await?;
        Ok(())
    }
}
