use crate::plugin::*;
use anyhow::Result;

pub struct PluginHelp;

#[serenity::async_trait]
impl Plugin for PluginHelp {
    fn name(&self) -> &'static str {
        "help"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["help", "h"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}help - show this help message", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let prefix = ctx.prefix(inv.msg.guild_id).await?;

        let mut reply = String::new();
        reply.push_str("```\n");
        reply.push_str(&crate::i18n::get_text("plugins.help.header"));
        reply.push('\n');
        for plugin in ctx.registry.plugins() {
            if let Some(usage) = plugin.usage(&prefix) {
                reply.push_str(&usage);
                reply.push('\n');
            }
        }
        reply.push_str("```");

        ctx.reply(&inv.msg, &reply).await?;
        Ok(())
    }
}
