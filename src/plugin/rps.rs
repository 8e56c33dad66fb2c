use crate::{
    i18n::get_text,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;

/// Rock, paper, scissors.  The house always wins.
pub struct PluginRps;

fn answer_key(choice: &str) -> &'static str {
    let choice = choice.to_lowercase();
    if choice.contains("rock") || choice.contains("stone") {
        "plugins.rps.rock"
    } else if choice.contains("paper") {
        "plugins.rps.paper"
    } else if choice.contains("scissors") {
        "plugins.rps.scissors"
    } else {
        "plugins.rps.invalid"
    }
}

#[serenity::async_trait]
impl Plugin for PluginRps {
    fn name(&self) -> &'static str {
        "rps"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["rps"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}rps <rock|paper|scissors> - play a round", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::RPS).await? {
            return Ok(());
        }

        ctx.reply(&inv.msg, &get_text(answer_key(&inv.args)))
            .await?;
        Ok(())
    }
}
