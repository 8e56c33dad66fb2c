use crate::{
    i18n::get_text,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;

pub struct PluginEightBall;

#[serenity::async_trait]
impl Plugin for PluginEightBall {
    fn name(&self) -> &'static str {
        "8ball"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["8ball", "8"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}8ball <question> - ask the magic 8ball", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::EIGHT_BALL).await? {
            return Ok(());
        }

        let text = if inv.args.chars().count() < 3 {
            get_text("plugins.8ball.ask_a_question")
        } else {
            get_text("plugins.8ball")
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockDiscord};

    #[tokio::test]
    async fn short_questions_are_refused() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;

        PluginEightBall
            .action(&ctx, &testing::invocation("8", "ok"))
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![get_text("plugins.8ball.ask_a_question")]
        );
    }

    #[tokio::test]
    async fn answers_questions() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;

        PluginEightBall
            .action(&ctx, &testing::invocation("8ball", "will it rain?"))
            .await
            .unwrap();
        let sent = discord.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with(":8ball: "));
        assert_ne!(sent[0], get_text("plugins.8ball.ask_a_question"));
    }
}
