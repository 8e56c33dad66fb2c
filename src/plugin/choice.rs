use crate::{
    error::CommandError,
    helper::split_args,
    i18n::get_text_f,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;
use rand::{seq::SliceRandom, Rng};

const DEFAULT_ROLL_MAX: u64 = 100;

pub struct PluginChoice;

#[serenity::async_trait]
impl Plugin for PluginChoice {
    fn name(&self) -> &'static str {
        "choice"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["choose", "choice", "roll"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}choose <a> <b> [...] - pick one, quote options with spaces\n\
             {p}roll [max] - roll 1 to max (default {d})",
            p = prefix,
            d = DEFAULT_ROLL_MAX
        ))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::CHOICE).await? {
            return Ok(());
        }

        let text = match inv.command.as_str() {
            "roll" => {
                let max = match inv.args.trim() {
                    "" => DEFAULT_ROLL_MAX,
                    arg => arg
                        .parse::<u64>()
                        .ok()
                        .filter(|&max| max >= 1)
                        .ok_or(CommandError::InvalidArguments)?,
                };
                let rolled = rand::thread_rng().gen_range(1..=max);
                get_text_f("plugins.choice.roll", &[&inv.msg.author.id, &rolled])
            }
            _ => {
                let options = split_args(&inv.args);
                if options.len() < 2 {
                    return Err(CommandError::TooFewArguments.into());
                }
                let chosen = options
                    .choose(&mut rand::thread_rng())
                    .ok_or(CommandError::TooFewArguments)?;
                get_text_f("plugins.choice.result", &[chosen])
            }
        };

        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}
