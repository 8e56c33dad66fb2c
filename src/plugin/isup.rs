use crate::{
    error::CommandError,
    i18n::get_text_f,
    permissions::{require_module, Module},
    plugin::*,
};
use anyhow::Result;
use reqwest::Url;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Checks whether a website answers
pub struct PluginIsUp {
    client: reqwest::Client,
}

impl Default for PluginIsUp {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginIsUp {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Status line on success, error description otherwise
    async fn fetch_status(&self, url: Url) -> std::result::Result<reqwest::StatusCode, String> {
        let response = self
            .client
            .get(url)
            .timeout(TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timed out".to_owned()
                } else if e.is_connect() {
                    "could not connect".to_owned()
                } else {
                    e.without_url().to_string()
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(format!("answered with status {}", status));
        }
        Ok(status)
    }
}

/// Accept `example.com`, `<https://example.com>` and the like
fn normalize(link: &str) -> Option<Url> {
    let link = link.trim().trim_start_matches('<').trim_end_matches('>');
    if link.is_empty() {
        return None;
    }

    let url = if link.contains("://") {
        Url::parse(link).ok()?
    } else {
        Url::parse(&format!("http://{}", link)).ok()?
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[serenity::async_trait]
impl Plugin for PluginIsUp {
    fn name(&self) -> &'static str {
        "isup"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["isup"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!("{}isup <url> - check if a website is up", prefix))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::ISUP).await? {
            return Ok(());
        }

        let link = inv
            .args
            .split_whitespace()
            .next()
            .ok_or(CommandError::TooFewArguments)?;
        let url = normalize(link).ok_or(CommandError::InvalidArguments)?;
        let host = url.host_str().unwrap_or(link).to_owned();

        ctx.discord.broadcast_typing(inv.msg.channel_id).await?;
        let text = match self.fetch_status(url).await {
            Ok(status) => get_text_f("plugins.isup.up", &[&host, &status.as_u16()]),
            Err(reason) => get_text_f("plugins.isup.down", &[&host, &reason]),
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}
