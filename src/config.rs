use anyhow::{anyhow, Result};
use serenity::all::UserId;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/robyul/config.toml";

/// Bot configuration
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ratelimit: Ratelimit,
    #[serde(default)]
    pub background: Background,
    #[serde(default)]
    pub reminders: Reminders,
    /// Where this configuration was read from.  Used by `reload`.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    /// Bot admins
    #[serde(default)]
    pub bot_owners: Vec<UserId>,
    /// Bot-wide staff, may curate shared content such as dog links
    #[serde(default)]
    pub bot_moderators: Vec<UserId>,
    /// Prefix given to guilds which have not configured their own
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Storage {
    /// Persist the document store to this JSON file.  In-memory only if unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Ratelimit {
    pub initial_fill: i8,
    pub upper_bound: i8,
    pub drop_interval_secs: u64,
    pub drop_size: i8,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Background {
    pub restart_backoff_secs: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Reminders {
    pub poll_interval_secs: u64,
}

// The token stays out of logs.
impl fmt::Debug for General {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("General")
            .field("discord_token", &"<redacted>")
            .field("bot_owners", &self.bot_owners)
            .field("bot_moderators", &self.bot_moderators)
            .field("default_prefix", &self.default_prefix)
            .finish()
    }
}

fn default_prefix() -> String {
    "_".to_owned()
}

impl Default for Ratelimit {
    fn default() -> Self {
        Self {
            initial_fill: 16,
            upper_bound: 32,
            drop_interval_secs: 10,
            drop_size: 1,
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self {
            restart_backoff_secs: 60,
        }
    }
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    /// Load the configuration from `path`, or from the default location under the home directory.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut config = Self::from_toml(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;
        config.source = Some(path);

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load(self.source.as_deref()).await?;
        *self = new;
        Ok(())
    }

    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.general.bot_owners.contains(&user_id)
    }

    pub fn is_bot_moderator(&self, user_id: UserId) -> bool {
        self.is_bot_owner(user_id) || self.general.bot_moderators.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let cfg = Config::from_toml(
            r#"
            [general]
            discord_token = "secret"
            bot_owners = ["42"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.general.default_prefix, "_");
        assert!(cfg.storage.path.is_none());
        assert_eq!(cfg.ratelimit.initial_fill, 16);
        assert_eq!(cfg.ratelimit.upper_bound, 32);
        assert_eq!(cfg.background.restart_backoff_secs, 60);
        assert_eq!(cfg.reminders.poll_interval_secs, 5);
        assert!(cfg.is_bot_owner(UserId::new(42)));
        assert!(cfg.is_bot_moderator(UserId::new(42)));
        assert!(!cfg.is_bot_moderator(UserId::new(7)));
    }

    #[test]
    fn explicit_sections_override_defaults() {
        let cfg = Config::from_toml(
            r#"
            [general]
            discord_token = "secret"
            bot_moderators = ["7"]
            default_prefix = "!"

            [storage]
            path = "/tmp/robyul.json"

            [background]
            restart_backoff_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.general.default_prefix, "!");
        assert_eq!(cfg.storage.path, Some(PathBuf::from("/tmp/robyul.json")));
        assert_eq!(cfg.background.restart_backoff_secs, 5);
        assert!(cfg.is_bot_moderator(UserId::new(7)));
        assert!(!cfg.is_bot_owner(UserId::new(7)));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let cfg = Config::from_toml("[general]\ndiscord_token = \"hunter2\"\n").unwrap();
        let shown = format!("{:?}", cfg);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("default_prefix"));
    }

    #[test]
    fn general_section_is_required() {
        assert!(Config::from_toml("[storage]\n").is_err());
    }

    #[tokio::test]
    async fn reload_rereads_the_same_file() {
        let path =
            std::env::temp_dir().join(format!("robyul-config-{}.toml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "[general]\ndiscord_token = \"a\"\n")
            .await
            .unwrap();

        let mut cfg = Config::load(Some(&path)).await.unwrap();
        assert_eq!(cfg.general.discord_token, "a");

        tokio::fs::write(&path, "[general]\ndiscord_token = \"b\"\ndefault_prefix = \"?\"\n")
            .await
            .unwrap();
        cfg.reload().await.unwrap();
        assert_eq!(cfg.general.discord_token, "b");
        assert_eq!(cfg.general.default_prefix, "?");
        assert_eq!(cfg.source.as_deref(), Some(path.as_path()));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = Config::load(Some(Path::new("/nonexistent/robyul.toml")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/robyul.toml"));
    }
}
