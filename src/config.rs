// ⚙️ Configuration - TOML file plus environment overrides for secrets

use crate::ai::{AiProvider, AiSettings};
use crate::discord::DiscordSettings;
use crate::evolution::DEFAULT_SPRITE_BASE;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "skali.toml";
pub const CONFIG_ENV: &str = "SKALI_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    pub ai: AiConfig,
    pub discord: DiscordConfig,
    pub cards: CardsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    /// Provider default when empty
    pub model: String,
    pub claude_api_key: String,
    pub deepseek_api_key: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CardsConfig {
    /// How long a cached peer reference stays valid in the server
    pub peer_reference_ttl_secs: u64,
    pub sprite_base_url: String,
    /// Optional JSON rule table replacing the built-in classifier rules
    pub rules_path: Option<String>,
    /// Optional JSON identity pools replacing the built-in roster
    pub pools_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: "skali.db".to_string(),
            server: ServerConfig::default(),
            supabase: SupabaseConfig::default(),
            ai: AiConfig::default(),
            discord: DiscordConfig::default(),
            cards: CardsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            provider: AiProvider::Claude,
            model: String::new(),
            claude_api_key: String::new(),
            deepseek_api_key: String::new(),
            timeout_secs: 60,
            max_tokens: 4000,
        }
    }
}

impl Default for CardsConfig {
    fn default() -> Self {
        CardsConfig {
            peer_reference_ttl_secs: 300,
            sprite_base_url: DEFAULT_SPRITE_BASE.to_string(),
            rules_path: None,
            pools_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a config file; a missing file gives defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loaded config");
                Self::from_toml(&contents, path)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(AppConfig::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `explicit`, else $SKALI_CONFIG, else ./skali.toml; then env overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Non-empty variables win over file values
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let overrides: [(&str, &mut String); 7] = [
            ("SKALI_DATABASE", &mut self.database_path),
            ("SUPABASE_URL", &mut self.supabase.url),
            ("SUPABASE_KEY", &mut self.supabase.api_key),
            ("CLAUDE_API_KEY", &mut self.ai.claude_api_key),
            ("DEEPSEEK_API_KEY", &mut self.ai.deepseek_api_key),
            ("DISCORD_CLIENT_ID", &mut self.discord.client_id),
            ("DISCORD_CLIENT_SECRET", &mut self.discord.client_secret),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn ai_settings(&self) -> AiSettings {
        let provider = self.ai.provider;
        let model = if self.ai.model.is_empty() {
            provider.default_model().to_string()
        } else {
            self.ai.model.clone()
        };
        let api_key = match provider {
            AiProvider::Claude => self.ai.claude_api_key.clone(),
            AiProvider::DeepSeek => self.ai.deepseek_api_key.clone(),
        };

        AiSettings {
            provider,
            model,
            api_key,
            timeout: Duration::from_secs(self.ai.timeout_secs),
            max_tokens: self.ai.max_tokens,
        }
    }

    pub fn discord_settings(&self) -> DiscordSettings {
        DiscordSettings {
            client_id: self.discord.client_id.clone(),
            client_secret: self.discord.client_secret.clone(),
            redirect_uri: self.discord.redirect_uri.clone(),
            guild_id: self.discord.guild_id.clone(),
        }
    }

    pub fn supabase_timeout(&self) -> Duration {
        Duration::from_secs(self.supabase.timeout_secs.unwrap_or(30))
    }

    pub fn peer_reference_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cards.peer_reference_ttl_secs.min(i64::MAX as u64) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.cards.peer_reference_ttl_secs, 300);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
database_path = "/var/lib/skali/cards.db"

[ai]
provider = "deepseek"
deepseek_api_key = "ds-file"

[cards]
sprite_base_url = "https://cdn.example/sprites"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_path, "/var/lib/skali/cards.db");
        assert_eq!(config.cards.sprite_base_url, "https://cdn.example/sprites");
        assert_eq!(config.cards.peer_reference_ttl_secs, 300);

        let ai = config.ai_settings();
        assert_eq!(ai.provider, AiProvider::DeepSeek);
        assert_eq!(ai.model, "deepseek-chat");
        assert_eq!(ai.api_key, "ds-file");
        assert_eq!(ai.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "database_path = [").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("CLAUDE_API_KEY", "sk-env"),
            ("DISCORD_CLIENT_ID", "  "),
        ]);

        let mut config = AppConfig::default();
        config.discord.client_id = "from-file".to_string();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.supabase.url, "https://abc.supabase.co");
        assert_eq!(config.ai_settings().api_key, "sk-env");
        assert_eq!(config.discord_settings().client_id, "from-file");
        assert_eq!(config.database_path, "skali.db");
    }
}
