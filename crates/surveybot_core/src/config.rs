use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "surveybot/0.2 (survey transclusion bot)";
pub const DEFAULT_API_URL: &str = "https://meta.wikimedia.org/w/api.php";
pub const DEFAULT_STREAM_URL: &str = "https://stream.wikimedia.org/v2/stream/recentchange";
pub const DEFAULT_WIKI_ID: &str = "metawiki";
pub const DEFAULT_CONFIG_PAGE: &str = "User:Community Tech bot/WishlistSurvey/config";
pub const DEFAULT_HEADER_TEMPLATE: &str = "Community Wishlist Survey/Proposal header";
pub const DEFAULT_SETTINGS_FILENAME: &str = "surveybot.toml";

/// Local process settings, read from `surveybot.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub replica: ReplicaSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub wiki_id: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub assert: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StreamSection {
    pub url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BotSection {
    pub username: Option<String>,
    pub config_page: Option<String>,
    pub header_template: Option<String>,
    #[serde(default = "default_extra_categories")]
    pub extra_categories: Vec<String>,
    #[serde(default = "default_uncounted_categories")]
    pub uncounted_categories: Vec<String>,
    #[serde(default = "default_counts_subpage")]
    pub counts_subpage: String,
    #[serde(default = "default_editor_counts_subpage")]
    pub editor_counts_subpage: String,
    #[serde(default)]
    pub editor_counts: bool,
    #[serde(default = "default_true")]
    pub serialize_categories: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            username: None,
            config_page: None,
            header_template: None,
            extra_categories: default_extra_categories(),
            uncounted_categories: default_uncounted_categories(),
            counts_subpage: default_counts_subpage(),
            editor_counts_subpage: default_editor_counts_subpage(),
            editor_counts: false,
            serialize_categories: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ReplicaSection {
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub namespace: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_extra_categories() -> Vec<String> {
    vec!["Untranslated".to_string(), "Archive".to_string()]
}

fn default_uncounted_categories() -> Vec<String> {
    vec!["Untranslated".to_string()]
}

fn default_counts_subpage() -> String {
    "Proposal counts".to_string()
}

fn default_editor_counts_subpage() -> String {
    "Editor counts".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Resolve the wiki API URL: env WIKI_API_URL > config > default.
    pub fn api_url(&self) -> String {
        env_override("WIKI_API_URL")
            .or_else(|| self.wiki.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve the event stream URL: env SURVEYBOT_STREAM_URL > config > default.
    pub fn stream_url(&self) -> String {
        env_override("SURVEYBOT_STREAM_URL")
            .or_else(|| self.stream.url.clone())
            .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string())
    }

    pub fn wiki_id(&self) -> &str {
        self.wiki.wiki_id.as_deref().unwrap_or(DEFAULT_WIKI_ID)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.wiki.timeout_ms.unwrap_or(8_000)
    }

    /// Assertion sent with every write; an empty string disables it.
    pub fn assert(&self) -> Option<&str> {
        match self.wiki.assert.as_deref() {
            Some("") => None,
            Some(value) => Some(value),
            None => Some("bot"),
        }
    }

    pub fn reconnect_delay_ms(&self) -> u64 {
        self.stream.reconnect_delay_ms.unwrap_or(3_000)
    }

    pub fn config_page(&self) -> &str {
        self.bot.config_page.as_deref().unwrap_or(DEFAULT_CONFIG_PAGE)
    }

    pub fn header_template(&self) -> &str {
        self.bot
            .header_template
            .as_deref()
            .unwrap_or(DEFAULT_HEADER_TEMPLATE)
    }

    /// The identity whose own edits are ignored. Falls back to the account
    /// name part of a `User@botpassword` login name.
    pub fn bot_identity(&self, credentials: Option<&Credentials>) -> Option<String> {
        if let Some(username) = &self.bot.username {
            return Some(username.clone());
        }
        credentials.map(|credentials| {
            credentials
                .username
                .split('@')
                .next()
                .unwrap_or(&credentials.username)
                .to_string()
        })
    }

    pub fn is_counted(&self, category: &str) -> bool {
        !self
            .bot
            .uncounted_categories
            .iter()
            .any(|item| item == category)
    }
}

/// Load settings from a TOML file. Returns defaults if the file doesn't exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: Settings =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let username = match env::var("WIKI_BOT_USER") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => bail!("WIKI_BOT_USER is required to edit the survey pages"),
        };
        let password = match env::var("WIKI_BOT_PASS") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => bail!("WIKI_BOT_PASS is required to edit the survey pages"),
        };
        Ok(Self { username, password })
    }
}

/// Survey configuration published as JSON on the configuration page.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SurveyConfig {
    pub survey_root: String,
    pub categories: Vec<String>,
}

impl SurveyConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: SurveyConfig =
            serde_json::from_str(content).context("failed to parse survey configuration JSON")?;
        if parsed.survey_root.trim().is_empty() {
            bail!("survey configuration has an empty survey_root");
        }
        Ok(Self {
            survey_root: parsed.survey_root.trim().trim_end_matches('/').to_string(),
            categories: parsed.categories,
        })
    }

    pub fn category_path(&self, category: &str) -> String {
        format!("{}/{}", self.survey_root, category)
    }

    pub fn counts_path(&self, subpage: &str, category: &str) -> String {
        format!("{}/{}/{}", self.survey_root, subpage, category)
    }
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
