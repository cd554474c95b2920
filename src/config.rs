use anyhow::{Context, Result, anyhow, bail};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tubegram-env";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_LINK_STORE_CAPACITY: usize = 1024;
const DOWNLOAD_SUBDIR: &str = "tubegram";

/// Keys understood both in the env file and in the process environment.
const KEYS: [&str; 6] = [
    "BOT_TOKEN",
    "DOWNLOAD_DIR",
    "MAX_UPLOAD_MB",
    "YTDLP_PATH",
    "COOKIES_FILE",
    "LINK_STORE_CAPACITY",
];

/// Telegram bot token. Kept out of `Debug` output so settings can be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(***)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub bot_token: Option<BotToken>,
    pub download_dir: Option<PathBuf>,
    pub max_upload_mb: Option<u64>,
    pub ytdlp_path: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
    pub link_store_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: BotToken,
    pub download_dir: PathBuf,
    pub max_upload_mb: u64,
    pub ytdlp_path: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub link_store_capacity: usize,
}

impl EnvConfig {
    /// Applies a single `KEY=value` pair. Empty values are ignored so a blank
    /// line in the env file does not clobber a default.
    fn set(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        match key {
            "BOT_TOKEN" => self.bot_token = Some(BotToken::new(value)),
            "DOWNLOAD_DIR" => self.download_dir = Some(PathBuf::from(value)),
            "MAX_UPLOAD_MB" => {
                let mb: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing MAX_UPLOAD_MB from {origin}"))?;
                if mb == 0 {
                    bail!("MAX_UPLOAD_MB from {origin} must be greater than zero");
                }
                self.max_upload_mb = Some(mb);
            }
            "YTDLP_PATH" => self.ytdlp_path = Some(PathBuf::from(value)),
            "COOKIES_FILE" => self.cookies_file = Some(PathBuf::from(value)),
            "LINK_STORE_CAPACITY" => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("Parsing LINK_STORE_CAPACITY from {origin}"))?;
                self.link_store_capacity = Some(capacity.max(1));
            }
            _ => {}
        }
        Ok(())
    }

    /// Lets process environment variables win over the env file.
    pub fn overlay_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in KEYS {
            if let Some(value) = lookup(key) {
                self.set(key, value.trim(), "environment")?;
            }
        }
        Ok(())
    }

    pub fn into_settings(self) -> Result<Settings> {
        let bot_token = self
            .bot_token
            .ok_or_else(|| anyhow!("BOT_TOKEN is not set in the environment or the config file"))?;
        Ok(Settings {
            bot_token,
            download_dir: self
                .download_dir
                .unwrap_or_else(|| env::temp_dir().join(DOWNLOAD_SUBDIR)),
            max_upload_mb: self.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB),
            ytdlp_path: self
                .ytdlp_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_PATH)),
            cookies_file: self.cookies_file,
            link_store_capacity: self
                .link_store_capacity
                .unwrap_or(DEFAULT_LINK_STORE_CAPACITY),
        })
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            cfg.set(key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

/// Reads the optional env file at `path`, then overlays whatever `lookup`
/// returns for each known key.
pub fn load_settings_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = read_env_config(path.as_ref())?.unwrap_or_default();
    cfg.overlay_env(lookup)?;
    cfg.into_settings()
}
