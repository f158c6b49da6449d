use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::services::rate_limiter::MAX_WINDOW;

#[derive(Debug, Error)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub workspace_root: PathBuf,
    pub static_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_rate_limit: u32,
    pub llm_rate_window: Duration,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub git_author_name: String,
    pub git_author_email: String,
    pub cors_origin: Option<String>,
    pub bcrypt_cost: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: String::from("127.0.0.1:8000"),
            database_url: String::from("sqlite://db/codeforge.db"),
            workspace_root: PathBuf::from("./workspace"),
            static_dir: PathBuf::from("./client/dist"),
            openai_api_key: None,
            openai_base_url: String::from("https://api.openai.com/v1"),
            openai_model: String::from("gpt-4o"),
            llm_rate_limit: 10,
            llm_rate_window: Duration::from_secs(60),
            session_ttl: Duration::from_secs(168 * 60 * 60),
            cookie_secure: false,
            git_author_name: String::from("codeforge"),
            git_author_email: String::from("codeforge@localhost"),
            cors_origin: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Settings, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Unset or empty
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(v) = get("BIND_ADDR") {
            settings.bind_addr = v;
        }
        if let Some(v) = get("DATABASE_URL") {
            settings.database_url = v;
        }
        if let Some(v) = get("WORKSPACE_ROOT") {
            settings.workspace_root = PathBuf::from(v);
        }
        if let Some(v) = get("STATIC_DIR") {
            settings.static_dir = PathBuf::from(v);
        }
        settings.openai_api_key = get("OPENAI_API_KEY");
        if let Some(v) = get("OPENAI_BASE_URL") {
            settings.openai_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("OPENAI_MODEL") {
            settings.openai_model = v;
        }
        if let Some(v) = get("LLM_RATE_LIMIT") {
            settings.llm_rate_limit = parse("LLM_RATE_LIMIT", &v)?;
        }
        if let Some(v) = get("LLM_RATE_WINDOW_SECS") {
            let secs: u64 = parse("LLM_RATE_WINDOW_SECS", &v)?;
            if secs == 0 || secs > MAX_WINDOW.as_secs() {
                return Err(invalid("LLM_RATE_WINDOW_SECS", &v));
            }
            settings.llm_rate_window = Duration::from_secs(secs);
        }
        if let Some(v) = get("SESSION_TTL_HOURS") {
            let hours: u64 = parse("SESSION_TTL_HOURS", &v)?;
            let secs = hours
                .checked_mul(60 * 60)
                .filter(|&secs| secs > 0)
                .ok_or_else(|| invalid("SESSION_TTL_HOURS", &v))?;
            settings.session_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = get("COOKIE_SECURE") {
            settings.cookie_secure = parse("COOKIE_SECURE", &v)?;
        }
        if let Some(v) = get("GIT_AUTHOR_NAME") {
            settings.git_author_name = v;
        }
        if let Some(v) = get("GIT_AUTHOR_EMAIL") {
            settings.git_author_email = v;
        }
        settings.cors_origin = get("CORS_ORIGIN");
        if let Some(v) = get("BCRYPT_COST") {
            settings.bcrypt_cost = parse("BCRYPT_COST", &v)?;
        }

        Ok(settings)
    }
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError {
        name,
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}
