use crate::{Error, Result};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_BOT_LOGINS: &[&str] = &["github-actions[bot]", "s0undt3ch"];

/// Configuration for the results commenter, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token used to authenticate against the comment API.
    pub github_token: String,
    /// Commit the comments are attached to. Also the sha of the "Current" report.
    pub github_sha: String,
    pub github_api_url: String,
    /// Identities whose stale result comments may be pruned.
    pub bot_logins: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_logins = match optional(&lookup, "CI_COMMENT_BOT_LOGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_BOT_LOGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Config {
            github_token: required(&lookup, "GITHUB_TOKEN")?,
            github_sha: required(&lookup, "GITHUB_SHA")?,
            github_api_url: optional(&lookup, "GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            bot_logins,
        })
    }
}

/// Settings for invoking the external backtesting engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable used to run backtests.
    pub freqtrade_bin: String,
    /// Engine user-data directory, relative to the repository root.
    pub user_data: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        EngineConfig {
            freqtrade_bin: optional(&lookup, "FREQTRADE_BIN")
                .unwrap_or_else(|| "freqtrade".to_string()),
            user_data: optional(&lookup, "FREQTRADE_USER_DATA")
                .unwrap_or_else(|| "user_data".to_string()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)
        .ok_or_else(|| Error::Config(format!("{key} environment variable not set")))
}

/// Empty values count as unset.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty())
}
