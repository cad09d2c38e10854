use anyhow::{Context, Result};
use std::path::PathBuf;

pub const SEEN_FILES_NAME: &str = "seen_files.json";
pub const COURSES_CONFIG_NAME: &str = "courses_config.json";

const DEFAULT_BASE_URL: &str = "https://canvas.instructure.com";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
// Stays under Gmail's 25 MB limit with buffer.
const DEFAULT_MAX_EMAIL_SIZE_MB: u64 = 20;

/// Runtime configuration, read from the environment once at startup and
/// passed by reference everywhere else.
#[derive(Debug, Clone)]
pub struct Config {
    pub canvas_base_url: String,
    pub api_token: String,
    pub mail_address: String,
    pub mail_app_password: String,
    pub smtp_host: String,
    pub state_dir: PathBuf,
    /// Maximum cumulative attachment size per email, in bytes.
    pub max_email_size: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_token = require_env("CANVAS_API_TOKEN")?;
        let mail_address = require_env("MAIL_ADDRESS")?;
        let mail_app_password = require_env("MAIL_APP_PASSWORD")?;

        let canvas_base_url = std::env::var("CANVAS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let smtp_host =
            std::env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string());
        let state_dir = std::env::var("CANVAS_WATCH_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let max_email_size_mb = match std::env::var("MAX_EMAIL_SIZE_MB") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid MAX_EMAIL_SIZE_MB: {raw}"))?,
            Err(_) => DEFAULT_MAX_EMAIL_SIZE_MB,
        };

        Ok(Self {
            canvas_base_url,
            api_token,
            mail_address,
            mail_app_password,
            smtp_host,
            state_dir,
            max_email_size: max_email_size_mb * 1024 * 1024,
        })
    }

    pub fn seen_files_path(&self) -> PathBuf {
        self.state_dir.join(SEEN_FILES_NAME)
    }

    pub fn courses_config_path(&self) -> PathBuf {
        self.state_dir.join(COURSES_CONFIG_NAME)
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => anyhow::bail!("{name} not set"),
    }
}
