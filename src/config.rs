use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::auth::AuthPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be text or json (got '{}')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub auth_policy: AuthPolicy,
    pub login_path: String,
    pub session_ttl_secs: u64,
    pub mq_workers: usize,
    pub mq_poll_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let login_path = env::var("LOGIN_PATH").unwrap_or_else(|_| "/auth/basic".to_string());
        if !login_path.starts_with('/') {
            anyhow::bail!("LOGIN_PATH must start with '/'");
        }

        Ok(Config {
            server_port: parse_var("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            auth_policy: parse_var("AUTH_POLICY", AuthPolicy::Writes)?,
            login_path,
            session_ttl_secs: parse_var("SESSION_TTL_SECS", 86_400)?,
            mq_workers: parse_var("MQ_WORKERS", 2)?,
            mq_poll_timeout_secs: parse_var("MQ_POLL_TIMEOUT_SECS", 5)?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|raw| parse_origins(&raw))
                .filter(|origins| !origins.is_empty()),
            log_format: parse_var("LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_blanks() {
        assert_eq!(
            parse_origins("http://a.test, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
