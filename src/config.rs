use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::conversation::DEFAULT_CONTEXT_WINDOW_CHARS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub database_path: String,
    pub log_level: String,
    pub http_port: u16,
    pub simulate_typing: bool,
    pub analysis_word_ceiling: usize,
    pub context_window_chars: usize,
    pub chat_rate_limit_per_minute: usize,
    pub client_rate_limit_per_minute: usize,
    pub session_idle_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "assistant.db".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            http_port: parse_var("HTTP_PORT", 8080)?,
            simulate_typing: parse_var("SIMULATE_TYPING", true)?,
            analysis_word_ceiling: parse_var("ANALYSIS_WORD_CEILING", 250)?,
            context_window_chars: parse_var("CONTEXT_WINDOW_CHARS", DEFAULT_CONTEXT_WINDOW_CHARS)?,
            chat_rate_limit_per_minute: parse_var("CHAT_RATE_LIMIT_PER_MINUTE", 20)?,
            client_rate_limit_per_minute: parse_var("CLIENT_RATE_LIMIT_PER_MINUTE", 60)?,
            session_idle_minutes: parse_var("SESSION_IDLE_MINUTES", 30)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
