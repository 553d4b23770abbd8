use std::env;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

/// What the request pipeline does after telling a blocked user off. The two
/// historical deployments of this bot disagreed: one returned immediately,
/// the other fell through and generated anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedRequestPolicy {
    Reject,
    Continue,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub admin_user_id: i64,
    pub users_file_path: String,
    pub lock_duration: Duration,
    pub blocked_request_policy: BlockedRequestPolicy,
    pub target_language: String,
    pub startup_message: String,
    pub shutdown_message: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_blocked_request_policy(value: &str) -> BlockedRequestPolicy {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return BlockedRequestPolicy::Reject;
    }

    match trimmed.to_lowercase().as_str() {
        "reject" | "return" | "stop" => BlockedRequestPolicy::Reject,
        "continue" | "fallthrough" => BlockedRequestPolicy::Continue,
        _ => {
            warn!(
                "Unknown BLOCKED_REQUEST_POLICY value '{}'; defaulting to reject.",
                value
            );
            BlockedRequestPolicy::Reject
        }
    }
}

fn normalize_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("BOT_TOKEN is required"));
        }

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            admin_user_id: env_i64("ADMIN_USER_ID", 0),
            users_file_path: env_string("USERS_FILE_PATH", "users.txt"),
            lock_duration: Duration::from_secs(env_u64("LOCK_DURATION_SECONDS", 10)),
            blocked_request_policy: normalize_blocked_request_policy(&env_string(
                "BLOCKED_REQUEST_POLICY",
                "reject",
            )),
            target_language: env_string("TARGET_LANGUAGE", "English"),
            startup_message: env_string(
                "STARTUP_MESSAGE",
                "The bot is back online. You can send image generation requests again.",
            ),
            shutdown_message: env_string(
                "SHUTDOWN_MESSAGE",
                "The bot is shutting down for a while. Contact the administrator to bring it back.",
            ),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.2),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            gemini_safety_settings: normalize_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_policy_parses_both_variants() {
        assert_eq!(
            normalize_blocked_request_policy("reject"),
            BlockedRequestPolicy::Reject
        );
        assert_eq!(
            normalize_blocked_request_policy("CONTINUE"),
            BlockedRequestPolicy::Continue
        );
        assert_eq!(
            normalize_blocked_request_policy(" fallthrough "),
            BlockedRequestPolicy::Continue
        );
    }

    #[test]
    fn blocked_policy_defaults_to_reject() {
        assert_eq!(
            normalize_blocked_request_policy(""),
            BlockedRequestPolicy::Reject
        );
        assert_eq!(
            normalize_blocked_request_policy("whatever"),
            BlockedRequestPolicy::Reject
        );
    }

    #[test]
    fn safety_settings_normalize_to_known_profiles() {
        assert_eq!(normalize_safety_settings("off".to_string()), "permissive");
        assert_eq!(
            normalize_safety_settings("Standard".to_string()),
            "standard"
        );
        assert_eq!(normalize_safety_settings("bogus".to_string()), "permissive");
        assert_eq!(normalize_safety_settings(String::new()), "permissive");
    }
}
