use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::normalize_identity, engine::PurgePolicy, errors::Error,
    messaging::throttled::ThrottleConfig, Result,
};

/// Typed configuration for the relay bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub admin_users: Vec<String>,

    // Storage
    pub database_path: PathBuf,
    pub database_max_connections: u32,

    // Relay
    pub relay_max_concurrency: usize,
    pub purge_policy: PurgePolicy,

    // Rate limiting (outbound)
    pub throttle_enabled: bool,
    pub throttle: ThrottleConfig,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);
        let env_u64 = |key: &str| env_str(key).and_then(|s| s.trim().parse::<u64>().ok());
        let env_bool = |key: &str| {
            env_str(key).map(|s| {
                matches!(
                    s.trim().to_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
        };

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let admin_users = parse_csv_identities(env_str("RELAY_ADMIN_USERS"));

        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if admin_users.is_empty() {
            return Err(Error::Config(
                "RELAY_ADMIN_USERS environment variable is required".to_string(),
            ));
        }

        let database_path =
            PathBuf::from(env_str("DATABASE_PATH").unwrap_or("bot_db.sqlite".to_string()));
        let database_max_connections = env_u64("DATABASE_MAX_CONNECTIONS")
            .unwrap_or(4)
            .clamp(1, 64) as u32;

        let relay_max_concurrency = env_u64("RELAY_MAX_CONCURRENCY").unwrap_or(8).max(1) as usize;
        let purge_policy = match env_str("RELAY_PURGE_POLICY") {
            Some(raw) => raw.parse::<PurgePolicy>()?,
            None => PurgePolicy::default(),
        };

        let defaults = ThrottleConfig::default();
        let throttle_enabled = env_bool("THROTTLE_ENABLED").unwrap_or(true);
        let throttle = ThrottleConfig {
            global_min_interval: env_u64("THROTTLE_GLOBAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.global_min_interval),
            per_chat_min_interval: env_u64("THROTTLE_PER_CHAT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_chat_min_interval),
        };

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/relaybot-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            admin_users,
            database_path,
            database_max_connections,
            relay_max_concurrency,
            purge_policy,
            throttle_enabled,
            throttle,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_csv_identities(v: Option<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in v.unwrap_or_default().split(',').filter_map(normalize_identity) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
