use std::{env, fs, path::Path, time::Duration};

use crate::{claim::DEFAULT_LOOKUP_BASE_URL, errors::Error, Result};

const KV_API_BASE: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_KV_ACCOUNT_ID: &str = "6dccc8a823380a32fe8792904b2cd886";
const DEFAULT_KV_NAMESPACE_ID: &str = "b44b93e4cc174443aca099a3763b29ff";

/// Typed configuration, read once at startup and shared via `Arc`.
#[derive(Clone)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,

    // KV store
    pub kv_api_token: String,
    pub kv_account_id: String,
    pub kv_namespace_id: String,
    pub kv_http_timeout: Duration,

    // Responses
    pub lookup_base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("kv_api_token", &"<redacted>")
            .field("kv_account_id", &self.kv_account_id)
            .field("kv_namespace_id", &self.kv_namespace_id)
            .field("kv_http_timeout", &self.kv_http_timeout)
            .field("lookup_base_url", &self.lookup_base_url)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Required
        let telegram_bot_token = get("VANITY_BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| get("VIP_VANITY_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("VANITY_BOT_TOKEN environment variable is required".to_string())
            })?;
        let kv_api_token = get("CF_API_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("CF_API_TOKEN environment variable is required".to_string())
        })?;

        // Store location (fixed unless overridden for staging)
        let kv_account_id = get("KV_ACCOUNT_ID")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_KV_ACCOUNT_ID.to_string());
        let kv_namespace_id = get("KV_NAMESPACE_ID")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_KV_NAMESPACE_ID.to_string());
        let kv_http_timeout = match get("KV_HTTP_TIMEOUT_MS").and_then(non_empty) {
            Some(raw) => parse_timeout_ms(&raw)?,
            None => Duration::from_millis(10_000),
        };

        let lookup_base_url = get("LOOKUP_BASE_URL")
            .and_then(non_empty)
            .map(with_trailing_slash)
            .unwrap_or_else(|| DEFAULT_LOOKUP_BASE_URL.to_string());

        Ok(Self {
            telegram_bot_token,
            kv_api_token,
            kv_account_id,
            kv_namespace_id,
            kv_http_timeout,
            lookup_base_url,
        })
    }

    fn namespace_url(&self) -> String {
        format!(
            "{KV_API_BASE}/accounts/{}/storage/kv/namespaces/{}",
            self.kv_account_id, self.kv_namespace_id
        )
    }

    /// Base of the per-key metadata endpoint; the alias is appended.
    pub fn kv_metadata_url(&self) -> String {
        format!("{}/metadata/", self.namespace_url())
    }

    /// Base of the per-key values endpoint; the alias is appended.
    pub fn kv_values_url(&self) -> String {
        format!("{}/values/", self.namespace_url())
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
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

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_timeout_ms(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(Error::Config(format!(
            "KV_HTTP_TIMEOUT_MS must be a positive number of milliseconds, got {raw:?}"
        ))),
    }
}

fn with_trailing_slash(s: String) -> String {
    if s.ends_with('/') {
        s
    } else {
        format!("{s}/")
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
