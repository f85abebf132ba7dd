use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_LIST_BYTES: u64 = 5 * 1024 * 1024;
/// Bot API upload cap for bots not running a local API server.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Typed process configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,

    // HTTP server (health + webhook)
    pub webhook_base_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Telegram limits
    pub max_upload_bytes: u64,

    // Engine
    pub engine: EngineConfig,
}

/// The engine-facing subset of [`Config`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Flat root every transfer writes into.
    pub download_dir: PathBuf,
    /// Bounds the wait for response headers and for each body chunk.
    pub request_timeout: Duration,
    pub chunk_size: usize,
    /// Pause between batch items (never after the last one).
    pub batch_pause: Duration,
    /// Hosts that are known to serve private/locked content.
    pub locked_hosts: Vec<String>,
    pub allow_insecure_http: bool,
    pub max_list_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
            locked_hosts: Vec::new(),
            allow_insecure_http: false,
            max_list_bytes: DEFAULT_MAX_LIST_BYTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let webhook_base_url = env_str("WEBHOOK_BASE_URL")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string());
        let host = env_str("HOST")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_str("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {raw}")))?,
            None => 5000,
        };

        let max_upload_bytes = env_u64("MAX_UPLOAD_BYTES").unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let download_dir =
            PathBuf::from(env_str("DOWNLOAD_DIR").unwrap_or_else(|| "downloads".to_string()));
        if download_dir.exists() && !download_dir.is_dir() {
            return Err(Error::InvalidPath {
                path: download_dir,
                reason: "DOWNLOAD_DIR exists but is not a directory".to_string(),
            });
        }
        fs::create_dir_all(&download_dir)?;

        let request_timeout = env_u64("REQUEST_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let chunk_size = env_usize("CHUNK_SIZE_KB")
            .filter(|kb| *kb > 0)
            .map(|kb| kb * 1024)
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let batch_pause = env_u64("BATCH_PAUSE_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BATCH_PAUSE);

        Ok(Self {
            telegram_bot_token,
            webhook_base_url,
            host,
            port,
            max_upload_bytes,
            engine: EngineConfig {
                download_dir,
                request_timeout,
                chunk_size,
                batch_pause,
                locked_hosts: parse_csv_lower(env_str("LOCKED_HOSTS")),
                allow_insecure_http: env_bool("ALLOW_INSECURE_HTTP").unwrap_or(false),
                max_list_bytes: env_u64("MAX_LIST_BYTES").unwrap_or(DEFAULT_MAX_LIST_BYTES),
            },
        })
    }

    /// `<base>/webhook` when webhook delivery is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_base_url
            .as_ref()
            .map(|base| format!("{base}/webhook"))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
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

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_hosts_are_trimmed_and_lowercased() {
        let hosts = parse_csv_lower(Some(" CDN.Example.com, ,private.io ".to_string()));
        assert_eq!(hosts, vec!["cdn.example.com", "private.io"]);
        assert!(parse_csv_lower(None).is_empty());
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_spellings() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("x"), "x");
    }

    #[test]
    fn engine_defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.chunk_size, 64 * 1024);
        assert_eq!(cfg.request_timeout, Duration::from_secs(90));
        assert!(!cfg.allow_insecure_http);
        assert!(cfg.locked_hosts.is_empty());
    }
}
