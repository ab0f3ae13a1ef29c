use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, export::ExportFormat, Result};

/// Where chats and contacts come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    /// HTTP bridge that owns the live account connection.
    Bridge { url: String, token: Option<String> },
    /// Offline JSON snapshot.
    Snapshot { path: PathBuf },
}

/// Typed configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendConfig,
    pub default_groups: Vec<String>,

    // Export
    pub export_format: ExportFormat,
    pub export_dir: PathBuf,
    pub sheet_name: String,

    // Timeouts
    pub lookup_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub ready_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bridge_url = var("GME_BRIDGE_URL").and_then(non_empty);
        let snapshot_path = var("GME_SNAPSHOT_PATH")
            .and_then(non_empty)
            .map(PathBuf::from);

        let backend = match (bridge_url, snapshot_path) {
            (Some(url), _) => BackendConfig::Bridge {
                url: url.trim_end_matches('/').to_string(),
                token: var("GME_BRIDGE_TOKEN").and_then(non_empty),
            },
            (None, Some(path)) => BackendConfig::Snapshot { path },
            (None, None) => {
                return Err(Error::Config(
                    "GME_BRIDGE_URL or GME_SNAPSHOT_PATH environment variable is required"
                        .to_string(),
                ))
            }
        };

        let default_groups = parse_csv(var("GME_GROUPS"));

        let export_format = var("GME_EXPORT_FORMAT")
            .and_then(non_empty)
            .unwrap_or_else(|| "csv".to_string())
            .parse::<ExportFormat>()
            .map_err(|e| Error::Config(format!("GME_EXPORT_FORMAT: {e}")))?;
        let export_dir = PathBuf::from(
            var("GME_EXPORT_DIR")
                .and_then(non_empty)
                .unwrap_or_else(|| "/tmp/group-member-export".to_string()),
        );
        let sheet_name = var("GME_SHEET_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| crate::export::DEFAULT_SHEET_NAME.to_string());

        // 0 / unset means no per-lookup timeout.
        let lookup_timeout = parse_u64(var("GME_LOOKUP_TIMEOUT_MS"))
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let request_timeout =
            Duration::from_millis(parse_u64(var("GME_REQUEST_TIMEOUT_MS")).unwrap_or(10_000));
        let ready_timeout =
            Duration::from_millis(parse_u64(var("GME_READY_TIMEOUT_MS")).unwrap_or(60_000));

        Ok(Self {
            backend,
            default_groups,
            export_format,
            export_dir,
            sheet_name,
            lookup_timeout,
            request_timeout,
            ready_timeout,
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

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
