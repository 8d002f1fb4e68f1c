use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::{Error, Result};

/// Which health-check response shape the backend speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HealthContract {
    /// `{ "detail": 0 | 1 | null }`, served from `/ping`.
    #[default]
    Detail,
    /// Legacy `{ "status": "ok" }`, served from `/health`.
    Status,
}

impl HealthContract {
    pub fn default_path(&self) -> &'static str {
        match self {
            HealthContract::Detail => "/ping",
            HealthContract::Status => "/health",
        }
    }
}

impl FromStr for HealthContract {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detail" => Ok(HealthContract::Detail),
            "status" => Ok(HealthContract::Status),
            other => Err(format!("unknown health contract '{}'", other)),
        }
    }
}

impl fmt::Display for HealthContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthContract::Detail => f.write_str("detail"),
            HealthContract::Status => f.write_str("status"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL prefix, without a trailing slash
    pub backend_url: String,
    pub health_contract: HealthContract,
    pub health_path: String,
    pub poll_interval: Duration,
    pub download_poll_interval: Duration,
    /// Transport timeout per request; `None` leaves requests unbounded
    pub request_timeout: Option<Duration>,
}

impl Config {
    const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
    const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
    const DEFAULT_DOWNLOAD_POLL_INTERVAL_MS: u64 = 2000;

    /// Build a config for `backend_url` with every other setting at its default.
    pub fn new(backend_url: &str) -> Result<Self> {
        let backend_url = normalize_base(backend_url)?;
        let health_contract = HealthContract::default();
        Ok(Self {
            backend_url,
            health_contract,
            health_path: health_contract.default_path().to_string(),
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
            download_poll_interval: Duration::from_millis(Self::DEFAULT_DOWNLOAD_POLL_INTERVAL_MS),
            request_timeout: None,
        })
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("HOSTPANEL_BACKEND_URL")
            .and_then(|raw| match normalize_base(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("{}, falling back to {}", e, Self::DEFAULT_BACKEND_URL);
                    None
                }
            })
            .unwrap_or_else(|| Self::DEFAULT_BACKEND_URL.to_string());

        let health_contract = lookup("HOSTPANEL_HEALTH_CONTRACT")
            .and_then(|raw| match raw.parse::<HealthContract>() {
                Ok(contract) => Some(contract),
                Err(e) => {
                    warn!("{}, using the detail contract", e);
                    None
                }
            })
            .unwrap_or_default();

        let health_path = lookup("HOSTPANEL_HEALTH_PATH")
            .filter(|path| path.starts_with('/'))
            .unwrap_or_else(|| health_contract.default_path().to_string());

        let poll_interval = millis_or(
            &lookup,
            "HOSTPANEL_POLL_INTERVAL_MS",
            Self::DEFAULT_POLL_INTERVAL_MS,
        );
        let download_poll_interval = millis_or(
            &lookup,
            "HOSTPANEL_DOWNLOAD_POLL_INTERVAL_MS",
            Self::DEFAULT_DOWNLOAD_POLL_INTERVAL_MS,
        );

        let request_timeout = lookup("HOSTPANEL_REQUEST_TIMEOUT_MS").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    warn!("HOSTPANEL_REQUEST_TIMEOUT_MS='{}' ignored, requests have no timeout", raw);
                    None
                }
            }
        });

        Self {
            backend_url,
            health_contract,
            health_path,
            poll_interval,
            download_poll_interval,
            request_timeout,
        }
    }

    /// Point the config at another backend, keeping every other setting.
    pub fn with_backend_url(mut self, backend_url: &str) -> Result<Self> {
        self.backend_url = normalize_base(backend_url)?;
        Ok(self)
    }

    pub fn with_health_contract(mut self, contract: HealthContract) -> Self {
        self.health_contract = contract;
        self.health_path = contract.default_path().to_string();
        self
    }

    /// Resolve an absolute http(s) URL or a `/`-prefixed path against the backend URL.
    ///
    /// The result is normalized (lowercase host, default port dropped), so equal
    /// endpoints resolve to equal strings.
    pub fn resolve(&self, target: &str) -> Result<String> {
        let target = target.trim();
        let parsed = match target.strip_prefix('/') {
            Some(path) => Url::parse(&format!("{}/", self.backend_url))
                .and_then(|base| base.join(path)),
            None => Url::parse(target),
        };
        let url = parsed.map_err(|e| Error::InvalidUrl(format!("{} ({})", target, e)))?;
        ensure_http(&url, target)?;
        Ok(url.into())
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.backend_url, self.health_path)
    }
}

fn normalize_base(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{} ({})", trimmed, e)))?;
    ensure_http(&url, trimmed)?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::InvalidUrl(format!(
            "{} (a base URL cannot carry a query or fragment)",
            trimmed
        )));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn ensure_http(url: &Url, raw: &str) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!("{} (scheme must be http or https)", raw)));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("{} (missing host)", raw)));
    }
    Ok(())
}

fn millis_or<F>(lookup: &F, key: &str, default_ms: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let ms = match lookup(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                warn!("{}='{}' is not a positive integer, using {}ms", key, raw, default_ms);
                default_ms
            }
        },
        None => default_ms,
    };
    Duration::from_millis(ms)
}
