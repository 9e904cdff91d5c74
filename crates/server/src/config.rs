// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use xapp_core::llm::groq::{DEFAULT_MODEL, GROQ_API_BASE};
use xapp_core::llm::GroqConfig;
use xapp_core::store::SupabaseConfig;
use xapp_core::{PlatformTable, PlatformTableError};
use xapp_observability::{LogConfig, LogFormat};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SUPABASE_URL and SUPABASE_ANON_KEY must be set together")]
    PartialSupabase,

    #[error(transparent)]
    Platforms(#[from] PlatformTableError),
}

#[derive(Clone, Parser)]
#[command(name = "xapp-server", version, about = "Build orchestration and live progress server")]
pub struct Config {
    #[arg(long, env = "XAPP_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Falls back to `PORT`, then 8000.
    #[arg(long, env = "XAPP_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: String,

    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_MODEL)]
    pub groq_model: String,

    #[arg(long, env = "GROQ_BASE_URL", default_value = GROQ_API_BASE)]
    pub groq_base_url: String,

    #[arg(long, env = "GROQ_TIMEOUT_SECS", default_value_t = 60)]
    pub groq_timeout_secs: u64,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,

    /// Directory under which per-job sandboxes are created.
    #[arg(long, env = "XAPP_SANDBOX_ROOT")]
    pub sandbox_root: Option<PathBuf>,

    /// TOML platform table replacing the built-in one.
    #[arg(long, env = "XAPP_PLATFORMS")]
    pub platforms: Option<PathBuf>,

    /// Reject builds for projects missing from the project store.
    #[arg(long, env = "XAPP_REQUIRE_KNOWN_PROJECT")]
    pub require_known_project: bool,

    #[arg(long, env = "XAPP_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Also write JSON logs to daily files in this directory.
    #[arg(long, env = "XAPP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Where project records live.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Supabase(SupabaseConfig),
    Memory,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        let port = self
            .port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT);
        SocketAddr::new(self.host, port)
    }

    pub fn groq(&self) -> GroqConfig {
        GroqConfig::new(&self.groq_api_key)
            .with_model(&self.groq_model)
            .with_base_url(&self.groq_base_url)
            .with_timeout(Duration::from_secs(self.groq_timeout_secs))
    }

    pub fn store_backend(&self) -> Result<StoreBackend, ConfigError> {
        let url = self.supabase_url.as_deref().filter(|s| !s.trim().is_empty());
        let key = self.supabase_anon_key.as_deref().filter(|s| !s.trim().is_empty());
        match (url, key) {
            (Some(url), Some(key)) => Ok(StoreBackend::Supabase(SupabaseConfig::new(url, key))),
            (None, None) => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::PartialSupabase),
        }
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.sandbox_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("xapp-sandboxes"))
    }

    pub fn platform_table(&self) -> Result<PlatformTable, ConfigError> {
        match &self.platforms {
            Some(path) => Ok(PlatformTable::load(path)?),
            None => Ok(PlatformTable::builtin()),
        }
    }

    pub fn log(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            log_dir: self.log_dir.clone(),
            ..LogConfig::default()
        }
    }
}
