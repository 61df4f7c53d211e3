use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Snapshot file written under `--data-dir`.
pub const SNAPSHOT_FILE: &str = "store.json";

#[derive(Parser, Debug, Clone)]
#[command(name = "rfqhub-server", about = "RFQ sourcing marketplace service")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "RFQHUB_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// HTTP port to listen on (0 picks a free port).
    #[arg(long, env = "RFQHUB_PORT", default_value_t = 3080)]
    pub port: u16,

    /// Directory holding the store snapshot and uploaded files
    /// (default: platform data dir + "/rfqhub").
    #[arg(long, env = "RFQHUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing is written to disk.
    #[arg(long, env = "RFQHUB_IN_MEMORY")]
    pub in_memory: bool,

    /// Root directory for uploaded files (default: <data-dir>/files).
    #[arg(long, env = "RFQHUB_FILES_DIR")]
    pub files_dir: Option<PathBuf>,

    /// Base URL used when returning links to uploaded files.
    #[arg(long, env = "RFQHUB_PUBLIC_URL", default_value = "http://localhost:3080")]
    pub public_url: String,

    /// HS256 secret for bearer tokens.
    #[arg(long, env = "RFQHUB_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued bearer tokens.
    #[arg(long, env = "RFQHUB_TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// Admin profile created at startup if missing (requires --admin-password).
    #[arg(long, env = "RFQHUB_ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "RFQHUB_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// OpenAI-compatible chat completions endpoint. Without it every insight
    /// is the static fallback.
    #[arg(long, env = "RFQHUB_LLM_URL")]
    pub llm_url: Option<String>,

    #[arg(long, env = "RFQHUB_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "RFQHUB_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Upper bound on a single model call before falling back.
    #[arg(long, env = "RFQHUB_LLM_TIMEOUT_SECS", default_value_t = 10)]
    pub llm_timeout_secs: u64,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("rfqhub")
        })
    }

    /// `None` when running in memory.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        (!self.in_memory).then(|| self.data_dir().join(SNAPSHOT_FILE))
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("files"))
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
