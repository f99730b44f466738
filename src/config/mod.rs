//! Configuration: CLI flags mapped 1:1 onto environment variables, merged
//! defaults ← file ← CLI, the same three-tier precedence the crawl config
//! this broker grew out of already used.

mod file;

pub use file::FileConfig;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageResponses {
    Allow,
    Omit,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// CLI surface, per spec.md §6. Every flag doubles as an environment variable
/// via clap's `env` attribute so deployments can configure the broker
/// without a wrapper script.
#[derive(Debug, Clone, Parser)]
#[command(name = "browser-broker", version)]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1", env = "BROKER_HOST")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 8831, env = "BROKER_PORT")]
    pub port: u16,

    #[arg(long, default_value = "chromium", env = "BROKER_BROWSER")]
    pub browser: String,

    #[arg(long, default_value_t = true, env = "BROKER_HEADLESS")]
    pub headless: bool,

    #[arg(long, env = "BROKER_USER_DATA_DIR")]
    pub user_data_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false, env = "BROKER_ISOLATED")]
    pub isolated: bool,

    #[arg(long, value_delimiter = ',', env = "BROKER_ALLOWED_ORIGINS")]
    pub allowed_origins: Vec<String>,

    #[arg(long, value_delimiter = ',', env = "BROKER_BLOCKED_ORIGINS")]
    pub blocked_origins: Vec<String>,

    #[arg(long, default_value_t = false, env = "BROKER_BLOCK_SERVICE_WORKERS")]
    pub block_service_workers: bool,

    #[arg(long, env = "BROKER_PROXY_SERVER")]
    pub proxy_server: Option<String>,

    #[arg(long, env = "BROKER_PROXY_BYPASS")]
    pub proxy_bypass: Option<String>,

    /// "W,H", e.g. "1280,720"
    #[arg(long, env = "BROKER_VIEWPORT_SIZE")]
    pub viewport_size: Option<String>,

    #[arg(long, env = "BROKER_USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long, env = "BROKER_DEVICE")]
    pub device: Option<String>,

    #[arg(long, default_value_t = false, env = "BROKER_IGNORE_HTTPS_ERRORS")]
    pub ignore_https_errors: bool,

    #[arg(long, env = "BROKER_STORAGE_STATE")]
    pub storage_state: Option<PathBuf>,

    #[arg(long, env = "BROKER_SAVE_TRACE")]
    pub save_trace: Option<PathBuf>,

    #[arg(long, default_value = "./broker-data", env = "BROKER_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[arg(long, env = "BROKER_CAPS")]
    pub caps: Option<String>,

    #[arg(long, env = "BROKER_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BROKER_CDP_ENDPOINT")]
    pub cdp_endpoint: Option<String>,

    #[arg(long, default_value_t = false, env = "BROKER_VISION")]
    pub vision: bool,

    #[arg(long, value_enum, default_value_t = ImageResponses::Auto, env = "BROKER_IMAGE_RESPONSES")]
    pub image_responses: ImageResponses,

    #[arg(long, default_value_t = false, env = "BROKER_NO_SANDBOX")]
    pub no_sandbox: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "BROKER_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[arg(long, default_value = "info", env = "BROKER_LOG_LEVEL")]
    pub log_level: String,

    // -- auth fan-in, per spec.md §6 env var table --
    #[arg(long, env = "SERVER_BASE_URL")]
    pub server_base_url: Option<String>,

    #[arg(long, default_value_t = false, env = "ENTRA_AUTH_ENABLED")]
    pub entra_auth_enabled: bool,

    #[arg(long, env = "AZURE_TENANT_ID")]
    pub azure_tenant_id: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub azure_client_id: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_SECRET")]
    pub azure_client_secret: Option<String>,

    #[arg(long, default_value_t = false, env = "API_KEY_AUTH_ENABLED")]
    pub api_key_auth_enabled: bool,

    #[arg(long, value_delimiter = ',', env = "API_KEYS")]
    pub api_keys: Vec<String>,

    #[arg(long, default_value_t = false, env = "TUNNEL_AUTH_ENABLED")]
    pub tunnel_auth_enabled: bool,

    #[arg(long, value_delimiter = ',', env = "TUNNEL_ALLOWED_DOMAINS")]
    pub tunnel_allowed_domains: Vec<String>,

    #[arg(long, default_value_t = false, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    #[arg(long, default_value_t = false, env = "MANAGED_IDENTITY_ENABLED")]
    pub managed_identity_enabled: bool,

    #[arg(long, env = "AZURE_KEY_VAULT_URL")]
    pub azure_key_vault_url: Option<String>,

    #[arg(long, default_value_t = false, env = "ALLOW_ANONYMOUS_ACCESS")]
    pub allow_anonymous_access: bool,

    #[arg(long, value_delimiter = ',', env = "REQUIRED_ROLES")]
    pub required_roles: Vec<String>,

    #[arg(long, default_value_t = 64, env = "MAX_CONCURRENT_SESSIONS")]
    pub max_concurrent_sessions: usize,

    #[arg(long, default_value_t = 1_800_000, env = "SESSION_TIMEOUT_MS")]
    pub session_timeout_ms: u64,

    #[arg(long, default_value_t = false, env = "AUDIT_LOGGING_ENABLED")]
    pub audit_logging_enabled: bool,
}

impl Cli {
    /// Parse CLI args, then merge in an optional TOML config file layer
    /// (defaults ← file ← CLI: explicit CLI flags always win over the file,
    /// which in turn wins over `clap`'s built-in defaults).
    #[must_use]
    pub fn load() -> Self {
        let mut cli = Self::parse();
        if let Some(path) = cli.config.clone() {
            match FileConfig::load(&path) {
                Ok(file) => file.merge_into(&mut cli),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read config file, using CLI/env only");
                }
            }
        }
        cli
    }

    #[must_use]
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }
}
