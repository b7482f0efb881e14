use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    /// JSON snapshot loaded at startup and written on shutdown
    pub data_file: Option<PathBuf>,
    /// Upper bound on concurrent child lookups; `None` is unbounded
    pub fanout_limit: Option<usize>,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: default_bind(),
            data_file: None,
            fanout_limit: None,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            data_file: cli_data_file,
            fanout_limit: cli_fanout_limit,
            shutdown_timeout_secs: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            data_file: file_data_file,
            fanout_limit: file_fanout_limit,
            shutdown_timeout_secs: file_shutdown_timeout,
        } = file_config;

        let http_bind_address = cli_http_bind.or(file_http_bind).unwrap_or_else(default_bind);

        Ok(Self {
            http_bind_address,
            data_file: cli_data_file.or(file_data_file),
            fanout_limit: cli_fanout_limit.or(file_fanout_limit),
            shutdown_timeout_secs: cli_shutdown_timeout
                .or(file_shutdown_timeout)
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        })
    }

    /// Fail fast on settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.fanout_limit {
            anyhow::ensure!(limit >= 1, "fanout limit must be at least 1, got {limit}");
        }
        anyhow::ensure!(
            self.shutdown_timeout_secs >= 1,
            "shutdown timeout must be at least 1 second"
        );
        if let Some(path) = self.data_file.as_ref() {
            anyhow::ensure!(
                !path.is_dir(),
                "data file {:?} is a directory",
                path
            );
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "dictionary-service",
    about = "Polish/English dictionary service",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "DICTIONARY_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "DICTIONARY_DATA_FILE",
        value_name = "FILE",
        help = "JSON snapshot to load at startup and write on shutdown"
    )]
    pub data_file: Option<PathBuf>,

    #[arg(
        long,
        env = "DICTIONARY_FANOUT_LIMIT",
        value_name = "N",
        help = "Maximum concurrent child lookups (unbounded when unset)",
        value_parser = clap::value_parser!(usize)
    )]
    pub fanout_limit: Option<usize>,

    #[arg(
        long,
        env = "DICTIONARY_SHUTDOWN_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Time allowed for draining requests and flushing the snapshot"
    )]
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    data_file: Option<PathBuf>,
    fanout_limit: Option<usize>,
    shutdown_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
