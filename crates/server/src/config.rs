//! Process configuration (§3 "ProcessConfig (ambient)"): CLI args / environment
//! variables with documented defaults, loaded once and immutable for the
//! process lifetime.

use std::path::PathBuf;

use clap::Parser;

use ssrender_core::RenderCoreConfig;

/// ssrender-server - server-side rendering for bundled JavaScript entry points.
#[derive(Parser, Debug, Clone)]
#[command(name = "ssrender-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Host address to bind the server to.
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, short, default_value = "3000", env = "PORT")]
    pub port: u16,

    /// Path to the shared-secret file. Required unless `--dev` is set.
    #[arg(long, env = "SECRET_FILE")]
    pub secret_file: Option<PathBuf>,

    /// Skip the secret check (local development only).
    #[arg(long, env = "DEV_MODE")]
    pub dev: bool,

    /// Number of dedicated sandbox worker threads.
    #[arg(long, default_value = "4", env = "WORKER_COUNT")]
    pub worker_count: usize,

    /// Maximum render jobs queued per worker before it reports no capacity.
    #[arg(long, default_value = "100", env = "MAX_PENDING")]
    pub max_pending: usize,

    /// Total attempts (including the first) per package fetch.
    #[arg(long, default_value = "3", env = "FETCH_ATTEMPTS")]
    pub fetch_attempts: u32,

    /// Per-attempt fetch timeout, in milliseconds.
    #[arg(long, default_value = "60000", env = "FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,

    /// Apollo-like network shim request timeout, in milliseconds.
    #[arg(long, default_value = "1000", env = "APOLLO_TIMEOUT_MS")]
    pub apollo_timeout_ms: u64,

    /// Overall render-callback-await timeout, in milliseconds.
    #[arg(long, default_value = "30000", env = "RENDER_TIMEOUT_MS")]
    pub render_timeout_ms: u64,

    /// Package cache capacity (number of distinct URLs retained).
    #[arg(long, default_value = "10000", env = "CACHE_MAX_ENTRIES")]
    pub cache_max_entries: usize,

    /// Log level / filter directive passed to `tracing_subscriber::EnvFilter`.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

/// Validated process configuration, built once from `Cli` at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub secret_file: Option<PathBuf>,
    pub dev_mode: bool,
    pub log_level: String,
    pub core: RenderCoreConfig,
}

impl ServerConfig {
    pub fn from_cli(cli: Cli) -> ssrender_core::Result<Self> {
        let core = RenderCoreConfig::new(
            cli.worker_count,
            cli.max_pending,
            cli.fetch_attempts,
            cli.fetch_timeout_ms,
            cli.apollo_timeout_ms,
            cli.render_timeout_ms,
            cli.cache_max_entries,
        )?;

        Ok(Self {
            host: cli.host,
            port: cli.port,
            secret_file: cli.secret_file,
            dev_mode: cli.dev,
            log_level: cli.log_level,
            core,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> Cli {
        Cli {
            host: "0.0.0.0".to_string(),
            port: 3000,
            secret_file: None,
            dev: true,
            worker_count: 4,
            max_pending: 100,
            fetch_attempts: 3,
            fetch_timeout_ms: 60_000,
            apollo_timeout_ms: 1_000,
            render_timeout_ms: 30_000,
            cache_max_entries: 10_000,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_from_cli_builds_core_config() {
        let config = ServerConfig::from_cli(cli()).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.core.worker_count, 4);
    }

    #[test]
    fn test_from_cli_rejects_invalid_worker_count() {
        let mut bad = cli();
        bad.worker_count = 0;
        assert!(ServerConfig::from_cli(bad).is_err());
    }
}
