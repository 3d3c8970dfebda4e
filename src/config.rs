use serde::Deserialize;
use std::{env, fs, time::Duration};

const DEFAULT_ENDPOINT: &str = "http://controller:35357/v2.0";
const DEFAULT_USER: &str = "admin";
const DEFAULT_TENANT: &str = "admin";
const DEFAULT_TIMEOUT_SECS: u64 = 1;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_RETRY_COUNT: u32 = 0;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_CONFIG_PATH: &str = "ceilometer-agent.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub service_endpoint: String,
    pub service_user: String,
    pub service_tenant: String,
    pub service_password: String,
    pub service_timeout_secs: u64,
    pub log_file: Option<String>,
    pub report_log_file: Option<String>,
    pub metric_prefix: String,
    pub poll_interval_secs: u64,
    /// 0 means retry forever.
    pub retry_count: u32,
    pub retry_delay_secs: u64,
    pub verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    service_endpoint: Option<String>,
    service_user: Option<String>,
    service_tenant: Option<String>,
    service_password: Option<String>,
    service_timeout: Option<u64>,
    log_file: Option<String>,
    report_log_file: Option<String>,
    metric_prefix: Option<String>,
    poll_interval_secs: Option<u64>,
    retry_count: Option<u32>,
    retry_delay_secs: Option<u64>,
}

impl Config {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().collect();
        Self::from_arg_list(&args)
    }

    fn from_arg_list(args: &[String]) -> Result<Self, ConfigError> {
        let verbose = args.iter().any(|arg| arg == "-v");

        let config_path = args
            .iter()
            .position(|arg| arg == "--config" || arg == "-c")
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_CONFIG_PATH);

        // A missing config file behaves as an empty one; required settings
        // are enforced during resolution.
        let config_str = fs::read_to_string(config_path).unwrap_or_default();
        let file_config: FileConfig = if config_str.is_empty() {
            FileConfig::default()
        } else {
            toml::from_str(&config_str).map_err(|e| ConfigError::Parse(e.to_string()))?
        };

        Self::resolve(file_config, verbose)
    }

    fn resolve(file: FileConfig, verbose: bool) -> Result<Self, ConfigError> {
        let service_password = file.service_password.ok_or(ConfigError::MissingPassword)?;

        Ok(Config {
            service_endpoint: file
                .service_endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            service_user: file.service_user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            service_tenant: file
                .service_tenant
                .unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            service_password,
            service_timeout_secs: file.service_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            log_file: file.log_file,
            report_log_file: file.report_log_file,
            metric_prefix: file.metric_prefix.unwrap_or_default(),
            poll_interval_secs: file.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            retry_count: file.retry_count.unwrap_or(DEFAULT_RETRY_COUNT),
            retry_delay_secs: file.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            verbose,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingPassword,
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingPassword => {
                write!(f, "service_password is required and there is no default configured")
            }
            ConfigError::Parse(e) => write!(f, "Invalid config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
