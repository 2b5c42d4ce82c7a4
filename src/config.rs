//! Defines the configuration settings for the scrape-toolkit application.
//!
//! Settings are layered: built-in defaults, then a TOML file, then command
//! line flags and `SCRAPE_TOOLKIT_*` environment variables. The resulting
//! [`Config`] is passed explicitly to whatever needs it.

use crate::dedup::OutputOrder;
use crate::logging::LogContext;
use crate::table_io::TableIo;
use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to configuration file (TOML format)
    #[arg(long = "config", global = true, env = "SCRAPE_TOOLKIT_CONFIG")]
    pub config_file: Option<String>,

    /// Field delimiter for tabular files (single ASCII character)
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_DELIMITER")]
    pub delimiter: Option<char>,

    /// File extension considered tabular when merging a directory
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_EXTENSION")]
    pub extension: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// User agent string for HTTP requests
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Minimum sleep between requests (seconds)
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_MIN_SLEEP")]
    pub min_sleep: Option<f32>,

    /// Maximum sleep between requests (seconds)
    #[arg(long, global = true, env = "SCRAPE_TOOLKIT_MAX_SLEEP")]
    pub max_sleep: Option<f32>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    table: Option<TableFileConfig>,
    dedup: Option<DedupFileConfig>,
    network: Option<NetworkFileConfig>,
    logging: Option<LoggingFileConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct TableFileConfig {
    delimiter: Option<char>,
    extension: Option<String>,
    output_order: Option<OutputOrder>,
}

#[derive(Deserialize, Debug, Default)]
struct DedupFileConfig {
    identity_columns: Option<Vec<String>>,
    priority_columns: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct NetworkFileConfig {
    request_timeout: Option<u64>,
    user_agent: Option<String>,
    min_sleep: Option<f32>,
    max_sleep: Option<f32>,
}

#[derive(Deserialize, Debug, Default)]
struct LoggingFileConfig {
    level: Option<String>,
}

/// HTTP settings for the page fetcher.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Timeout for individual HTTP requests.
    pub request_timeout: Duration,
    /// User agent string to use for HTTP requests.
    pub user_agent: String,
    /// Minimum and maximum sleep duration between HTTP requests (seconds).
    pub sleep_between_requests: (f32, f32),
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string(),
            sleep_between_requests: (0.1, 0.5),
        }
    }
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Field delimiter for tabular files.
    pub delimiter: char,
    /// Extension of files picked up when merging a directory.
    pub extension: String,
    /// Emission order of deduplicated survivors.
    pub output_order: OutputOrder,
    /// Identity columns used when a dedup run names none.
    pub identity_columns: Vec<String>,
    /// Priority columns used when a dedup run names none.
    pub priority_columns: Vec<String>,
    /// HTTP settings.
    pub network: NetworkConfig,
    /// Default log level.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            delimiter: ',',
            extension: "csv".to_string(),
            output_order: OutputOrder::Ranked,
            identity_columns: Vec::new(),
            priority_columns: Vec::new(),
            network: NetworkConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Builds the table adapter for the configured format.
    pub fn table_io(&self, log: LogContext) -> TableIo {
        // validate_config guarantees an ASCII delimiter.
        TableIo::new(self.delimiter as u8, self.extension.clone(), log)
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(table) = &file_config.table {
        if let Some(delimiter) = table.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(extension) = &table.extension {
            config.extension = extension.clone();
        }
        if let Some(order) = table.output_order {
            config.output_order = order;
        }
    }

    if let Some(dedup) = &file_config.dedup {
        if let Some(columns) = &dedup.identity_columns {
            config.identity_columns = columns.clone();
        }
        if let Some(columns) = &dedup.priority_columns {
            config.priority_columns = columns.clone();
        }
    }

    if let Some(network) = &file_config.network {
        if let Some(timeout) = network.request_timeout {
            config.network.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(user_agent) = &network.user_agent {
            config.network.user_agent = user_agent.clone();
        }
        if let Some(min_sleep) = network.min_sleep {
            config.network.sleep_between_requests.0 = min_sleep;
        }
        if let Some(max_sleep) = network.max_sleep {
            config.network.sleep_between_requests.1 = max_sleep;
        }
    }

    if let Some(logging) = &file_config.logging {
        if let Some(level) = &logging.level {
            config.log_level = level.clone();
        }
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &GlobalArgs) {
    if let Some(delimiter) = args.delimiter {
        config.delimiter = delimiter;
    }
    if let Some(ref extension) = args.extension {
        config.extension = extension.clone();
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    if let Some(timeout) = args.request_timeout {
        config.network.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref agent) = args.user_agent {
        config.network.user_agent = agent.clone();
    }
    if let Some(min_sleep) = args.min_sleep {
        config.network.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = args.max_sleep {
        config.network.sleep_between_requests.1 = max_sleep;
    }
}

fn validate_config(config: &mut Config) -> anyhow::Result<()> {
    if !config.delimiter.is_ascii() {
        anyhow::bail!(
            "Delimiter must be a single ASCII character, got '{}'",
            config.delimiter
        );
    }

    let extension = config.extension.trim().trim_start_matches('.').to_string();
    if extension.is_empty() {
        config.extension = "csv".to_string();
        tracing::warn!("Tabular file extension was empty. Setting to csv.");
    } else {
        config.extension = extension;
    }

    let (min, max) = config.network.sleep_between_requests;
    if min < 0.0 || max < 0.0 {
        config.network.sleep_between_requests = (min.max(0.0), max.max(0.0));
        tracing::warn!("Negative sleep duration clamped to 0.");
    }
    if config.network.sleep_between_requests.0 > config.network.sleep_between_requests.1 {
        config.network.sleep_between_requests.1 = config.network.sleep_between_requests.0;
        tracing::warn!(
            "Min sleep was greater than max sleep. Setting both to {}",
            config.network.sleep_between_requests.0
        );
    }

    Ok(())
}

/// Builds the final configuration from defaults, a config file and `args`.
pub fn build_config(args: &GlobalArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        let file_config = load_config_file(file_path)?;
        apply_file_config(&mut config, &file_config);
    } else {
        for path in ["./scrape-toolkit.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {}", path, e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut config, args);

    validate_config(&mut config)?;

    tracing::debug!("Final configuration: {:?}", config);

    Ok(config)
}

/// A random politeness delay within the configured bounds.
pub fn get_random_sleep_duration(network: &NetworkConfig) -> Duration {
    use rand::Rng;
    let (min, max) = network.sleep_between_requests;
    if min >= max {
        return Duration::from_secs_f32(min);
    }
    let duration_secs = rand::thread_rng().gen_range(min..max);
    Duration::from_secs_f32(duration_secs)
}
