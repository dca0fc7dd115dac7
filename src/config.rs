use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub graph: GraphConfig,
    pub metrics: MetricsConfig,
    pub remediation: RemediationConfig,
    pub validation: ValidationConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// Location of the single JSON knowledge-store document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub memory_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { memory_path: "data/memory.json".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,forge=debug".to_string(), directory: Some("logs".to_string()), file_enabled: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub background_timeout_secs: u64,
    pub demo_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            background_timeout_secs: 60,
            demo_mode: true,
        }
    }
}

impl LlmConfig {
    pub fn is_available(&self) -> bool {
        !self.demo_mode && !self.api_key.is_empty() && !self.api_base.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub endpoint: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { endpoint: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub api_base: Option<String>,
    pub api_key: String,
    pub app_key: String,
    pub site: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: String::new(),
            app_key: String::new(),
            site: "datadoghq.com".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn is_available(&self) -> bool {
        self.api_base.is_some() && !self.api_key.is_empty() && !self.app_key.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub demo_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub base_url: String,
    pub demo_mode: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8000".to_string(), demo_mode: true }
    }
}

/// Cluster Coordinator tuning, overriding the built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub max_services_per_agent: usize,
    pub queue_high_watermark: usize,
    pub queue_low_watermark: usize,
    pub max_replicas: usize,
    pub min_replicas: usize,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub scale_cooldown_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_services_per_agent: 5,
            queue_high_watermark: 3,
            queue_low_watermark: 1,
            max_replicas: 6,
            min_replicas: 1,
            scale_cooldown_secs: 15,
        }
    }
}

impl Default for RemediationConfig {
    // manual impl overridden below because #[derive(Default)] would give `false`
    fn default() -> Self {
        Self { demo_mode: true }
    }
}

/// Command line overrides. Highest priority in the load order.
#[derive(Parser, Debug, Clone)]
#[command(name = "forge")]
#[command(version, about = "Forge - autonomous SRE agent platform")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Path to the knowledge-store JSON document (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub memory_path: Option<String>,

    /// Logging level (overrides config file, e.g. "info,forge=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// LLM background-deepening timeout (overrides config file, e.g. "60s", "2m")
    #[arg(long, value_name = "DURATION")]
    pub llm_background_timeout: Option<String>,

    /// Force demo/fallback mode for every adapter regardless of config file
    #[arg(long)]
    pub demo_mode: bool,
}

impl Config {
    /// Loading order (priority from highest to lowest): CLI args, env vars,
    /// config file, built-in defaults.
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Supported environment variables:
    /// - `FORGE_SERVER_HOST` / `FORGE_SERVER_PORT`
    /// - `FORGE_MEMORY_PATH`
    /// - `FORGE_LOG_LEVEL`
    /// - `FORGE_LLM_API_BASE` / `FORGE_LLM_API_KEY` / `FORGE_LLM_MODEL` / `FORGE_LLM_BACKGROUND_TIMEOUT`
    /// - `FORGE_DEMO_MODE`
    /// - `DATADOG_API_KEY` / `DATADOG_APP_KEY` / `DATADOG_SITE`
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("FORGE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("FORGE_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(path) = std::env::var("FORGE_MEMORY_PATH") {
            self.storage.memory_path = path;
        }
        if let Ok(level) = std::env::var("FORGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(api_base) = std::env::var("FORGE_LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Ok(api_key) = std::env::var("FORGE_LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = std::env::var("FORGE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(timeout) = std::env::var("FORGE_LLM_BACKGROUND_TIMEOUT") {
            match parse_duration_to_secs(&timeout) {
                Ok(v) => self.llm.background_timeout_secs = v,
                Err(e) => tracing::warn!("invalid FORGE_LLM_BACKGROUND_TIMEOUT '{timeout}': {e}"),
            }
        }
        if let Ok(demo) = std::env::var("FORGE_DEMO_MODE")
            && let Ok(v) = demo.parse::<bool>()
        {
            self.llm.demo_mode = v;
            self.remediation.demo_mode = v;
            self.validation.demo_mode = v;
        }
        if let Ok(api_key) = std::env::var("DATADOG_API_KEY") {
            self.metrics.api_key = api_key;
        }
        if let Ok(app_key) = std::env::var("DATADOG_APP_KEY") {
            self.metrics.app_key = app_key;
        }
        if let Ok(site) = std::env::var("DATADOG_SITE") {
            self.metrics.api_base = Some(format!("https://api.{site}"));
            self.metrics.site = site;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(path) = &args.memory_path {
            self.storage.memory_path = path.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(timeout) = &args.llm_background_timeout {
            match parse_duration_to_secs(timeout) {
                Ok(v) => self.llm.background_timeout_secs = v,
                Err(e) => tracing::warn!("invalid --llm-background-timeout '{timeout}': {e}"),
            }
        }
        if args.demo_mode {
            self.llm.demo_mode = true;
            self.remediation.demo_mode = true;
            self.validation.demo_mode = true;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.storage.memory_path.is_empty() {
            anyhow::bail!("storage.memory_path cannot be empty");
        }
        if self.cluster.min_replicas == 0 {
            anyhow::bail!("cluster.min_replicas must be >= 1");
        }
        if self.cluster.min_replicas > self.cluster.max_replicas {
            anyhow::bail!("cluster.min_replicas cannot exceed cluster.max_replicas");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }
    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {unit}")),
    }
}

fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
