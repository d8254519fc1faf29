use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub issuance: IssuanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Protocol-level settings for talking to the access-control devices.
/// The device identity itself (host, port, credentials) lives on each
/// point of sale; these knobs apply to every device conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_profile")]
    pub profile: String,
    #[serde(default = "default_device_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuanceConfig {
    // Bound on the regenerate-and-retry loop when a voucher code collides
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

fn default_device_profile() -> String {
    "default".to_string()
}

fn default_device_timeout_secs() -> u64 {
    10
}

fn default_max_code_attempts() -> u32 {
    3
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            profile: default_device_profile(),
            timeout_secs: default_device_timeout_secs(),
        }
    }
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from config.yml (required) with environment variable overrides
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("NETVEND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
