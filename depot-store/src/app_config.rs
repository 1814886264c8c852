use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
}

fn default_notification_topic() -> String {
    "logistics.notifications".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Logistics provider gateway (one HTTP facade in front of every provider).
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    pub base_url: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

/// Periodic job cadence. Intervals in seconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JobsConfig {
    pub courier_calls_interval_seconds: u64,
    pub intake_validity_interval_seconds: u64,
    pub courier_status_interval_seconds: u64,
    pub delivery_dispatch_interval_seconds: u64,
    pub status_sync_interval_seconds: u64,
    /// Upper bound of items fetched per job run.
    pub batch_limit: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            courier_calls_interval_seconds: 300,
            intake_validity_interval_seconds: 3600,
            courier_status_interval_seconds: 900,
            delivery_dispatch_interval_seconds: 120,
            status_sync_interval_seconds: 600,
            batch_limit: 200,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `DEPOT_DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("DEPOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_file_deserializes() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let cfg: Config = s.try_deserialize().unwrap();
        assert_eq!(cfg.kafka.notification_topic, "logistics.notifications");
        assert_eq!(cfg.jobs.batch_limit, 200);
        assert_eq!(cfg.directory.cache_ttl_seconds, 300);
    }

    #[test]
    fn test_jobs_section_is_optional() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                server = { port = 1 }
                database = { url = "postgres://x" }
                redis = { url = "redis://x" }
                kafka = { brokers = "k:9092" }
                auth = { jwt_secret = "s" }
                gateway = { base_url = "http://g", api_key = "k" }
                directory = { base_url = "http://d" }
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let cfg: Config = s.try_deserialize().unwrap();
        assert_eq!(cfg.jobs.status_sync_interval_seconds, 600);
        assert_eq!(cfg.gateway.timeout_seconds, 30);
    }
}
