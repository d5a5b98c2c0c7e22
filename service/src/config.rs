use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::BrokerConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Maximum number of concurrently connected SSE subscribers. Connections
    /// beyond this are answered with 503 Service Unavailable.
    #[arg(long, env, default_value_t = 200)]
    pub sse_max_subscribers: usize,

    /// Seconds between heartbeat comments sent to each SSE subscriber
    #[arg(long, env, default_value_t = 55)]
    pub sse_heartbeat_interval_secs: u64,

    /// Upper bound in milliseconds on any single write to an SSE subscriber
    #[arg(long, env, default_value_t = 5000)]
    pub sse_write_timeout_millis: u64,

    /// Number of frames buffered per SSE subscriber before it is considered stuck
    #[arg(long, env, default_value_t = 64)]
    pub sse_channel_capacity: usize,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Listen address as `interface:port`.
    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("127.0.0.1"),
            self.port
        )
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            max_subscribers: self.sse_max_subscribers,
            heartbeat_interval: Duration::from_secs(self.sse_heartbeat_interval_secs.max(1)),
            write_timeout: Duration::from_millis(self.sse_write_timeout_millis.max(1)),
            channel_capacity: self.sse_channel_capacity.max(1),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["live_availability_rs"];
        argv.extend_from_slice(args);
        Config::parse_from(argv)
    }

    #[test]
    fn test_defaults_match_broker_defaults() {
        let config = parse(&[]);

        assert_eq!(config.broker_config(), BrokerConfig::default());
    }

    #[test]
    fn test_bind_address_joins_interface_and_port() {
        let config = parse(&["--interface", "0.0.0.0", "--port", "8080"]);

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_production_runtime_env() {
        let config = parse(&["--runtime-env", "PRODUCTION"]);

        assert!(config.is_production());
    }

    #[test]
    fn test_sse_flags_feed_broker_config() {
        let config = parse(&[
            "--sse-max-subscribers",
            "2",
            "--sse-heartbeat-interval-secs",
            "30",
            "--sse-write-timeout-millis",
            "250",
            "--sse-channel-capacity",
            "8",
        ]);

        let broker = config.broker_config();

        assert_eq!(broker.max_subscribers, 2);
        assert_eq!(broker.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(broker.write_timeout, Duration::from_millis(250));
        assert_eq!(broker.channel_capacity, 8);
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = parse(&[
            "--sse-heartbeat-interval-secs",
            "0",
            "--sse-write-timeout-millis",
            "0",
        ]);

        let broker = config.broker_config();

        assert_eq!(broker.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(broker.write_timeout, Duration::from_millis(1));
    }

    #[test]
    fn test_rust_env_parsing_is_case_insensitive() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
