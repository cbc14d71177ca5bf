use clap::Parser;
use std::time::Duration;
use tracing::Level;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const PORT: u16 = 7556;
pub const BIND: &str = "127.0.0.1";

/// Server settings, read from the command line or the environment.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// The port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = PORT)]
    pub port: u16,

    /// The address to bind the listener to
    #[arg(short, long, env = "RESPKV_BIND", default_value = BIND)]
    pub bind: String,

    /// Largest incomplete frame, in bytes, a connection may buffer before it is closed
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Close connections that send nothing for this many seconds
    #[arg(long, env = "RESPKV_IDLE_TIMEOUT", value_parser = parse_seconds)]
    pub idle_timeout: Option<Duration>,

    /// Maximum level of the emitted logs
    #[arg(long, env = "RESPKV_LOG", default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: PORT,
            bind: BIND.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout: None,
            log_level: Level::INFO,
        }
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("idle timeout must be at least one second".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(format!("invalid number of seconds: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["respkv"]).unwrap();

        assert_eq!(config.port, PORT);
        assert_eq!(config.bind, BIND);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "respkv",
            "--port",
            "6380",
            "--bind",
            "0.0.0.0",
            "--max-frame-size",
            "1024",
            "--idle-timeout",
            "30",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.port, 6380);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        assert!(Config::try_parse_from(["respkv", "--idle-timeout", "0"]).is_err());
    }
}
