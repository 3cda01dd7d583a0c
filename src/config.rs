//! Server configuration
//!
//! Parsed from the command line, with environment variable fallbacks.

use std::num::NonZeroUsize;

use clap::Parser;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Parser)]
#[command(name = "chat_room", version, about = "Line-oriented multi-user chat room server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(env = "CHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Capacity of the dispatcher's inbound channel
    #[arg(long, env = "CHAT_COMMAND_CAPACITY", default_value = "256")]
    pub command_capacity: NonZeroUsize,

    /// Capacity of each session's outbound queue; overflow is dropped
    #[arg(long, env = "CHAT_OUTBOUND_CAPACITY", default_value = "64")]
    pub outbound_capacity: NonZeroUsize,

    /// Longest accepted input line, in bytes
    #[arg(long, env = "CHAT_MAX_LINE_LENGTH", default_value = "4096")]
    pub max_line_length: NonZeroUsize,
}

impl ServerConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            outbound_capacity: self.outbound_capacity.get(),
            max_line_length: self.max_line_length.get(),
        }
    }
}

/// Per-connection limits handed to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub outbound_capacity: usize,
    pub max_line_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            max_line_length: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["chat_room"]).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.command_capacity.get(), 256);
        assert_eq!(config.session_settings(), SessionSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::try_parse_from([
            "chat_room",
            "0.0.0.0:9000",
            "--outbound-capacity",
            "8",
            "--max-line-length",
            "512",
        ])
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(
            config.session_settings(),
            SessionSettings {
                outbound_capacity: 8,
                max_line_length: 512,
            }
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ServerConfig::try_parse_from(["chat_room", "--outbound-capacity", "0"]).is_err());
    }
}
