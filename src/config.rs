//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name used in the welcome greeting and logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address both listeners bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP port (liveness and health routes)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// WebSocket port for chat clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Origins allowed by CORS on the HTTP routes
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Greeting sent in the `welcome` event
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Echo relayed messages back to their sender
    #[serde(default = "default_true")]
    pub include_sender: bool,

    /// Accept `""` as a literal room name
    #[serde(default = "default_true")]
    pub allow_empty_room_names: bool,

    /// Seconds a new TCP connection gets to finish the WebSocket upgrade
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Largest accepted WebSocket message in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_server_name() -> String {
    "Chatroom".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_http_port() -> u16 {
    3000
}

fn default_websocket_port() -> u16 {
    3001
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_welcome_message() -> String {
    "Welcome to the server".to_string()
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    65536
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            websocket_port: default_websocket_port(),
            cors_origins: default_cors_origins(),
            welcome_message: default_welcome_message(),
            include_sender: true,
            allow_empty_room_names: true,
            handshake_timeout: default_handshake_timeout(),
            max_message_size: default_max_message_size(),
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("CHATROOM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            // Logging is not up yet; the binary reports the missing file
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text (missing keys take their defaults)
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CHATROOM_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("CHATROOM_BIND_ADDRESS") {
            if let Ok(addr) = val.parse() {
                self.bind_address = addr;
            }
        }
        if let Ok(val) = env::var("CHATROOM_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                self.http_port = port;
            }
        }
        if let Ok(val) = env::var("CHATROOM_WEBSOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.websocket_port = port;
            }
        }
        if let Ok(val) = env::var("CHATROOM_CORS_ORIGINS") {
            self.cors_origins = val
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(val) = env::var("CHATROOM_WELCOME_MESSAGE") {
            self.welcome_message = val;
        }
        if let Ok(val) = env::var("CHATROOM_INCLUDE_SENDER") {
            self.include_sender = parse_flag(&val);
        }
        if let Ok(val) = env::var("CHATROOM_ALLOW_EMPTY_ROOM_NAMES") {
            self.allow_empty_room_names = parse_flag(&val);
        }
        if let Ok(val) = env::var("CHATROOM_HANDSHAKE_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.handshake_timeout = secs;
            }
        }
        if let Ok(val) = env::var("CHATROOM_MAX_MESSAGE_SIZE") {
            if let Ok(size) = val.parse() {
                self.max_message_size = size;
            }
        }
        if let Ok(val) = env::var("CHATROOM_DEBUG") {
            self.debug = parse_flag(&val);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 || self.websocket_port == 0 {
            anyhow::bail!("Ports must be non-zero");
        }
        if self.http_port == self.websocket_port {
            anyhow::bail!("HTTP port and WebSocket port must be different");
        }

        if self.handshake_timeout == 0 {
            anyhow::bail!("Handshake timeout must be at least one second");
        }

        if self.max_message_size < 64 {
            anyhow::bail!("Max message size must be at least 64 bytes");
        }

        for origin in &self.cors_origins {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {origin}"))?;
        }

        Ok(())
    }

    /// Deadline for the WebSocket upgrade
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Socket address of the HTTP listener
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }

    /// Socket address of the WebSocket listener
    pub fn websocket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.websocket_port)
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
