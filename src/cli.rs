use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::relay::ServerConfig;

const LONG_ABOUT: &str = r#"
TTN Relay - live LoRaWAN telemetry for browser dashboards

Point a The Things Network webhook at POST /webhook/ttn. Every uplink that
carries a decoded payload is pushed to all dashboards connected on /ws as:

  {"type": "ttn_data", "payload": <uplink_message.decoded_payload>}

The dashboard itself is served from the static directory (index.html at /,
everything else under /static).
"#;

/// Port used when neither --port nor $PORT is set
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Parser, Clone, Debug)]
#[command(name = "ttn-relay")]
#[command(about = "Relay TTN webhook uplinks to live dashboard clients over WebSocket")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output (-q)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json: bool,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (falls back to $PORT, then 8000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding index.html and dashboard assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Per-client send timeout during broadcast, in milliseconds (0 = no limit)
    #[arg(long, default_value_t = 5000)]
    pub send_timeout_ms: u64,

    /// WebSocket heartbeat period in seconds (0 = disabled)
    #[arg(long, default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Write logs to this file (rotated daily) instead of stdout
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Days to keep rotated log files
    #[arg(long, default_value_t = 7)]
    pub log_retention_days: u32,
}

impl Cli {
    /// Resolve the listening port: flag, then `$PORT`, then the default
    pub fn resolved_port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.resolved_port(),
            static_dir: self.static_dir.clone(),
            send_timeout: non_zero(Duration::from_millis(self.send_timeout_ms)),
            heartbeat_interval: non_zero(Duration::from_secs(self.heartbeat_secs)),
        }
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
