use clap::Parser;
use ttn_relay::cli::Cli;
use ttn_relay::logging::{cleanup_old_logs, init_logging, log_dir, LoggingConfig};
use ttn_relay::relay::RelayServer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = LoggingConfig::from_args(cli.quiet, cli.verbose > 0, cli.json);

    // Background deployments log to a rotating file with targets and timestamps
    if let Some(log_file) = &cli.log_file {
        log_config =
            LoggingConfig::for_file(log_file.clone(), log_config.level, log_config.json_format);
    }

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Prune rotated logs next to the active file (after logging init)
    if let Some(dir) = cli.log_file.as_deref().map(log_dir) {
        if let Err(e) = cleanup_old_logs(dir, cli.log_retention_days) {
            tracing::warn!("Log cleanup failed: {}", e);
        }
    }

    if let Err(e) = RelayServer::new(cli.server_config()).run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
