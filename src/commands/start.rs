use anyhow::Result;
use colored::Colorize;
use service_scaffold::{config::Config, logger::Logger, server};

/// Execute the start command
///
/// This will:
/// 1. Load configuration from the environment
/// 2. Build the logger and install it process-wide
/// 3. Log the effective configuration
/// 4. Start the server (blocks until shutdown)
pub async fn execute() -> Result<()> {
    println!("{}", "Starting service...".green());

    let cfg = Config::from_env()?;
    let logger = Logger::new(&cfg.log, &cfg.service_name)?;
    logger.install_global()?;

    logger.in_scope(|| {
        for line in cfg.to_string().lines() {
            tracing::info!("{}", line);
        }
    });

    server::start_server(cfg, logger).await
}
