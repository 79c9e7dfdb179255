use anyhow::{Context, Result};
use goe_bridge::config::Config;
use goe_bridge::logging::{get_logger, init_logging};

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    init_logging(&config.logging).context("Failed to initialize logging")?;
    let logger = get_logger("main");
    logger.info(&format!("goe-bridge {} starting up", env!("APP_VERSION")));

    if let Err(e) = config.validate() {
        logger.error(&format!("Invalid configuration: {}", e));
        return Err(anyhow::anyhow!("Invalid configuration: {}", e));
    }

    if config.chargers.is_empty() {
        logger.warn("No chargers configured");
    }
    for charger in &config.chargers {
        // validate() already checked the protocol tag
        let protocol = charger
            .protocol_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| charger.protocol.clone());
        logger.info(&format!(
            "Charger '{}': host={}, api={}, poll={}s, timeout={}s, correction_factor={}",
            charger.name,
            charger.host,
            protocol,
            charger.poll_interval().as_secs(),
            charger.request_timeout_seconds,
            charger.effective_correction_factor()
        ));
    }

    logger.info(&format!(
        "Configuration OK ({} charger(s))",
        config.chargers.len()
    ));
    Ok(())
}
