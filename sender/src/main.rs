use sctp_sender::{Sender, SenderConfig};

fn main() {
    println!("sctp-sender - Starting...");

    // Load configuration
    let config = load_config();

    // Initialize logger
    let logger = initialize_logger(&config);

    logger.info(&format!(
        "Sending {} messages of {} bytes to {}",
        config.session.message_count, config.session.message_size, config.session.peer_address
    ));

    let mut sender = match Sender::new(&config, &logger) {
        Ok(sender) => sender,
        Err(e) => {
            logger.error(&format!("Failed to set up association: {}", e));
            eprintln!("Failed to set up association: {}", e);
            std::process::exit(1);
        }
    };

    match sender.run() {
        Ok(summary) => {
            logger.info(&format!("{:?}", summary));
            println!(
                "Sent {} messages in {} packets, {} of {} bytes acknowledged",
                summary.messages, summary.packets_sent, summary.bytes_acked, summary.bytes_queued
            );
        }
        Err(e) => {
            logger.error(&format!("Session failed: {}", e));
            eprintln!("Session failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initializes the main logger from configuration
fn initialize_logger(config: &SenderConfig) -> logging::Logger {
    let log_level = config
        .logging
        .log_level
        .parse()
        .unwrap_or(logging::LogLevel::Info);
    let log_path = config.logging.log_file_path.clone().into();
    let enable_console = config.logging.enable_console;

    match logging::Logger::with_component(
        log_path,
        log_level,
        Some("Main".to_string()),
        enable_console,
    ) {
        Ok(logger) => {
            println!(
                "Logging initialized: {} (level: {})",
                config.logging.log_file_path, config.logging.log_level
            );
            logger
        }
        Err(e) => {
            eprintln!("Failed to create logger: {}", e);
            eprintln!("Cannot continue without logging system.");
            std::process::exit(1);
        }
    }
}

/// Loads configuration from file or returns default values
fn load_config() -> SenderConfig {
    // Determine the configuration file in this order:
    // 1. First command-line argument
    // 2. $SCTP_SENDER_CONFIG, ./config/sender_config.json, ./sender_config.json
    let loaded = match std::env::args().nth(1) {
        Some(path) => SenderConfig::load_from_file(&path).map(|c| (c, path)),
        None => SenderConfig::find_and_load("sender_config.json")
            .map(|c| (c, "sender_config.json".to_string())),
    };

    match loaded {
        Ok((config, path)) => {
            println!("Configuration loaded from: {}", path);
            config
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Using default values...");
            SenderConfig::default()
        }
    }
}
