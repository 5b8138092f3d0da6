use clap::Parser;
use share_market::config::LogFormat;
use share_market::utils::logger;
use share_market::{MarketNode, ServerArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();

    let config = match args.common.load_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(args.common.verbose);
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    match config.server.log_format {
        LogFormat::Json => logger::init_json_logger(args.common.verbose),
        LogFormat::Compact => logger::init_cli_logger(args.common.verbose),
    }
    tracing::info!("Starting {} market node", args.market);
    tracing::debug!("Config: {:?}", config);

    let node = match MarketNode::bind(&config, &args.market).await {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("❌ {} Server failed to start: {}", args.market, e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    println!("{} Server ready and waiting ...", node.service().market().name);

    if let Err(e) = node.run().await {
        tracing::error!("❌ {} Server stopped with error: {}", args.market, e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    Ok(())
}
