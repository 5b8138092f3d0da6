use clap::Parser;
use share_market::domain::Role;
use share_market::utils::logger;
use share_market::{AuditLog, BuyerSession, ClientArgs, Console, SoapDirectory};
use std::io;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    logger::init_cli_logger(args.common.verbose);

    let config = match args.common.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());

    let user_id = match args.user {
        Some(id) => id,
        None => match console
            .prompt("Enter your Buyer ID (e.g., NYKBXXXX, LONBXXXX, TOKBXXXX): ")?
        {
            Some(id) => id,
            None => return Ok(()),
        },
    };
    let Some((user, home)) = config.home_market(&user_id) else {
        console.say("Invalid Buyer ID. Exiting.")?;
        return Ok(());
    };

    let log = AuditLog::client(&config.server.log_dir, Role::Buyer, &user.id);
    let directory = Arc::new(SoapDirectory::from_config(&config)?);
    let session = BuyerSession::new(user, home.name.clone(), directory, log)?;

    if let Err(e) = session.run(&mut console).await {
        tracing::error!("❌ Buyer session ended with error: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    Ok(())
}
