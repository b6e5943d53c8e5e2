use clap::Parser;
use tracing::error;
use vtru_scripts::{cli::Cli, utils::setup_logging};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();
    let Cli { global, command } = Cli::parse();
    setup_logging();

    let name = command.name();
    if let Err(e) = command.run(&global).await {
        error!("{name} failed on {}: {e}", global.network.to_lowercase());
        return Err(e.into());
    }

    Ok(())
}
