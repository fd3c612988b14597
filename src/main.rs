use anyhow::Result;
use clap::{Parser, Subcommand};
use titan::application::signal::SignalService;
use titan::application::training::TrainingOrchestrator;
use titan::config::Config;
use titan::infrastructure::factory::ServiceFactory;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "LSTM-based market direction pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch history, train the classifier and persist the artifact
    Train,
    /// Score the latest market window with the persisted model
    Signal {
        /// Override the configured symbol
        #[arg(long)]
        symbol: Option<String>,

        /// Override the configured timeframe
        #[arg(long)]
        timeframe: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Train => {
            let orchestrator = TrainingOrchestrator::new(
                config.clone(),
                ServiceFactory::create_market_data(&config),
                ServiceFactory::create_artifact_store(&config),
                ServiceFactory::create_embedding_provider(&config),
                ServiceFactory::create_vector_store(&config),
            );
            let outcome = orchestrator.run_training().await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Signal { symbol, timeframe } => {
            let service = SignalService::new(
                config.clone(),
                ServiceFactory::create_market_data(&config),
                ServiceFactory::create_artifact_store(&config),
            );
            let signal = service
                .generate_signal(symbol.as_deref(), timeframe.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&signal)?);
        }
    }

    Ok(())
}
