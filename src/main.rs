use clap::{Parser, Subcommand};
use quota_manager::database::DatabaseManager;
use quota_manager::{Config, Server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "quota-manager")]
#[command(about = "Quota accounting service for the AI routing gateway")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    if let Some(Commands::Migrate) = cli.command {
        match DatabaseManager::new_from_config(&config).await {
            Ok(database) => {
                if let Err(e) = database.migrate().await {
                    error!("Migration failed: {}", e);
                    std::process::exit(1);
                }
                info!("Migrations complete");
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    info!("Starting quota manager");

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
