use anyhow::Result;
use clap::{Parser, Subcommand};

use chatrelay::config::Config;
use chatrelay::gateway;

#[derive(Parser)]
#[command(name = "chatrelay", version, about = "Conversational LLM relay with per-session history")]
struct Cli {
    /// Override the config directory (also CHATRELAY_CONFIG_DIR).
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(long)]
        port: Option<u16>,
        /// Host to bind (overrides config).
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the resolved configuration and exit.
    Status,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.config_dir {
        std::env::set_var("CHATRELAY_CONFIG_DIR", dir);
    }

    init_tracing();

    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            gateway::run_gateway(&host, port, config).await
        }
        Commands::Status => {
            println!("chatrelay v{}", env!("CARGO_PKG_VERSION"));
            println!("config:   {}", config.config_path.display());
            println!("data:     {}", config.data_dir.display());
            println!("provider: {} ({})", config.provider_name(), config.model_name());
            println!(
                "api key:  {}",
                if config.api_key.is_some() { "set" } else { "not set" }
            );
            println!(
                "gateway:  {}:{} (origins: {})",
                config.gateway.host,
                config.gateway.port,
                if config.gateway.allowed_origins.is_empty() {
                    "*".to_string()
                } else {
                    config.gateway.allowed_origins.join(", ")
                }
            );
            println!("storage:  {}", config.storage.backend);
            Ok(())
        }
    }
}
