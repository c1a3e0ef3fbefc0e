use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use decision_tree_builder::{
    config::{Config, LogFormat},
    llm::OpenAiClient,
    storage::open_store,
    GenerationMode, SessionManager, StdioServer, TreeGenerator,
};

/// Build decision trees with a language model.
#[derive(Parser, Debug)]
#[command(name = "decision-tree-builder", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve JSON-line commands on stdin (default)
    Serve,

    /// Generate one tree and print it
    Generate {
        /// Expert role the model plays
        #[arg(long, default_value = "Technical Troubleshooter")]
        role: String,

        /// Initial user query
        #[arg(long)]
        query: String,

        /// Full tree or root question only
        #[arg(long, value_enum, default_value_t = GenerationMode::Recursive)]
        mode: GenerationMode,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.llm.model,
        max_depth = config.generation.max_depth,
        "Decision tree builder starting..."
    );

    let store = match open_store(&config.storage).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to initialize tree storage");
            return Err(e.into());
        }
    };

    let model = match OpenAiClient::new(&config.llm, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %c.base_url(), "Model client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize model client");
            return Err(e.into());
        }
    };

    let mut generator = TreeGenerator::new(Arc::new(model), &config.generation);
    if let Some(store) = store {
        generator = generator.with_store(store);
    }
    let sessions = Arc::new(SessionManager::new(generator));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let server = StdioServer::new(sessions);
            info!("Server ready, waiting for requests on stdin...");

            if let Err(e) = server.run().await {
                error!(error = %e, "Server error");
                return Err(e.into());
            }
            info!("Server shutdown complete");
        }
        Commands::Generate { role, query, mode } => {
            let session_id = sessions.run(&role, &query, mode).await?;
            let tree = sessions.snapshot(Some(&session_id)).await?;
            println!("{}", tree.render(sessions.max_depth()));
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
