use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use inference_playground::chain::history::SessionStore;
use inference_playground::chain::ConversationChain;
use inference_playground::config::{Cli, Command, Config};
use inference_playground::server::api::{build_router, AppState};
use inference_playground::server::metrics::Metrics;
use inference_playground::{build_registry, demos};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "inference_playground=debug,tower_http=debug"
    } else {
        "inference_playground=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("inference-playground v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Arc::new(Config::load(&cli.config)?);

    info!(
        backend = config.backend.base_url,
        generation_model = config.backend.generation_model,
        sentiment_model = config.backend.sentiment_model,
        force_mock = config.mock.force,
        "Configuration loaded"
    );

    let registry = build_registry(&config)?;

    match cli.command {
        Command::Demo { name } => {
            let mut stdout = std::io::stdout().lock();
            demos::run(name, &registry, &config, &mut stdout).await?;
        }
        Command::Serve { listen } => {
            let chat = ConversationChain::new(
                Arc::new(SessionStore::new()),
                &config.chat.system_prompt,
                config.chat.max_new_tokens,
            );

            // Build application state.
            let state = Arc::new(AppState {
                registry,
                chat,
                config: config.clone(),
                metrics: Metrics::new()?,
                start_time: Instant::now(),
            });

            let app = build_router(state);

            let listen_addr = listen.unwrap_or_else(|| config.server.listen.clone());
            let listener = TcpListener::bind(&listen_addr).await?;
            info!("Listening on http://{listen_addr}");

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
