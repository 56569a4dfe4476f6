use std::sync::Arc;

use clap::Parser;
use coach_core::{CoachConfig, GeminiClient, GenerativeBackend};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "coach.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (GOOGLE_API_KEY usually lives there in dev)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config; a missing API key is fatal
    let config = match CoachConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging (RUST_LOG wins over service.log_level)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Open DB and make sure the schema exists
    let pool = match coach_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.url, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = coach_core::db::init_schema(&pool).await {
        eprintln!("Failed to initialise database schema: {}", e);
        std::process::exit(1);
    }

    if args.health {
        match coach_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Interview coach health check passed");
        return Ok(());
    }

    let backend: Arc<dyn GenerativeBackend> = match GeminiClient::new(config.gemini.clone()) {
        Ok(client) => {
            tracing::info!(model = client.model(), "Gemini client ready");
            Arc::new(client)
        }
        Err(e) => {
            eprintln!("Failed to create Gemini client: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    coach_server::http::start_http_server(pool, config, backend, tx.subscribe()).await?;

    Ok(())
}
