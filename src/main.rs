use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate::config::Config;
use paygate::db::{create_pool, init_db, queries, AppState};
use paygate::handlers;

#[derive(Parser, Debug)]
#[command(name = "paygate")]
#[command(about = "Stripe hosted-checkout bridge for order systems")]
struct Cli {
    /// Seed the database with a demo pending order (dev mode only)
    #[arg(long)]
    seed: bool,
}

fn seed_dev_order(state: &AppState) {
    let conn = state
        .db
        .get()
        .expect("Failed to get db connection for seeding");
    let order = queries::create_order(&conn, 4999, "usd").expect("Failed to create demo order");
    tracing::info!("Seeded demo order {} (49.99 usd, pending)", order.id);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paygate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if let Err(e) = config.gateway.validate() {
        tracing::error!("Invalid gateway configuration: {}", e);
        std::process::exit(1);
    }

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.gateway.test_mode {
        tracing::info!("Stripe gateway in TEST mode");
    }
    if config.gateway.webhook_secret.is_empty() {
        tracing::warn!("Webhook secret not configured - all webhook deliveries will be rejected");
    }

    // Create the order store pool and initialize the schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        gateway: config.gateway.clone(),
        base_url: config.base_url.clone(),
    };

    // Seed a demo order if --seed is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set PAYGATE_ENV=dev)");
        } else {
            seed_dev_order(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Paygate server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
