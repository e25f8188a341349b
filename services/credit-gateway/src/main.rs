use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use credit_core::{HexCodeGenerator, MemoryStore, Store};
use credit_gateway::{config::Config, database::PgStore, handlers, services::CommandService};
use dotenv::dotenv;
use settlement::{Metrics, ReconciliationEngine};
use std::sync::Arc;
use ton_feed::{LedgerClient, TonApiClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Starting Credit Gateway on port {}", config.server.port);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            let db = PgStore::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to database")?;
            db.ensure_schema().await.context("Failed to create schema")?;
            Arc::new(db)
        }
        None => {
            warn!("DATABASE_URL not set, balances live in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let feed = TonApiClient::new(config.feed.clone()).context("Failed to build TonAPI client")?;
    let ledger = LedgerClient::new(Arc::new(feed), &config.feed);
    let metrics = Metrics::new().context("Failed to register metrics")?;

    let engine = Arc::new(ReconciliationEngine::new(
        store.clone(),
        ledger,
        config.settlement.clone(),
        metrics,
    ));

    let command_service = Arc::new(CommandService::new(
        store,
        engine,
        Arc::new(HexCodeGenerator::new(config.invoice.code_bytes)),
        config.invoice.clone(),
        config.bot.username.clone(),
    ));

    info!(
        wallet = %config.settlement.wallet_address,
        feed = %config.feed.base_url,
        "Reconciliation engine ready"
    );

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(command_service.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers.max(1))
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
