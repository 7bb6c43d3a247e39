use actix_cors::Cors;
use actix_web::{http::header, middleware, App, HttpServer};
use anyhow::{anyhow, Context};
use bank_engine::{
    config::{Config, StorageBackend},
    database::{LedgerStore, MemoryStore, PostgresStore},
    handlers,
    services::BankServices,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    init_tracing(&config)?;

    info!(
        "Starting Bank Engine on {}:{}",
        config.server.host, config.server.port
    );

    let store = open_store(&config).await?;
    let services = BankServices::new(store);
    let allowed_origins = config.cors.allowed_origins.clone();

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .supports_credentials()
            .max_age(3600);

        let services = services.clone();
        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(move |cfg| handlers::configure_app(cfg, &services))
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log filter")?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let db = &config.database;
    match db.backend {
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(
                &db.url,
                db.max_connections,
                db.min_connections,
                db.acquire_timeout(),
            )
            .await
            .context("Failed to connect to database")?;

            if db.run_migrations {
                store
                    .run_migrations()
                    .await
                    .context("Failed to run migrations")?;
            }
            store
                .health_check()
                .await
                .context("Database health check failed")?;

            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
