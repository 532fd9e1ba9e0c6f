use anyhow::Result;
use campus_rag::bootstrap::{build_services, init_logging};
use campus_rag::db::migrate;
use campus_rag::server::HttpServer;
use campus_rag::store::SqliteKnowledgeStore;
use campus_rag::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config.app.log_level);

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "verify" => run_verification(&config).await?,
        "serve" => run_http_server(&config).await?,
        other => anyhow::bail!("Unknown command '{}'. Use 'serve' or 'verify'.", other),
    }

    Ok(())
}

async fn run_http_server(config: &Config) -> Result<()> {
    log::info!("Starting Campus RAG v{}", env!("CARGO_PKG_VERSION"));

    let services = build_services(config).await?;
    let stats = services.provider.stats().await?;
    log::info!(
        "Knowledge store ready: {} chunks from {} files",
        stats.chunks,
        stats.indexed_files
    );

    let server = HttpServer::new(config, services.provider, services.query);
    server.run(config.server.port).await?;
    Ok(())
}

/// Print the effective configuration and check the store schema
async fn run_verification(config: &Config) -> Result<()> {
    log::info!("Starting Campus RAG v{} (verify)", env!("CARGO_PKG_VERSION"));
    log::info!("Pending directory: {}", config.pending_dir().display());
    log::info!("Committed directory: {}", config.committed_dir().display());
    log::info!("Store directory: {}", config.store_dir().display());
    log::info!("Embedding model: {}", config.embeddings.model);
    log::info!("Chat model: {} (top_k = {})", config.chat.model, config.chat.top_k);

    let services = build_services(config).await?;
    let store: std::sync::Arc<SqliteKnowledgeStore> = services.provider.current().await?;
    let applied = store.applied_migrations().await?;

    if applied.len() != migrate::latest_version() as usize {
        anyhow::bail!(
            "Store schema has {} of {} migrations applied",
            applied.len(),
            migrate::latest_version()
        );
    }
    for name in &applied {
        log::debug!("✓ Migration applied: {}", name);
    }

    let stats = services.provider.stats().await?;
    log::info!(
        "Store OK: {} chunks, {} committed files, {} pending files",
        stats.chunks,
        stats.committed_files,
        stats.pending_files
    );
    Ok(())
}
