use anyhow::Result;
use campus_rag::bootstrap::{build_embedder, init_logging};
use campus_rag::ingest::IngestStatus;
use campus_rag::store::StoreProvider;
use campus_rag::Config;
use clap::Parser;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Ingest staged documents into the Campus RAG knowledge store")]
struct Args {
    /// Delete the store and rebuild it from the committed archive
    #[arg(short, long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    init_logging(&config.app.log_level);
    config.ensure_directories()?;

    log::info!("Pending directory: {}", config.pending_dir().display());
    log::info!("Committed directory: {}", config.committed_dir().display());
    log::info!("Store directory: {}", config.store_dir().display());

    let start = Instant::now();
    let provider = StoreProvider::open(&config, build_embedder(&config)?).await?;

    let report = if args.reset {
        log::warn!("Resetting knowledge store");
        provider.reset().await?
    } else {
        provider.ingest().await?
    };

    if report.status == IngestStatus::NothingToDo {
        println!("Nothing to ingest.");
    } else {
        println!("Files seen:          {}", report.files_seen);
        println!("Chunks seen:         {}", report.chunks_seen);
        println!("New chunks stored:   {}", report.chunks_added);
        if !args.reset {
            println!("Files archived:      {}", report.files_archived);
            if report.archive_overwrites > 0 {
                println!("Archive overwrites:  {}", report.archive_overwrites);
            }
            println!("Deleted (no text):   {}", report.deleted_unreadable);
            println!("Deleted (duplicate): {}", report.deleted_duplicate);
        }
        if report.lifecycle_errors > 0 {
            println!("File move errors:    {}", report.lifecycle_errors);
        }
    }
    log::info!("Done in {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
