use anyhow::Result;
use campus_rag::bootstrap::{build_embedder, init_logging};
use campus_rag::store::{KnowledgeStore, StoreProvider};
use campus_rag::Config;
use std::collections::BTreeMap;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config.app.log_level);
    config.ensure_directories()?;

    let provider = StoreProvider::open(&config, build_embedder(&config)?).await?;
    let stats = provider.stats().await?;

    println!("\n=== Campus RAG Knowledge Store ===\n");
    println!("Store:           {}", config.store_dir().display());
    println!("Chunks:          {}", stats.chunks);
    println!("Indexed files:   {}", stats.indexed_files);
    println!("Committed files: {}", stats.committed_files);
    println!("Pending files:   {}", stats.pending_files);

    let metadata = provider.current().await?.get_all_metadata().await?;
    let mut per_file: BTreeMap<&str, usize> = BTreeMap::new();
    for m in &metadata {
        *per_file.entry(m.file_name.as_str()).or_default() += 1;
    }

    if !per_file.is_empty() {
        println!("\n{:<50} {:>8}", "File", "Chunks");
        println!("{}", "-".repeat(59));
        for (file, count) in per_file {
            println!("{:<50} {:>8}", file, count);
        }
    }
    println!();

    Ok(())
}
