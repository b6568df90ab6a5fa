//! # Change Feed Replay
//!
//! Replays a recorded change feed against an offline engine and prints the
//! resulting catalog and valuation.
//!
//! ## Usage
//! ```bash
//! # Replay a JSON-lines feed (one change event per line)
//! cargo run -p bodega-engine --bin replay -- --feed ./feed.jsonl
//!
//! # Start from the cache file and write it back afterwards
//! cargo run -p bodega-engine --bin replay -- --feed ./feed.jsonl --restore --save
//!
//! # Use a specific config file
//! cargo run -p bodega-engine --bin replay -- --config ./bodega.toml --feed ./feed.jsonl
//! ```
//!
//! ## Feed Format
//! ```json
//! {"eventType":"INSERT","table":"products","new":{"id":"p-1","organization_id":"org-1","name":"Polar"},"old":{}}
//! {"eventType":"UPDATE","table":"inventory","new":{"organization_id":"org-1","product_id":"p-1","subtype":"Botella","quantity":72}}
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use bodega_engine::{init_tracing, Engine, EngineConfig};
use bodega_store::MemoryBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut feed: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut restore = false;
    let mut save = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--feed" | "-f" => {
                if i + 1 < args.len() {
                    feed = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--restore" => restore = true,
            "--save" => save = true,
            "--help" | "-h" => {
                println!("Bodega Change Feed Replay");
                println!();
                println!("Usage: replay --feed <PATH> [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -f, --feed <PATH>     JSON-lines change feed to replay");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("      --restore         Start from the cache file");
                println!("      --save            Write the cache file when done");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let Some(feed) = feed else {
        eprintln!("Missing --feed <PATH>. See --help.");
        std::process::exit(2);
    };

    init_tracing();

    let config = EngineConfig::load_or_default(config_path);
    println!("Bodega Change Feed Replay");
    println!("=========================");
    println!("Organization: {}", config.organization_id());
    println!("Feed: {}", feed.display());
    println!();

    let engine = Engine::new(Arc::new(MemoryBackend::new()), config);
    if restore {
        if engine.load_cache().await? {
            println!("✓ Restored state from cache");
        } else {
            println!("⚠ No cache to restore");
        }
    }

    let contents = tokio::fs::read_to_string(&feed).await?;
    let (handle, task) = engine.spawn_reconciler();

    let mut routed = 0;
    let mut rejected = 0;
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match handle.handle_raw(line).await {
            Ok(()) => routed += 1,
            Err(e) => {
                eprintln!("Line {}: {}", line_no + 1, e);
                rejected += 1;
            }
        }
    }

    handle.shutdown().await?;
    task.await?;

    println!("✓ Routed {} events ({} rejected)", routed, rejected);
    println!();

    let products = engine.products().await;
    println!("Products: {}", products.len());
    for product in &products {
        println!("  {}", product.name);
    }

    let state = engine.state();
    let records: Vec<_> = state.lock().await.inventory.records().collect();
    println!("Stock records: {}", records.len());
    for record in &records {
        println!("  {} / {}: {}", record.product, record.subtype, record.quantity);
    }

    println!(
        "Inventory asset value: {:.2}",
        engine.get_inventory_asset_value().await
    );

    if save {
        match engine.save_cache().await? {
            Some(path) => println!("✓ Cache written to {}", path.display()),
            None => println!("⚠ Cache disabled in config"),
        }
    }

    Ok(())
}
