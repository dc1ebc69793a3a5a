//! tower-tables - load the game table catalog and report what loaded
//!
//! Usage: `tower-tables [config.json]`
//!
//! Without a config file the defaults are used; `TABLES_*` environment
//! variables override either. With hot reload enabled the process keeps
//! watching the dev root until Ctrl-C.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use tower_tables::catalog;
use tower_tables::hotreload::HotReloader;
use tower_tables::logging::init_tracing;
use tower_tables::source::{build_source, AssetStore, MemoryAssetStore, SourceMode};
use tower_tables::{LoadConfig, TableConfig, TableLoader, TableRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => TableConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => TableConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;

    init_tracing(&config.logging);
    info!(
        mode = config.source.mode.as_str(),
        dev_root = %config.source.dev_root.display(),
        "starting table loader"
    );

    // No asset bundle ships with the CLI; packaged lookups always miss
    let assets: Arc<dyn AssetStore> = Arc::new(MemoryAssetStore::new());
    if config.source.mode == SourceMode::Packaged {
        warn!("packaged mode without an asset bundle, every table will be absent");
    }
    let source = build_source(&config.source, Some(assets)).context("building table source")?;

    let registry = Arc::new(TableRegistry::new());
    let loader = Arc::new(TableLoader::new(
        Arc::clone(&registry),
        source,
        catalog::registrations().context("registering catalog tables")?,
        LoadConfig::from(&config.load),
    ));

    let report = loader.load_all().await;
    println!("{:<20} {:>6}  {}", "TABLE", "ROWS", "STATUS");
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(published) => println!(
                "{:<20} {:>6}  ok ({} rejected, {} duplicate keys, {} ms)",
                outcome.source_id,
                published.rows,
                published.rejected_rows,
                published.duplicate_keys,
                outcome.elapsed.as_millis()
            ),
            Err(e) => println!("{:<20} {:>6}  FAILED: {e}", outcome.source_id, "-"),
        }
    }
    println!(
        "{} loaded, {} failed in {} ms",
        report.loaded(),
        report.failed(),
        report.elapsed.as_millis()
    );

    if !config.hot_reload.enabled {
        return Ok(());
    }

    let reloader = HotReloader::start(
        Arc::clone(&loader),
        &config.source.dev_root,
        config.hot_reload.debounce(),
    )
    .context("starting hot reload")?;
    info!("watching for table edits, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    let status = reloader.status();
    reloader.shutdown().await;

    println!("{}", status.to_json());
    println!("{}", serde_json::to_string_pretty(&loader.stats())?);
    Ok(())
}
