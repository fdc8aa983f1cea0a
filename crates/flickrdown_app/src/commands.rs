use std::sync::Arc;

use anyhow::{Context, Result};
use flickrdown_engine::{
    subscribe, ArchiveLayout, ArchiveProcessor, BatchRunner, FlickrClient, Orchestrator,
    PagedCatalogSource, PassResult, ReqwestTransfer, Window,
};
use flickrdown_logging::{flickrdown_info, flickrdown_warn};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::cli::{RunArgs, WatchArgs};
use crate::config::Config;
use crate::planner::{one_shot_window, watch_start, WatermarkPlanner};
use crate::triggers;
use crate::watermark::WatermarkStore;

/// Wires the Flickr client, archive layout and transfer into a runner.
pub fn build_runner(config: &Config) -> Result<BatchRunner> {
    let client = Arc::new(
        FlickrClient::new(config.flickr.clone()).context("failed to set up Flickr client")?,
    );
    let catalogs = PagedCatalogSource::new(client.clone(), client);
    let transfer =
        ReqwestTransfer::new(config.transfer.clone()).context("failed to set up downloads")?;
    let processor = ArchiveProcessor::new(
        Arc::new(ArchiveLayout::new(config.archive_dir.clone())),
        Arc::new(transfer),
    );
    Ok(BatchRunner::new(Arc::new(catalogs), Arc::new(processor)))
}

/// Archives one window and exits.
pub async fn run_once(config: &Config, args: &RunArgs) -> Result<()> {
    let store = WatermarkStore::new(config.statefile.clone());
    let window = one_shot_window(
        args.start_date,
        args.end_date,
        store.load(),
        config.earliest_start,
    )
    .with_context(|| format!("no usable window (watermark file {:?})", store.path()))?;
    let runner = build_runner(config)?;

    let windows = if args.by_day {
        window.split_days()
    } else {
        vec![window]
    };
    let total = run_windows(&runner, &store, &windows).await?;
    flickrdown_info!(
        "Run over {} finished: {} items archived",
        window,
        total.succeeded
    );
    Ok(())
}

/// Runs `windows` in order, saving the watermark after each clean one.
///
/// Stops at the first window that aborts or has item failures.
async fn run_windows(
    runner: &BatchRunner,
    store: &WatermarkStore,
    windows: &[Window],
) -> Result<PassResult> {
    let mut total = PassResult::default();
    for window in windows {
        let result = runner
            .run_pass(*window)
            .await
            .with_context(|| format!("pass over {window} failed"))?;
        let summary = result.ensure_success();
        total.merge(result);
        summary.with_context(|| format!("pass over {window} incomplete"))?;
        store.save(window.to);
    }
    Ok(total)
}

/// Runs passes whenever a trigger fires until Ctrl-C.
pub async fn watch(config: &Config, args: &WatchArgs) -> Result<()> {
    let store = WatermarkStore::new(config.statefile.clone());
    let from = watch_start(args.start_date, store.load(), config.earliest_start)?;
    let runner = build_runner(config)?;

    let mut sources: Vec<BoxStream<'static, ()>> = Vec::new();
    if let Some(dir) = args.watch_dir.as_ref().or(config.watch_dir.as_ref()) {
        let changes = triggers::watch_directory(dir, &config.archive_dir, store.path())?;
        sources.push(changes.boxed());
    }
    let sweep = args
        .sweep_interval_secs
        .map(std::time::Duration::from_secs)
        .or(config.sweep_interval);
    if let Some(period) = sweep {
        flickrdown_info!("Sweeping every {:?}", period);
        sources.push(triggers::sweep(period).boxed());
    }
    if sources.is_empty() {
        flickrdown_warn!(
            "No watch directory or sweep interval configured, only the startup pass will run"
        );
    }

    let (handle, mut begins) = subscribe(triggers::merge(sources), stream::empty::<()>());
    handle.request_now();

    let shutdown = CancellationToken::new();
    tokio::spawn(stop_on_ctrl_c(shutdown.clone()));

    let planner = WatermarkPlanner::new(store, from);
    let mut orchestrator = Orchestrator::new(runner, handle, planner).with_shutdown(shutdown);
    let stats = orchestrator.run(&mut begins).await;
    flickrdown_info!(
        "Watch stopped after {} passes ({} with failures), watermark {}",
        stats.passes,
        stats.failed_passes,
        orchestrator.planner().watermark().to_rfc3339()
    );
    Ok(())
}

async fn stop_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            flickrdown_info!("Ctrl-C received, stopping after the current pass");
            shutdown.cancel();
        }
        Err(err) => flickrdown_warn!("Cannot listen for Ctrl-C: {}", err),
    }
}
