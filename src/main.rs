//! Feed curator: batch entry point, invoked by an external scheduler.
//!
//! ```text
//! feed-curator [run]          one curation cycle
//! feed-curator post [ID]      publish pending drafts (all, or one by id)
//! ```

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::info;

use feed_curator::bootstrap::Services;
use feed_curator::metrics::{mark_run_finished, Metrics};
use feed_curator::{config, init_tracing, post_pending_drafts, CursorStore, DraftStore, Pipeline};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = config::load_default()?;
    let metrics = Metrics::install()?;
    let services = Services::from_config(&cfg)?;
    let mut drafts = DraftStore::load(&cfg.paths.drafts_path)?;
    let now = Utc::now();

    match args.first().map(String::as_str) {
        None | Some("run") => {
            let mut cursors = CursorStore::load(&cfg.paths.state_path)?;
            let pipeline = Pipeline::new(&cfg, services.clients(), &services.composer, &services.mux);
            let report = pipeline.run_cycle(&mut cursors, &mut drafts, now).await?;
            info!(
                drafts = report.drafts_created.len(),
                rejected = report.rejected,
                digests = report.digests_sent,
                "run complete"
            );
        }
        Some("post") => {
            let only = args.get(1).map(String::as_str);
            let report = post_pending_drafts(&mut drafts, &services.mux, only, now).await?;
            info!(posted = report.posted.len(), failed = report.failed.len(), "posting complete");
            if !report.failed.is_empty() {
                bail!("{} draft(s) could not be posted", report.failed.len());
            }
        }
        Some(other) => bail!("unknown mode `{other}` (expected `run` or `post [DRAFT_ID]`)"),
    }

    mark_run_finished(now);
    if let Some(path) = &cfg.paths.metrics_textfile {
        metrics.write_textfile(path)?;
    }
    Ok(())
}
