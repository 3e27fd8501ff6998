// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod cursor;
pub mod dedup;
pub mod drafts;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod persist;
pub mod pipeline;
pub mod select;
pub mod source_trust;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use config::AppConfig;
pub use cursor::CursorStore;
pub use drafts::{DraftRecord, DraftStore};
pub use pipeline::{post_pending_drafts, Pipeline, RunReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `CURATOR_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed_curator=info,warn"));
    let json = std::env::var("CURATOR_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}
