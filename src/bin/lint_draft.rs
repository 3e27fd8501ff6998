//! Lint a draft for stock generative phrasing.
//!
//! `lint-draft [FILE]` reads FILE (or stdin) and prints the report. Extra rules
//! come from `compose.lint_rules_path` in the loaded config. Exits non-zero when
//! the score is above the configured threshold.

use std::io::Read;

use anyhow::{Context, Result};

use feed_curator::compose::lint::{format_report, LintChecker};
use feed_curator::{config, init_tracing};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("reading stdin")?;
            s
        }
    };

    let cfg = config::load_default()?;
    let checker = LintChecker::with_rules_file(cfg.compose.lint_rules_path.as_deref())?;
    let result = checker.check(&text);
    println!("{}", format_report(&result));

    if result.score > cfg.compose.lint_threshold {
        std::process::exit(1);
    }
    Ok(())
}
