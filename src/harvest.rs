//! `harvest crawl` driver.
//!
//! Builds the selected accounts, crawls them concurrently against one
//! shared store, and prints a summary per account.

use anyhow::{bail, Context, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawl::{run_crawl_with, CrawlOptions, CrawlResult, CrawlState};
use crate::db;
use crate::provider::{build_account, Capability};

/// Crawl `target` (an account name or `all`).
///
/// `only` restricts each account to the listed capabilities; empty means
/// every configured capability. Returns the results sorted by account.
pub async fn run_harvest(
    config: &Config,
    target: &str,
    only: &[Capability],
    cancel: CancellationToken,
) -> Result<Vec<CrawlResult>> {
    let selected: Vec<_> = if target == "all" {
        config.accounts.iter().collect()
    } else {
        match config.accounts.get_key_value(target) {
            Some(entry) => vec![entry],
            None => {
                let known: Vec<&str> = config.accounts.keys().map(String::as_str).collect();
                bail!(
                    "Unknown account: '{}'. Available: all, {}",
                    target,
                    known.join(", ")
                );
            }
        }
    };
    if selected.is_empty() {
        bail!("No accounts configured");
    }

    let store = db::open_store(config).await?;
    let options = CrawlOptions {
        max_folder_depth: config.crawl.max_folder_depth,
    };

    let mut tasks = JoinSet::new();
    for (name, account_config) in selected {
        let capabilities: Vec<Capability> = account_config
            .capabilities
            .iter()
            .copied()
            .filter(|c| only.is_empty() || only.contains(c))
            .collect();
        if capabilities.is_empty() {
            println!("crawl {}: skipped (no matching capabilities)", name);
            continue;
        }

        let account = build_account(name, account_config)
            .with_context(|| format!("Failed to set up account '{}'", name))?;
        let store = store.clone();
        let options = options.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            run_crawl_with(store.as_ref(), &account, &capabilities, &options, &cancel).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("Crawl task panicked")?);
    }
    results.sort_by(|a, b| a.account.cmp(&b.account));

    for result in &results {
        print_summary(result);
    }
    Ok(results)
}

fn print_summary(result: &CrawlResult) {
    let state = match result.state {
        CrawlState::Done => "done",
        CrawlState::Aborted => "aborted",
        CrawlState::Cancelled => "cancelled",
    };
    println!("crawl {}: {}", result.account, state);
    println!("  visited: {}", result.entities_visited);
    println!("  failed: {}", result.entities_failed.len());
    println!("  deleted: {}", result.entities_deleted);
    if !result.deletions_skipped.is_empty() {
        let kept: Vec<String> = result.deletions_skipped.iter().map(|c| c.to_string()).collect();
        println!("  deletions skipped: {}", kept.join(","));
    }
    for failure in &result.entities_failed {
        println!("    ! {}", failure.error);
    }
    if let Some(ref fatal) = result.fatal {
        println!("  error: {}", fatal);
    }
}

/// Error out when any crawl did not reach DONE.
pub fn check_results(results: &[CrawlResult]) -> Result<()> {
    let stopped: Vec<&str> = results
        .iter()
        .filter(|r| r.state != CrawlState::Done)
        .map(|r| r.account.as_str())
        .collect();
    if !stopped.is_empty() {
        bail!("crawl did not complete for: {}", stopped.join(", "));
    }
    Ok(())
}
