// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::SystemClock;
use crate::commands::{at_or, opt};
use crate::recurring::TickReport;
use crate::scheduler::{Engine, Scheduler};
use crate::utils::{fmt_ts, maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::info;

/// `process`: one synchronous run, for a single space or for all of them.
pub fn handle(engine: &Engine, m: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let at = at_or(m, now)?;
    let report = match opt(m, "space") {
        Some(key) => {
            let space = engine.with_connection(|conn| crate::spaces::resolve_space(conn, key))?;
            engine.process_space_now(&space.id, at)?
        }
        None => engine.tick(at, None),
    };
    print_report(m, &report)
}

fn print_report(m: &clap::ArgMatches, report: &TickReport) -> Result<()> {
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), report)? {
        return Ok(());
    }
    if report.processed.is_empty() && report.failures.is_empty() {
        println!("Nothing due");
        return Ok(());
    }
    let mut rows: Vec<Vec<String>> = report
        .processed
        .iter()
        .map(|r| {
            vec![
                r.kind.to_string(),
                r.rule_id.clone(),
                r.materialized.to_string(),
                r.skipped.to_string(),
                fmt_ts(&r.next_occurrence),
                if r.is_active { "active".into() } else { "ended".into() },
            ]
        })
        .collect();
    for f in &report.failures {
        rows.push(vec![
            f.kind.to_string(),
            f.rule_id.clone(),
            "-".into(),
            "-".into(),
            "-".into(),
            format!("failed: {}", f.error),
        ]);
    }
    println!(
        "{}",
        pretty_table(
            &["Kind", "Rule", "Written", "Skipped", "Next", "State"],
            rows
        )
    );
    Ok(())
}

/// `scheduler`: ticks until Ctrl-C.
pub fn run_scheduler(engine: Engine, interval: Duration) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let scheduler = Scheduler::new(Arc::new(engine), Arc::new(SystemClock), interval);
        let handle = scheduler.start();
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("shutdown requested");
        handle.stop().await;
        Ok(())
    })
}
