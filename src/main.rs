// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::time::Duration;

use anyhow::Result;

use budgit::clock::{Clock, SystemClock};
use budgit::config::Config;
use budgit::scheduler::Engine;
use budgit::{cli, commands, db, utils};

fn main() -> Result<()> {
    utils::init_tracing();
    let config = Config::from_env()?;
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let conn = db::open_or_init(&config)?;
    let now = SystemClock.now();

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path(&config)?.display());
        }
        Some(("space", sub)) => commands::spaces::handle(&conn, sub, now)?,
        Some(("account", sub)) => commands::accounts::handle(&conn, sub, now)?,
        Some(("tag", sub)) => commands::tags::handle(&conn, sub)?,
        Some(("method", sub)) => commands::methods::handle(&conn, sub)?,
        Some(("expense", sub)) => commands::expenses::handle(&conn, sub, now)?,
        Some(("recurring", sub)) => commands::recurring::handle(&conn, sub, now)?,
        Some(("deposit", sub)) => commands::deposits::handle(&conn, sub, now)?,
        Some(("budget", sub)) => commands::budgets::handle(&conn, sub, now)?,
        Some(("report", sub)) => commands::reports::handle(&conn, sub)?,
        Some(("process", sub)) => {
            let engine = Engine::new(conn, config.max_catch_up);
            commands::process::handle(&engine, sub, now)?
        }
        Some(("scheduler", sub)) => {
            let interval = sub
                .get_one::<u64>("interval-secs")
                .map(|s| Duration::from_secs(*s))
                .unwrap_or(config.tick_interval);
            commands::process::run_scheduler(Engine::new(conn, config.max_catch_up), interval)?
        }
        Some(("doctor", _)) => commands::doctor::handle(&conn, now)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
