// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::arg;
use crate::spaces::{create_space, list_spaces};
use crate::utils::{fmt_ts, maybe_print_json, pretty_table};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let space = create_space(conn, arg(sub, "name")?, now)?;
            println!("Added space '{}' ({})", space.name, space.id);
        }
        Some(("list", sub)) => {
            let data = list_spaces(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|s| vec![s.id, s.name, fmt_ts(&s.created_at)])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name", "Created"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
