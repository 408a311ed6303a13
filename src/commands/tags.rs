// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{arg, opt, space};
use crate::spaces::{create_tag, list_tags};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let space = space(conn, sub)?;
            let tag = create_tag(conn, &space.id, arg(sub, "name")?, opt(sub, "color"))?;
            println!("Added tag '{}' ({})", tag.name, tag.id);
        }
        Some(("list", sub)) => {
            let space = space(conn, sub)?;
            let data = list_tags(conn, &space.id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|t| vec![t.id, t.name, t.color.unwrap_or_default()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Tag", "Color"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
