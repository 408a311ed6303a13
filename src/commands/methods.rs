// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{arg, space};
use crate::spaces::{create_payment_method, list_payment_methods};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let space = space(conn, sub)?;
            let method = create_payment_method(conn, &space.id, arg(sub, "name")?)?;
            println!("Added payment method '{}' ({})", method.name, method.id);
        }
        Some(("list", sub)) => {
            let space = space(conn, sub)?;
            let data = list_payment_methods(conn, &space.id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data.into_iter().map(|p| vec![p.id, p.name]).collect();
                println!("{}", pretty_table(&["ID", "Payment method"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
