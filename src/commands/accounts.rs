// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{arg, opt, space};
use crate::ledger::{account_balances, create_transfer, delete_transfer, list_transfers};
use crate::models::TransferDirection;
use crate::spaces::{create_account, resolve_account};
use crate::utils::{fmt_money, fmt_ts, maybe_print_json, parse_amount, pretty_table};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let space = space(conn, sub)?;
            let account = create_account(conn, &space.id, arg(sub, "name")?, now)?;
            println!("Added account '{}' to {} ({})", account.name, space.name, account.id);
        }
        Some(("list", sub)) => {
            let space = space(conn, sub)?;
            let data = account_balances(conn, &space.id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|a| vec![a.account.id, a.account.name, fmt_money(a.balance_cents)])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name", "Balance"], rows));
            }
        }
        Some(("transfer", sub)) => transfer(conn, sub, now)?,
        Some(("history", sub)) => {
            let space = space(conn, sub)?;
            let account = resolve_account(conn, &space.id, arg(sub, "account")?)?;
            let data = list_transfers(conn, &account.id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|t| {
                        vec![
                            fmt_ts(&t.created_at),
                            t.direction.as_str().to_string(),
                            fmt_money(t.direction.signed(t.amount_cents)),
                            t.note,
                            t.recurring_deposit_id.unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["When", "Direction", "Amount", "Note", "Rule"], rows)
                );
            }
        }
        Some(("transfer-rm", sub)) => {
            let id = arg(sub, "id")?;
            delete_transfer(conn, id)?;
            println!("Deleted transfer {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn transfer(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let account = resolve_account(conn, &space.id, arg(sub, "account")?)?;
    let amount = parse_amount(arg(sub, "amount")?)?;
    let direction: TransferDirection = arg(sub, "direction")?.parse()?;
    let note = opt(sub, "note").unwrap_or("");
    let t = create_transfer(conn, &account.id, amount, direction, note, now)
        .with_context(|| format!("Transfer to account '{}'", account.name))?;
    println!(
        "Recorded {} of {} for '{}'",
        t.direction.as_str(),
        fmt_money(t.amount_cents),
        account.name
    );
    Ok(())
}
