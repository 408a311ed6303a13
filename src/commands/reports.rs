// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::space;
use crate::ledger;
use crate::models::AccountWithBalance;
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("balance", sub)) = m.subcommand() {
        balance(conn, sub)?
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct BalanceReport {
    pub space_id: String,
    pub space_balance_cents: i64,
    pub allocated_cents: i64,
    pub available_cents: i64,
    pub accounts: Vec<AccountWithBalance>,
}

pub fn balance_report(conn: &Connection, space_id: &str) -> Result<BalanceReport> {
    let space_balance_cents = ledger::space_balance(conn, space_id)?;
    let allocated_cents = ledger::total_allocated(conn, space_id)?;
    Ok(BalanceReport {
        space_id: space_id.to_string(),
        space_balance_cents,
        allocated_cents,
        available_cents: space_balance_cents - allocated_cents,
        accounts: ledger::account_balances(conn, space_id)?,
    })
}

fn balance(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let space = space(conn, sub)?;
    let report = balance_report(conn, &space.id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        let mut rows = vec![
            vec!["Space balance".to_string(), fmt_money(report.space_balance_cents)],
            vec!["Allocated".to_string(), fmt_money(report.allocated_cents)],
            vec!["Available".to_string(), fmt_money(report.available_cents)],
        ];
        for a in &report.accounts {
            rows.push(vec![
                format!("  {}", a.account.name),
                fmt_money(a.balance_cents),
            ]);
        }
        println!("{}", pretty_table(&[space.name.as_str(), "Amount"], rows));
    }
    Ok(())
}
