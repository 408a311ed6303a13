// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger;
use crate::models::{BudgetPeriod, Frequency};
use crate::spaces::list_spaces;
use crate::utils::{fmt_money, fmt_ts, pretty_table};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub issue: &'static str,
    pub detail: String,
}

fn finding(issue: &'static str, detail: String) -> Finding {
    Finding { issue, detail }
}

pub fn handle(conn: &Connection, now: NaiveDateTime) -> Result<()> {
    let rows: Vec<Vec<String>> = findings(conn, now)?
        .into_iter()
        .map(|f| vec![f.issue.to_string(), f.detail])
        .collect();
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn findings(conn: &Connection, now: NaiveDateTime) -> Result<Vec<Finding>> {
    let mut out = Vec::new();

    // 1) Stored kinds the engine does not recognise; they run as monthly
    for table in ["recurring_expenses", "recurring_deposits"] {
        let mut stmt = conn.prepare(&format!("SELECT id, frequency FROM {} ORDER BY id", table))?;
        let mut cur = stmt.query([])?;
        while let Some(r) = cur.next()? {
            let id: String = r.get(0)?;
            let raw: String = r.get(1)?;
            if raw.parse::<Frequency>().is_err() {
                out.push(finding("unknown_frequency", format!("{} {}: '{}'", table, id, raw)));
            }
        }
    }
    let mut stmt = conn.prepare("SELECT id, period FROM budgets ORDER BY id")?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: String = r.get(0)?;
        let raw: String = r.get(1)?;
        if raw.parse::<BudgetPeriod>().is_err() {
            out.push(finding("unknown_period", format!("budget {}: '{}'", id, raw)));
        }
    }

    // 2) Active rules with missed occurrences, or already past their end date
    let now_s = fmt_ts(&now);
    for table in ["recurring_expenses", "recurring_deposits"] {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, next_occurrence, end_date FROM {}
             WHERE is_active=1 AND next_occurrence<=?1 ORDER BY next_occurrence",
            table
        ))?;
        let mut cur = stmt.query(params![now_s])?;
        while let Some(r) = cur.next()? {
            let id: String = r.get(0)?;
            let next: String = r.get(1)?;
            let end: Option<String> = r.get(2)?;
            if end.as_deref().is_some_and(|end| next.as_str() > end) {
                out.push(finding(
                    "active_past_end",
                    format!("{} {}: next {} after end {}", table, id, next, end.unwrap_or_default()),
                ));
            } else {
                out.push(finding("overdue_rule", format!("{} {}: due since {}", table, id, next)));
            }
        }
    }

    // 3) Balances that the transfer rules should have prevented
    for space in list_spaces(conn)? {
        let available = ledger::available_balance(conn, &space.id)?;
        if available < 0 {
            out.push(finding(
                "negative_available",
                format!("space {}: {}", space.name, fmt_money(available)),
            ));
        }
        for a in ledger::account_balances(conn, &space.id)? {
            if a.balance_cents < 0 {
                out.push(finding(
                    "negative_account",
                    format!("{} / {}: {}", space.name, a.account.name, fmt_money(a.balance_cents)),
                ));
            }
        }
    }

    Ok(out)
}
