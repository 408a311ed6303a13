// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::commands::{arg, method_id, opt, space, tag_ids};
use crate::ledger::{
    ExpenseUpdate, NewExpense, create_expense, delete_expense, get_expense, list_expenses, update_expense,
};
use crate::models::ExpenseType;
use crate::spaces::list_tags;
use crate::utils::{fmt_money, fmt_ts, maybe_print_json, parse_amount, parse_datetime, pretty_table};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub, now)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("edit", sub)) => edit(conn, sub, now)?,
        Some(("rm", sub)) => {
            let id = arg(sub, "id")?;
            delete_expense(conn, id)?;
            println!("Removed expense {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let kind: ExpenseType = opt(sub, "type").unwrap_or("expense").parse()?;
    let date = match opt(sub, "date") {
        Some(s) => parse_datetime(s)?,
        None => now,
    };
    let expense = create_expense(
        conn,
        NewExpense {
            space_id: space.id.clone(),
            description: arg(sub, "description")?.to_string(),
            amount_cents: parse_amount(arg(sub, "amount")?)?,
            r#type: kind,
            date,
            payment_method_id: method_id(conn, &space.id, sub)?,
            tag_ids: tag_ids(conn, &space.id, sub)?,
        },
        now,
    )?;
    println!(
        "Recorded {} '{}' of {} on {}",
        expense.r#type.as_str(),
        expense.description,
        fmt_money(expense.amount_cents),
        fmt_ts(&expense.date)
    );
    Ok(())
}

fn edit(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let current = get_expense(conn, arg(sub, "id")?)?;
    let tags = if sub.contains_id("tag") {
        tag_ids(conn, &current.space_id, sub)?
    } else {
        current.tag_ids.clone()
    };
    let payment_method_id = if sub.contains_id("method") {
        method_id(conn, &current.space_id, sub)?
    } else {
        current.payment_method_id.clone()
    };
    let upd = ExpenseUpdate {
        description: opt(sub, "description")
            .map(str::to_string)
            .unwrap_or_else(|| current.description.clone()),
        amount_cents: match opt(sub, "amount") {
            Some(s) => parse_amount(s)?,
            None => current.amount_cents,
        },
        r#type: match opt(sub, "type") {
            Some(s) => s.parse::<ExpenseType>()?,
            None => current.r#type,
        },
        date: match opt(sub, "date") {
            Some(s) => parse_datetime(s)?,
            None => current.date,
        },
        payment_method_id,
        tag_ids: tags,
    };
    let expense = update_expense(conn, &current.id, upd, now)?;
    println!(
        "Updated expense '{}': {} on {}",
        expense.description,
        fmt_money(expense.amount_cents),
        fmt_ts(&expense.date)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.description.clone(),
                    r.r#type.clone(),
                    r.amount.clone(),
                    r.tags.join(", "),
                    r.recurring_expense_id.clone().unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Description", "Type", "Amount", "Tags", "Rule"], rows)
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ExpenseRow {
    pub id: String,
    pub date: String,
    pub description: String,
    pub r#type: String,
    pub amount: String,
    pub tags: Vec<String>,
    pub recurring_expense_id: Option<String>,
}

/// Expenses of `--space`, newest first, honouring `--limit`.
pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<ExpenseRow>> {
    let space = space(conn, sub)?;
    let limit = sub.get_one::<usize>("limit").copied();
    let tag_names: HashMap<String, String> = list_tags(conn, &space.id)?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    let rows = list_expenses(conn, &space.id, limit)?
        .into_iter()
        .map(|e| ExpenseRow {
            date: fmt_ts(&e.date),
            tags: e
                .tag_ids
                .iter()
                .filter_map(|id| tag_names.get(id).cloned())
                .collect(),
            id: e.id,
            description: e.description,
            r#type: e.r#type.as_str().to_string(),
            amount: fmt_money(e.amount_cents),
            recurring_expense_id: e.recurring_expense_id,
        })
        .collect();
    Ok(rows)
}
