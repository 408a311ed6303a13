// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::budget::{self, BudgetUpdate, NewBudget};
use crate::commands::{arg, at_or, opt, space, tag_ids, yes_no};
use crate::models::BudgetPeriod;
use crate::spaces::list_tags;
use crate::utils::{
    fmt_money, fmt_ts, maybe_print_json, parse_amount, parse_datetime, parse_end_datetime,
    pretty_table,
};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub, now)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("edit", sub)) => edit(conn, sub, now)?,
        Some(("report", sub)) => report(conn, sub, now)?,
        Some(("toggle", sub)) => {
            let current = budget::get(conn, arg(sub, "id")?)?;
            budget::set_active(conn, &current.id, !current.is_active, now)?;
            println!(
                "Budget {} is now {}",
                current.id,
                if current.is_active { "inactive" } else { "active" }
            );
        }
        Some(("rm", sub)) => {
            let id = arg(sub, "id")?;
            budget::delete(conn, id)?;
            println!("Removed budget {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let period: BudgetPeriod = opt(sub, "period").unwrap_or("monthly").parse()?;
    let start_date = match opt(sub, "start") {
        Some(s) => parse_datetime(s)?,
        None => now,
    };
    let b = budget::create(
        conn,
        NewBudget {
            space_id: space.id.clone(),
            tag_ids: tag_ids(conn, &space.id, sub)?,
            amount_cents: parse_amount(arg(sub, "amount")?)?,
            period,
            start_date,
            end_date: opt(sub, "end").map(parse_end_datetime).transpose()?,
        },
        now,
    )?;
    println!(
        "Budget {} set: {} {} over {} tag(s)",
        b.id,
        fmt_money(b.amount_cents),
        b.period,
        b.tag_ids.len()
    );
    Ok(())
}

fn edit(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let current = budget::get(conn, arg(sub, "id")?)?;
    let end_date = if sub.get_flag("no-end") {
        None
    } else {
        match opt(sub, "end") {
            Some(s) => Some(parse_end_datetime(s)?),
            None => current.end_date,
        }
    };
    let upd = BudgetUpdate {
        tag_ids: if sub.contains_id("tag") {
            tag_ids(conn, &current.space_id, sub)?
        } else {
            current.tag_ids.clone()
        },
        amount_cents: match opt(sub, "amount") {
            Some(s) => parse_amount(s)?,
            None => current.amount_cents,
        },
        period: match opt(sub, "period") {
            Some(s) => s.parse::<BudgetPeriod>()?,
            None => current.period,
        },
        start_date: match opt(sub, "start") {
            Some(s) => parse_datetime(s)?,
            None => current.start_date,
        },
        end_date,
    };
    let b = budget::update(conn, &current.id, upd, now)?;
    println!(
        "Updated budget {}: {} {} over {} tag(s)",
        b.id,
        fmt_money(b.amount_cents),
        b.period,
        b.tag_ids.len()
    );
    Ok(())
}

fn tag_label(names: &HashMap<String, String>, ids: &[String]) -> String {
    ids.iter()
        .map(|id| names.get(id).cloned().unwrap_or_else(|| id.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let space = space(conn, sub)?;
    let data = budget::list_for_space(conn, &space.id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let names: HashMap<String, String> = list_tags(conn, &space.id)?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let rows = data
            .into_iter()
            .map(|b| {
                vec![
                    b.id.clone(),
                    tag_label(&names, &b.tag_ids),
                    fmt_money(b.amount_cents),
                    b.period.to_string(),
                    fmt_ts(&b.start_date),
                    b.end_date.as_ref().map(fmt_ts).unwrap_or_default(),
                    yes_no(b.is_active),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Tags", "Amount", "Period", "Starts", "Ends", "Active"],
                rows
            )
        );
    }
    Ok(())
}

fn report(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let at = at_or(sub, now)?;
    let data = budget::budgets_with_spent(conn, &space.id, at)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let names: HashMap<String, String> = list_tags(conn, &space.id)?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let rows = data
            .iter()
            .map(|b| {
                vec![
                    tag_label(&names, &b.budget.tag_ids),
                    b.budget.period.to_string(),
                    format!("{} .. {}", b.period_start.date(), b.period_end.date()),
                    fmt_money(b.budget.amount_cents),
                    fmt_money(b.spent_cents),
                    format!("{:.2}%", b.percentage),
                    b.status.as_str().to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Tags", "Period", "Window", "Budget", "Spent", "Used", "Status"],
                rows
            )
        );
    }
    Ok(())
}
