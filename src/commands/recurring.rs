// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{arg, method_id, opt, space, tag_ids, yes_no};
use crate::models::{ExpenseType, Frequency};
use crate::recurring::expenses::{
    self, NewRecurringExpense, RecurringExpenseUpdate,
};
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
        Some(("toggle", sub)) => {
            let rule = expenses::toggle(conn, arg(sub, "id")?, now)?;
            println!(
                "Recurring expense '{}' is now {}",
                rule.description,
                if rule.schedule.is_active { "active" } else { "paused" }
            );
        }
        Some(("rm", sub)) => {
            let id = arg(sub, "id")?;
            expenses::delete(conn, id)?;
            println!("Removed recurring expense {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let end_date = opt(sub, "end").map(parse_end_datetime).transpose()?;
    let rule = expenses::create(
        conn,
        NewRecurringExpense {
            space_id: space.id.clone(),
            description: arg(sub, "description")?.to_string(),
            amount_cents: parse_amount(arg(sub, "amount")?)?,
            r#type: opt(sub, "type").unwrap_or("expense").parse()?,
            payment_method_id: method_id(conn, &space.id, sub)?,
            frequency: arg(sub, "frequency")?.parse()?,
            start_date: parse_datetime(arg(sub, "start")?)?,
            end_date,
            tag_ids: tag_ids(conn, &space.id, sub)?,
        },
        now,
    )?;
    println!(
        "Added recurring expense '{}' ({}), {} {}, first on {}",
        rule.description,
        rule.id,
        rule.schedule.frequency,
        fmt_money(rule.amount_cents),
        fmt_ts(&rule.schedule.next_occurrence)
    );
    Ok(())
}

fn edit(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let current = expenses::get(conn, arg(sub, "id")?)?;
    let end_date = if sub.get_flag("no-end") {
        None
    } else {
        match opt(sub, "end") {
            Some(s) => Some(parse_end_datetime(s)?),
            None => current.schedule.end_date,
        }
    };
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
    let upd = RecurringExpenseUpdate {
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
        payment_method_id,
        frequency: match opt(sub, "frequency") {
            Some(s) => s.parse::<Frequency>()?,
            None => current.schedule.frequency,
        },
        start_date: match opt(sub, "start") {
            Some(s) => parse_datetime(s)?,
            None => current.schedule.start_date,
        },
        end_date,
        tag_ids: tags,
    };
    let rule = expenses::update(conn, &current.id, upd, now)?;
    println!(
        "Updated recurring expense '{}', next on {}",
        rule.description,
        fmt_ts(&rule.schedule.next_occurrence)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let space = space(conn, sub)?;
    let data = expenses::list_for_space(conn, &space.id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .into_iter()
            .map(|r| {
                vec![
                    r.id,
                    r.description,
                    r.r#type.as_str().to_string(),
                    fmt_money(r.amount_cents),
                    r.schedule.frequency.to_string(),
                    fmt_ts(&r.schedule.next_occurrence),
                    r.schedule.end_date.as_ref().map(fmt_ts).unwrap_or_default(),
                    yes_no(r.schedule.is_active),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Description", "Type", "Amount", "Frequency", "Next", "Ends", "Active"],
                rows,
            )
        );
    }
    Ok(())
}
