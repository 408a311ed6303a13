// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{arg, opt, space, yes_no};
use crate::models::Frequency;
use crate::recurring::deposits::{self, NewRecurringDeposit, RecurringDepositUpdate};
use crate::spaces::{list_accounts, resolve_account};
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
            let rule = deposits::toggle(conn, arg(sub, "id")?, now)?;
            println!(
                "Recurring deposit {} is now {}",
                rule.id,
                if rule.schedule.is_active { "active" } else { "paused" }
            );
        }
        Some(("rm", sub)) => {
            let id = arg(sub, "id")?;
            deposits::delete(conn, id)?;
            println!("Removed recurring deposit {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let space = space(conn, sub)?;
    let account = resolve_account(conn, &space.id, arg(sub, "account")?)?;
    let rule = deposits::create(
        conn,
        NewRecurringDeposit {
            space_id: space.id.clone(),
            account_id: account.id.clone(),
            amount_cents: parse_amount(arg(sub, "amount")?)?,
            frequency: arg(sub, "frequency")?.parse()?,
            start_date: parse_datetime(arg(sub, "start")?)?,
            end_date: opt(sub, "end").map(parse_end_datetime).transpose()?,
            title: opt(sub, "title").unwrap_or("").to_string(),
        },
        now,
    )?;
    println!(
        "Added recurring deposit of {} into '{}' ({}), {}, first on {}",
        fmt_money(rule.amount_cents),
        account.name,
        rule.id,
        rule.schedule.frequency,
        fmt_ts(&rule.schedule.next_occurrence)
    );
    Ok(())
}

fn edit(conn: &Connection, sub: &clap::ArgMatches, now: NaiveDateTime) -> Result<()> {
    let current = deposits::get(conn, arg(sub, "id")?)?;
    let account_id = match opt(sub, "account") {
        Some(key) => resolve_account(conn, &current.space_id, key)?.id,
        None => current.account_id.clone(),
    };
    let end_date = if sub.get_flag("no-end") {
        None
    } else {
        match opt(sub, "end") {
            Some(s) => Some(parse_end_datetime(s)?),
            None => current.schedule.end_date,
        }
    };
    let upd = RecurringDepositUpdate {
        account_id,
        amount_cents: match opt(sub, "amount") {
            Some(s) => parse_amount(s)?,
            None => current.amount_cents,
        },
        frequency: match opt(sub, "frequency") {
            Some(s) => s.parse::<Frequency>()?,
            None => current.schedule.frequency,
        },
        start_date: match opt(sub, "start") {
            Some(s) => parse_datetime(s)?,
            None => current.schedule.start_date,
        },
        end_date,
        title: opt(sub, "title")
            .map(str::to_string)
            .unwrap_or_else(|| current.title.clone()),
    };
    let rule = deposits::update(conn, &current.id, upd, now)?;
    println!(
        "Updated recurring deposit {}, next on {}",
        rule.id,
        fmt_ts(&rule.schedule.next_occurrence)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let space = space(conn, sub)?;
    let data = deposits::list_for_space(conn, &space.id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let accounts = list_accounts(conn, &space.id)?;
        let rows = data
            .into_iter()
            .map(|r| {
                let account = accounts
                    .iter()
                    .find(|a| a.id == r.account_id)
                    .map(|a| a.name.clone())
                    .unwrap_or(r.account_id);
                vec![
                    r.id,
                    r.title,
                    account,
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
                &["ID", "Title", "Account", "Amount", "Frequency", "Next", "Ends", "Active"],
                rows,
            )
        );
    }
    Ok(())
}
