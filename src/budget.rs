// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Tag budgets and their spend for the current period.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::models::{Budget, BudgetPeriod, BudgetStatus, BudgetWithSpent};
use crate::period;
use crate::spaces::{self, ensure_tags_in_space};
use crate::utils::{fmt_ts, new_id};

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub space_id: String,
    pub tag_ids: Vec<String>,
    pub amount_cents: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct BudgetUpdate {
    pub tag_ids: Vec<String>,
    pub amount_cents: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
}

fn validate(
    conn: &Connection,
    space_id: &str,
    tag_ids: &[String],
    amount_cents: i64,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
) -> EngineResult<()> {
    if amount_cents <= 0 {
        return Err(EngineError::validation("budget amount must be positive"));
    }
    if tag_ids.is_empty() {
        return Err(EngineError::validation("a budget needs at least one tag"));
    }
    if end.is_some_and(|end| end < start) {
        return Err(EngineError::validation("end date cannot be before start date"));
    }
    ensure_tags_in_space(conn, space_id, tag_ids)
}

pub fn create(conn: &Connection, new: NewBudget, now: NaiveDateTime) -> EngineResult<Budget> {
    spaces::get_space(conn, &new.space_id)?;
    validate(
        conn,
        &new.space_id,
        &new.tag_ids,
        new.amount_cents,
        new.start_date,
        new.end_date,
    )?;
    let budget = Budget {
        id: new_id(),
        space_id: new.space_id,
        tag_ids: new.tag_ids,
        amount_cents: new.amount_cents,
        period: new.period,
        start_date: new.start_date,
        end_date: new.end_date,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO budgets(id, space_id, amount_cents, period, start_date, end_date, is_active,
                             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            budget.id,
            budget.space_id,
            budget.amount_cents,
            budget.period,
            fmt_ts(&budget.start_date),
            budget.end_date.as_ref().map(fmt_ts),
            budget.is_active,
            fmt_ts(&now),
            fmt_ts(&now),
        ],
    )?;
    replace_tags(&tx, &budget.id, &budget.tag_ids)?;
    tx.commit()?;
    Ok(budget)
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<Budget> {
    let mut budget = conn
        .query_row(&format!("{} WHERE id=?1", SELECT), params![id], from_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("Budget", id))?;
    budget.tag_ids = tag_ids(conn, &budget.id)?;
    Ok(budget)
}

pub fn list_for_space(conn: &Connection, space_id: &str) -> EngineResult<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE space_id=?1 ORDER BY is_active DESC, start_date, id",
        SELECT
    ))?;
    let rows = stmt.query_map(params![space_id], from_row)?;
    let mut data = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for budget in &mut data {
        budget.tag_ids = tag_ids(conn, &budget.id)?;
    }
    Ok(data)
}

pub fn update(conn: &Connection, id: &str, upd: BudgetUpdate, now: NaiveDateTime) -> EngineResult<Budget> {
    let mut budget = get(conn, id)?;
    validate(
        conn,
        &budget.space_id,
        &upd.tag_ids,
        upd.amount_cents,
        upd.start_date,
        upd.end_date,
    )?;
    budget.tag_ids = upd.tag_ids;
    budget.amount_cents = upd.amount_cents;
    budget.period = upd.period;
    budget.start_date = upd.start_date;
    budget.end_date = upd.end_date;
    budget.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE budgets SET amount_cents=?1, period=?2, start_date=?3, end_date=?4, updated_at=?5
         WHERE id=?6",
        params![
            budget.amount_cents,
            budget.period,
            fmt_ts(&budget.start_date),
            budget.end_date.as_ref().map(fmt_ts),
            fmt_ts(&now),
            budget.id,
        ],
    )?;
    replace_tags(&tx, &budget.id, &budget.tag_ids)?;
    tx.commit()?;
    Ok(budget)
}

pub fn delete(conn: &Connection, id: &str) -> EngineResult<()> {
    let n = conn.execute("DELETE FROM budgets WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(EngineError::not_found("Budget", id));
    }
    Ok(())
}

pub fn set_active(conn: &Connection, id: &str, active: bool, now: NaiveDateTime) -> EngineResult<()> {
    let n = conn.execute(
        "UPDATE budgets SET is_active=?1, updated_at=?2 WHERE id=?3",
        params![active, fmt_ts(&now), id],
    )?;
    if n == 0 {
        return Err(EngineError::not_found("Budget", id));
    }
    Ok(())
}

/// Spend of one budget over the period containing `now`.
pub fn evaluate(conn: &Connection, budget: Budget, now: NaiveDateTime) -> EngineResult<BudgetWithSpent> {
    let (period_start, period_end) = period::bounds(budget.period, now);
    let spent_cents = ledger::spent_for_tags(
        conn,
        &budget.space_id,
        &budget.tag_ids,
        period_start,
        period_end,
    )?;
    let exact = percentage(spent_cents, budget.amount_cents);
    Ok(BudgetWithSpent {
        budget,
        period_start,
        period_end,
        spent_cents,
        percentage: exact.round_dp(2),
        status: BudgetStatus::classify(exact),
    })
}

/// Every active budget of the space whose window covers `now`, with its
/// current-period spend.
pub fn budgets_with_spent(
    conn: &Connection,
    space_id: &str,
    now: NaiveDateTime,
) -> EngineResult<Vec<BudgetWithSpent>> {
    let mut out = Vec::new();
    for budget in list_for_space(conn, space_id)? {
        if !budget.is_active || !budget.covers(now) {
            continue;
        }
        out.push(evaluate(conn, budget, now)?);
    }
    Ok(out)
}

/// `spent / amount * 100`. Zero when `amount` is not positive.
pub fn percentage(spent_cents: i64, amount_cents: i64) -> Decimal {
    if amount_cents <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(spent_cents) * Decimal::ONE_HUNDRED / Decimal::from(amount_cents)
}

const SELECT: &str = "SELECT id, space_id, amount_cents, period, start_date, end_date, is_active,
        created_at, updated_at FROM budgets";

fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: r.get(0)?,
        space_id: r.get(1)?,
        tag_ids: Vec::new(),
        amount_cents: r.get(2)?,
        period: r.get(3)?,
        start_date: r.get(4)?,
        end_date: r.get(5)?,
        is_active: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn tag_ids(conn: &Connection, budget_id: &str) -> EngineResult<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT tag_id FROM budget_tags WHERE budget_id=?1 ORDER BY tag_id")?;
    let rows = stmt.query_map(params![budget_id], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn replace_tags(conn: &Connection, budget_id: &str, tag_ids: &[String]) -> EngineResult<()> {
    conn.execute("DELETE FROM budget_tags WHERE budget_id=?1", params![budget_id])?;
    let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO budget_tags(budget_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![budget_id, tag_id])?;
    }
    Ok(())
}
