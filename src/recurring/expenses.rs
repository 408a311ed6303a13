// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};

use super::RuleKind;
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::models::{Expense, ExpenseType, Frequency, RecurringExpense, Schedule};
use crate::spaces::{self, ensure_payment_method_in_space, ensure_tags_in_space};
use crate::utils::{fmt_ts, new_id};

const TABLE: &str = "recurring_expenses";

#[derive(Debug, Clone)]
pub struct NewRecurringExpense {
    pub space_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub payment_method_id: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecurringExpenseUpdate {
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub payment_method_id: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub tag_ids: Vec<String>,
}

fn validate(description: &str, amount_cents: i64) -> EngineResult<()> {
    if description.trim().is_empty() {
        return Err(EngineError::validation("description cannot be empty"));
    }
    if amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    Ok(())
}

pub fn create(conn: &Connection, new: NewRecurringExpense, now: NaiveDateTime) -> EngineResult<RecurringExpense> {
    validate(&new.description, new.amount_cents)?;
    super::validate_window(new.start_date, new.end_date)?;
    spaces::get_space(conn, &new.space_id)?;
    ensure_tags_in_space(conn, &new.space_id, &new.tag_ids)?;
    ensure_payment_method_in_space(conn, &new.space_id, new.payment_method_id.as_deref())?;

    let rule = RecurringExpense {
        id: new_id(),
        space_id: new.space_id,
        description: new.description.trim().to_string(),
        amount_cents: new.amount_cents,
        r#type: new.r#type,
        payment_method_id: new.payment_method_id,
        tag_ids: new.tag_ids,
        schedule: Schedule::new(new.frequency, new.start_date, new.end_date),
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO recurring_expenses(id, space_id, description, amount_cents, type, payment_method_id,
                                        frequency, start_date, end_date, next_occurrence, is_active,
                                        created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            rule.id,
            rule.space_id,
            rule.description,
            rule.amount_cents,
            rule.r#type,
            rule.payment_method_id,
            rule.schedule.frequency,
            fmt_ts(&rule.schedule.start_date),
            rule.schedule.end_date.as_ref().map(fmt_ts),
            fmt_ts(&rule.schedule.next_occurrence),
            rule.schedule.is_active,
            fmt_ts(&now),
            fmt_ts(&now),
        ],
    )?;
    replace_tags(&tx, &rule.id, &rule.tag_ids)?;
    tx.commit()?;
    Ok(rule)
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<RecurringExpense> {
    let mut rule = conn
        .query_row(&format!("{} WHERE id=?1", SELECT), params![id], from_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("Recurring expense", id))?;
    rule.tag_ids = tag_ids(conn, &rule.id)?;
    Ok(rule)
}

/// Active rules first, then by next occurrence.
pub fn list_for_space(conn: &Connection, space_id: &str) -> EngineResult<Vec<RecurringExpense>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE space_id=?1 ORDER BY is_active DESC, next_occurrence ASC, id",
        SELECT
    ))?;
    let rows = stmt.query_map(params![space_id], from_row)?;
    let mut data = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for rule in &mut data {
        rule.tag_ids = tag_ids(conn, &rule.id)?;
    }
    Ok(data)
}

/// Active rules due at or before `now`, across all spaces or within one.
pub fn due(conn: &Connection, space_id: Option<&str>, now: NaiveDateTime) -> EngineResult<Vec<RecurringExpense>> {
    super::due_ids(conn, TABLE, space_id, now)?
        .iter()
        .map(|id| get(conn, id))
        .collect()
}

/// Applies a user edit. A next occurrence that has fallen behind the new
/// start date is pulled forward to it.
pub fn update(
    conn: &Connection,
    id: &str,
    upd: RecurringExpenseUpdate,
    now: NaiveDateTime,
) -> EngineResult<RecurringExpense> {
    validate(&upd.description, upd.amount_cents)?;
    super::validate_window(upd.start_date, upd.end_date)?;
    let mut rule = get(conn, id)?;
    ensure_tags_in_space(conn, &rule.space_id, &upd.tag_ids)?;
    ensure_payment_method_in_space(conn, &rule.space_id, upd.payment_method_id.as_deref())?;

    rule.description = upd.description.trim().to_string();
    rule.amount_cents = upd.amount_cents;
    rule.r#type = upd.r#type;
    rule.payment_method_id = upd.payment_method_id;
    rule.tag_ids = upd.tag_ids;
    rule.schedule.frequency = upd.frequency;
    rule.schedule.start_date = upd.start_date;
    rule.schedule.end_date = upd.end_date;
    if rule.schedule.next_occurrence < upd.start_date {
        rule.schedule.next_occurrence = upd.start_date;
    }
    rule.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE recurring_expenses SET description=?1, amount_cents=?2, type=?3, payment_method_id=?4,
                frequency=?5, start_date=?6, end_date=?7, next_occurrence=?8, updated_at=?9
         WHERE id=?10",
        params![
            rule.description,
            rule.amount_cents,
            rule.r#type,
            rule.payment_method_id,
            rule.schedule.frequency,
            fmt_ts(&rule.schedule.start_date),
            rule.schedule.end_date.as_ref().map(fmt_ts),
            fmt_ts(&rule.schedule.next_occurrence),
            fmt_ts(&now),
            rule.id,
        ],
    )?;
    replace_tags(&tx, &rule.id, &rule.tag_ids)?;
    tx.commit()?;
    Ok(rule)
}

/// Generated expenses survive; their back-reference is cleared.
pub fn delete(conn: &Connection, id: &str) -> EngineResult<()> {
    super::delete(conn, TABLE, "Recurring expense", id)
}

pub fn set_active(conn: &Connection, id: &str, active: bool, now: NaiveDateTime) -> EngineResult<()> {
    super::set_active(conn, TABLE, id, active, now)
}

pub fn set_next_occurrence(conn: &Connection, id: &str, next: NaiveDateTime, now: NaiveDateTime) -> EngineResult<()> {
    super::set_next_occurrence(conn, TABLE, id, next, now)
}

/// Flips the active flag and returns the updated rule.
pub fn toggle(conn: &Connection, id: &str, now: NaiveDateTime) -> EngineResult<RecurringExpense> {
    let mut rule = get(conn, id)?;
    rule.schedule.is_active = !rule.schedule.is_active;
    set_active(conn, id, rule.schedule.is_active, now)?;
    rule.updated_at = now;
    Ok(rule)
}

const SELECT: &str = "SELECT id, space_id, description, amount_cents, type, payment_method_id, frequency,
        start_date, end_date, next_occurrence, is_active, created_at, updated_at
        FROM recurring_expenses";

fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RecurringExpense> {
    Ok(RecurringExpense {
        id: r.get(0)?,
        space_id: r.get(1)?,
        description: r.get(2)?,
        amount_cents: r.get(3)?,
        r#type: r.get(4)?,
        payment_method_id: r.get(5)?,
        tag_ids: Vec::new(),
        schedule: Schedule {
            frequency: r.get(6)?,
            start_date: r.get(7)?,
            end_date: r.get(8)?,
            next_occurrence: r.get(9)?,
            is_active: r.get(10)?,
        },
        created_at: r.get(11)?,
        updated_at: r.get(12)?,
    })
}

fn tag_ids(conn: &Connection, rule_id: &str) -> EngineResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT tag_id FROM recurring_expense_tags WHERE recurring_expense_id=?1 ORDER BY tag_id",
    )?;
    let rows = stmt.query_map(params![rule_id], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn replace_tags(conn: &Connection, rule_id: &str, tag_ids: &[String]) -> EngineResult<()> {
    conn.execute(
        "DELETE FROM recurring_expense_tags WHERE recurring_expense_id=?1",
        params![rule_id],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO recurring_expense_tags(recurring_expense_id, tag_id) VALUES (?1, ?2)",
    )?;
    for tag_id in tag_ids {
        stmt.execute(params![rule_id, tag_id])?;
    }
    Ok(())
}

impl RuleKind for RecurringExpense {
    const KIND: &'static str = "recurring_expense";
    const TABLE: &'static str = TABLE;

    fn load(conn: &Connection, id: &str) -> EngineResult<Self> {
        get(conn, id)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn space_id(&self) -> &str {
        &self.space_id
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Always writes an expense dated at the occurrence.
    fn materialize_one(
        &self,
        conn: &Connection,
        occurrence: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<bool> {
        let expense = Expense {
            id: new_id(),
            space_id: self.space_id.clone(),
            description: self.description.clone(),
            amount_cents: self.amount_cents,
            r#type: self.r#type,
            date: occurrence,
            payment_method_id: self.payment_method_id.clone(),
            recurring_expense_id: Some(self.id.clone()),
            tag_ids: self.tag_ids.clone(),
            created_at: now,
            updated_at: now,
        };
        ledger::insert_expense(conn, &expense)?;
        Ok(true)
    }
}
