// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::RuleKind;
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::models::{AccountTransfer, Frequency, RecurringDeposit, Schedule, TransferDirection};
use crate::spaces;
use crate::utils::{fmt_ts, new_id};

const TABLE: &str = "recurring_deposits";

#[derive(Debug, Clone)]
pub struct NewRecurringDeposit {
    pub space_id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct RecurringDepositUpdate {
    pub account_id: String,
    pub amount_cents: i64,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub title: String,
}

fn ensure_account_in_space(conn: &Connection, space_id: &str, account_id: &str) -> EngineResult<()> {
    let account = spaces::get_account(conn, account_id)?;
    if account.space_id != space_id {
        return Err(EngineError::validation("account does not belong to this space"));
    }
    Ok(())
}

pub fn create(conn: &Connection, new: NewRecurringDeposit, now: NaiveDateTime) -> EngineResult<RecurringDeposit> {
    if new.amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    super::validate_window(new.start_date, new.end_date)?;
    spaces::get_space(conn, &new.space_id)?;
    ensure_account_in_space(conn, &new.space_id, &new.account_id)?;

    let rule = RecurringDeposit {
        id: new_id(),
        space_id: new.space_id,
        account_id: new.account_id,
        amount_cents: new.amount_cents,
        title: new.title.trim().to_string(),
        schedule: Schedule::new(new.frequency, new.start_date, new.end_date),
        created_at: now,
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO recurring_deposits(id, space_id, account_id, amount_cents, title, frequency,
                                        start_date, end_date, next_occurrence, is_active,
                                        created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            rule.id,
            rule.space_id,
            rule.account_id,
            rule.amount_cents,
            rule.title,
            rule.schedule.frequency,
            fmt_ts(&rule.schedule.start_date),
            rule.schedule.end_date.as_ref().map(fmt_ts),
            fmt_ts(&rule.schedule.next_occurrence),
            rule.schedule.is_active,
            fmt_ts(&now),
            fmt_ts(&now),
        ],
    )?;
    Ok(rule)
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<RecurringDeposit> {
    conn.query_row(&format!("{} WHERE id=?1", SELECT), params![id], from_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("Recurring deposit", id))
}

pub fn list_for_space(conn: &Connection, space_id: &str) -> EngineResult<Vec<RecurringDeposit>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE space_id=?1 ORDER BY is_active DESC, next_occurrence ASC, id",
        SELECT
    ))?;
    let rows = stmt.query_map(params![space_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn due(conn: &Connection, space_id: Option<&str>, now: NaiveDateTime) -> EngineResult<Vec<RecurringDeposit>> {
    super::due_ids(conn, TABLE, space_id, now)?
        .iter()
        .map(|id| get(conn, id))
        .collect()
}

pub fn update(
    conn: &Connection,
    id: &str,
    upd: RecurringDepositUpdate,
    now: NaiveDateTime,
) -> EngineResult<RecurringDeposit> {
    if upd.amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    super::validate_window(upd.start_date, upd.end_date)?;
    let mut rule = get(conn, id)?;
    ensure_account_in_space(conn, &rule.space_id, &upd.account_id)?;

    rule.account_id = upd.account_id;
    rule.amount_cents = upd.amount_cents;
    rule.title = upd.title.trim().to_string();
    rule.schedule.frequency = upd.frequency;
    rule.schedule.start_date = upd.start_date;
    rule.schedule.end_date = upd.end_date;
    if rule.schedule.next_occurrence < upd.start_date {
        rule.schedule.next_occurrence = upd.start_date;
    }
    rule.updated_at = now;

    conn.execute(
        "UPDATE recurring_deposits SET account_id=?1, amount_cents=?2, title=?3, frequency=?4,
                start_date=?5, end_date=?6, next_occurrence=?7, updated_at=?8
         WHERE id=?9",
        params![
            rule.account_id,
            rule.amount_cents,
            rule.title,
            rule.schedule.frequency,
            fmt_ts(&rule.schedule.start_date),
            rule.schedule.end_date.as_ref().map(fmt_ts),
            fmt_ts(&rule.schedule.next_occurrence),
            fmt_ts(&now),
            rule.id,
        ],
    )?;
    Ok(rule)
}

pub fn delete(conn: &Connection, id: &str) -> EngineResult<()> {
    super::delete(conn, TABLE, "Recurring deposit", id)
}

pub fn set_active(conn: &Connection, id: &str, active: bool, now: NaiveDateTime) -> EngineResult<()> {
    super::set_active(conn, TABLE, id, active, now)
}

pub fn set_next_occurrence(conn: &Connection, id: &str, next: NaiveDateTime, now: NaiveDateTime) -> EngineResult<()> {
    super::set_next_occurrence(conn, TABLE, id, next, now)
}

pub fn toggle(conn: &Connection, id: &str, now: NaiveDateTime) -> EngineResult<RecurringDeposit> {
    let mut rule = get(conn, id)?;
    rule.schedule.is_active = !rule.schedule.is_active;
    set_active(conn, id, rule.schedule.is_active, now)?;
    rule.updated_at = now;
    Ok(rule)
}

const SELECT: &str = "SELECT id, space_id, account_id, amount_cents, title, frequency, start_date,
        end_date, next_occurrence, is_active, created_at, updated_at
        FROM recurring_deposits";

fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RecurringDeposit> {
    Ok(RecurringDeposit {
        id: r.get(0)?,
        space_id: r.get(1)?,
        account_id: r.get(2)?,
        amount_cents: r.get(3)?,
        title: r.get(4)?,
        schedule: Schedule {
            frequency: r.get(5)?,
            start_date: r.get(6)?,
            end_date: r.get(7)?,
            next_occurrence: r.get(8)?,
            is_active: r.get(9)?,
        },
        created_at: r.get(10)?,
        updated_at: r.get(11)?,
    })
}

impl RuleKind for RecurringDeposit {
    const KIND: &'static str = "recurring_deposit";
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

    /// Deposits only when the space's unallocated balance covers the amount.
    fn materialize_one(
        &self,
        conn: &Connection,
        occurrence: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<bool> {
        spaces::get_account(conn, &self.account_id)?;
        let available = ledger::available_balance(conn, &self.space_id)?;
        if available < self.amount_cents {
            warn!(
                recurring_deposit_id = %self.id,
                space_id = %self.space_id,
                occurrence = %occurrence,
                needed = self.amount_cents,
                available,
                shortfall = self.amount_cents - available,
                "recurring deposit skipped: insufficient available balance"
            );
            return Ok(false);
        }
        let transfer = AccountTransfer {
            id: new_id(),
            account_id: self.account_id.clone(),
            amount_cents: self.amount_cents,
            direction: TransferDirection::Deposit,
            note: self.title.clone(),
            recurring_deposit_id: Some(self.id.clone()),
            created_at: now,
        };
        ledger::insert_transfer(conn, &transfer)?;
        Ok(true)
    }
}
