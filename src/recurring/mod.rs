// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Recurring rules and the catch-up engine that turns their missed
//! occurrences into ledger rows.
//!
//! Both rule kinds share one replay loop ([`replay`]); a kind only decides
//! what a single occurrence writes ([`RuleKind::materialize_one`]). Each
//! [`process_rule`] call runs inside one IMMEDIATE transaction: the rule is
//! re-read, replayed, and its new schedule written together with every ledger
//! row the replay produced, so a retried or concurrent run of the same rule
//! cannot write an occurrence twice.

pub mod deposits;
pub mod expenses;

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior, params};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{EngineError, EngineResult};
use crate::models::Schedule;
use crate::utils::fmt_ts;

/// One kind of recurring rule.
pub trait RuleKind: Sized {
    /// Human-readable kind, used in logs and reports.
    const KIND: &'static str;
    /// Table holding the rule rows and their schedule columns.
    const TABLE: &'static str;

    fn load(conn: &Connection, id: &str) -> EngineResult<Self>;

    fn id(&self) -> &str;

    fn space_id(&self) -> &str;

    fn schedule(&self) -> &Schedule;

    /// Applies the ledger effect of the occurrence at `occurrence`. Returns
    /// `false` when the occurrence was skipped without writing anything.
    fn materialize_one(
        &self,
        conn: &Connection,
        occurrence: NaiveDateTime,
        now: NaiveDateTime,
    ) -> EngineResult<bool>;
}

/// Counters of a single replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub occurrences: usize,
    pub materialized: usize,
    pub skipped: usize,
    pub deactivated: bool,
}

/// Replays every occurrence of `schedule` that is due at `now`, advancing
/// `next_occurrence` past each one and deactivating the schedule once it runs
/// beyond its end date.
///
/// At most `limit` occurrences are replayed; needing more is an error and the
/// caller must discard whatever was written.
pub fn replay<F>(
    rule_id: &str,
    schedule: &mut Schedule,
    now: NaiveDateTime,
    limit: usize,
    mut materialize_one: F,
) -> EngineResult<ReplayOutcome>
where
    F: FnMut(NaiveDateTime) -> EngineResult<bool>,
{
    let mut outcome = ReplayOutcome::default();
    while schedule.next_occurrence <= now {
        if schedule.past_end(schedule.next_occurrence) {
            schedule.is_active = false;
            outcome.deactivated = true;
            return Ok(outcome);
        }
        if outcome.occurrences >= limit {
            return Err(EngineError::CatchUpLimit {
                rule_id: rule_id.to_string(),
                limit,
            });
        }
        if materialize_one(schedule.next_occurrence)? {
            outcome.materialized += 1;
        } else {
            outcome.skipped += 1;
        }
        outcome.occurrences += 1;
        schedule.next_occurrence = schedule.advance(schedule.next_occurrence);
    }
    if schedule.past_end(schedule.next_occurrence) {
        schedule.is_active = false;
        outcome.deactivated = true;
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub kind: &'static str,
    pub rule_id: String,
    pub space_id: String,
    pub occurrences: usize,
    pub materialized: usize,
    pub skipped: usize,
    pub deactivated: bool,
    pub next_occurrence: NaiveDateTime,
    pub is_active: bool,
}

impl ReplayReport {
    fn new<R: RuleKind>(rule: &R, schedule: &Schedule, outcome: ReplayOutcome) -> Self {
        Self {
            kind: R::KIND,
            rule_id: rule.id().to_string(),
            space_id: rule.space_id().to_string(),
            occurrences: outcome.occurrences,
            materialized: outcome.materialized,
            skipped: outcome.skipped,
            deactivated: outcome.deactivated,
            next_occurrence: schedule.next_occurrence,
            is_active: schedule.is_active,
        }
    }
}

/// Brings one rule up to date with `now`.
///
/// A rule that is inactive or not yet due when re-read inside the transaction
/// produces an empty report and no writes.
pub fn process_rule<R: RuleKind>(
    conn: &mut Connection,
    id: &str,
    now: NaiveDateTime,
    limit: usize,
) -> EngineResult<ReplayReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let rule = R::load(&tx, id)?;
    let mut schedule = rule.schedule().clone();
    if !schedule.is_due(now) {
        return Ok(ReplayReport::new(&rule, &schedule, ReplayOutcome::default()));
    }

    let outcome = replay(id, &mut schedule, now, limit, |occurrence| {
        rule.materialize_one(&tx, occurrence, now)
    })?;
    save_schedule(&tx, R::TABLE, id, &schedule, now)?;
    tx.commit()?;

    debug!(
        kind = R::KIND,
        rule_id = id,
        occurrences = outcome.occurrences,
        skipped = outcome.skipped,
        deactivated = outcome.deactivated,
        next = %schedule.next_occurrence,
        "recurring rule processed"
    );
    Ok(ReplayReport::new(&rule, &schedule, outcome))
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub kind: &'static str,
    pub rule_id: String,
    pub error: String,
}

/// Result of processing a batch of due rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub processed: Vec<ReplayReport>,
    pub failures: Vec<RuleFailure>,
    pub cancelled: bool,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.processed.extend(other.processed);
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
    }

    pub fn materialized(&self) -> usize {
        self.processed.iter().map(|r| r.materialized).sum()
    }

    pub fn skipped(&self) -> usize {
        self.processed.iter().map(|r| r.skipped).sum()
    }
}

/// Processes every due rule of kind `R`, optionally limited to one space.
///
/// A failing rule is logged and recorded; the remaining rules still run.
/// `cancel` is checked before each rule.
pub fn process_due<R: RuleKind>(
    conn: &mut Connection,
    space_id: Option<&str>,
    now: NaiveDateTime,
    limit: usize,
    cancel: Option<&CancellationToken>,
) -> EngineResult<TickReport> {
    let ids = due_ids(conn, R::TABLE, space_id, now)?;
    let mut report = TickReport::default();
    for id in ids {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            info!(kind = R::KIND, "processing cancelled before all due rules ran");
            report.cancelled = true;
            break;
        }
        match process_rule::<R>(conn, &id, now, limit) {
            Ok(r) => report.processed.push(r),
            Err(err) => {
                error!(kind = R::KIND, rule_id = %id, error = %err, "failed to process recurring rule");
                report.failures.push(RuleFailure {
                    kind: R::KIND,
                    rule_id: id,
                    error: err.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// IDs of active rules in `table` whose next occurrence is at or before `now`.
pub fn due_ids(
    conn: &Connection,
    table: &str,
    space_id: Option<&str>,
    now: NaiveDateTime,
) -> EngineResult<Vec<String>> {
    let now = fmt_ts(&now);
    let ids = match space_id {
        Some(space_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM {} WHERE is_active=1 AND space_id=?1 AND next_occurrence<=?2
                 ORDER BY next_occurrence, id",
                table
            ))?;
            let rows = stmt.query_map(params![space_id, now], |r| r.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM {} WHERE is_active=1 AND next_occurrence<=?1
                 ORDER BY next_occurrence, id",
                table
            ))?;
            let rows = stmt.query_map(params![now], |r| r.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(ids)
}

fn save_schedule(
    conn: &Connection,
    table: &str,
    id: &str,
    schedule: &Schedule,
    now: NaiveDateTime,
) -> EngineResult<()> {
    let n = conn.execute(
        &format!(
            "UPDATE {} SET next_occurrence=?1, is_active=?2, updated_at=?3 WHERE id=?4",
            table
        ),
        params![
            fmt_ts(&schedule.next_occurrence),
            schedule.is_active,
            fmt_ts(&now),
            id
        ],
    )?;
    if n == 0 {
        return Err(EngineError::not_found("Recurring rule", id));
    }
    Ok(())
}

fn set_active(conn: &Connection, table: &str, id: &str, active: bool, now: NaiveDateTime) -> EngineResult<()> {
    let n = conn.execute(
        &format!("UPDATE {} SET is_active=?1, updated_at=?2 WHERE id=?3", table),
        params![active, fmt_ts(&now), id],
    )?;
    if n == 0 {
        return Err(EngineError::not_found("Recurring rule", id));
    }
    Ok(())
}

fn set_next_occurrence(
    conn: &Connection,
    table: &str,
    id: &str,
    next: NaiveDateTime,
    now: NaiveDateTime,
) -> EngineResult<()> {
    let n = conn.execute(
        &format!("UPDATE {} SET next_occurrence=?1, updated_at=?2 WHERE id=?3", table),
        params![fmt_ts(&next), fmt_ts(&now), id],
    )?;
    if n == 0 {
        return Err(EngineError::not_found("Recurring rule", id));
    }
    Ok(())
}

fn delete(conn: &Connection, table: &str, entity: &'static str, id: &str) -> EngineResult<()> {
    let n = conn.execute(&format!("DELETE FROM {} WHERE id=?1", table), params![id])?;
    if n == 0 {
        return Err(EngineError::not_found(entity, id));
    }
    Ok(())
}

fn validate_window(start: NaiveDateTime, end: Option<NaiveDateTime>) -> EngineResult<()> {
    if end.is_some_and(|end| end < start) {
        return Err(EngineError::validation("end date cannot be before start date"));
    }
    Ok(())
}
