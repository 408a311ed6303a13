// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Drives the recurrence engine: a periodic tick over every space, and an
//! on-demand run for a single space.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::EngineResult;
use crate::models::{RecurringDeposit, RecurringExpense};
use crate::recurring::{self, RuleKind, TickReport};
use crate::spaces;

/// The store connection plus the limits every run uses. Ticks and on-demand
/// runs serialise on the connection.
pub struct Engine {
    conn: Mutex<Connection>,
    max_catch_up: usize,
}

impl Engine {
    pub fn new(conn: Connection, max_catch_up: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            max_catch_up,
        }
    }

    pub fn max_catch_up(&self) -> usize {
        self.max_catch_up
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-run leaves nothing half-written: the rule's transaction rolled back.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
        let mut conn = self.lock();
        f(&mut conn)
    }

    /// Processes every due rule of every space: expense rules first, then
    /// deposit rules. Failures are logged and reported, never propagated.
    pub fn tick(&self, now: NaiveDateTime, cancel: Option<&CancellationToken>) -> TickReport {
        let mut conn = self.lock();
        let mut report = TickReport::default();
        report.merge(self.run_kind::<RecurringExpense>(&mut conn, None, now, cancel));
        if report.cancelled {
            return report;
        }
        report.merge(self.run_kind::<RecurringDeposit>(&mut conn, None, now, cancel));
        report
    }

    fn run_kind<R: RuleKind>(
        &self,
        conn: &mut Connection,
        space_id: Option<&str>,
        now: NaiveDateTime,
        cancel: Option<&CancellationToken>,
    ) -> TickReport {
        match recurring::process_due::<R>(conn, space_id, now, self.max_catch_up, cancel) {
            Ok(report) => report,
            Err(err) => {
                error!(kind = R::KIND, error = %err, "failed to list due recurring rules");
                TickReport::default()
            }
        }
    }

    /// Brings one space's rules up to date with `now`, synchronously.
    pub fn process_space_now(&self, space_id: &str, now: NaiveDateTime) -> EngineResult<TickReport> {
        let mut conn = self.lock();
        spaces::get_space(&conn, space_id)?;
        let mut report =
            recurring::process_due::<RecurringExpense>(&mut conn, Some(space_id), now, self.max_catch_up, None)?;
        report.merge(recurring::process_due::<RecurringDeposit>(
            &mut conn,
            Some(space_id),
            now,
            self.max_catch_up,
            None,
        )?);
        info!(
            space_id,
            processed = report.processed.len(),
            materialized = report.materialized(),
            skipped = report.skipped(),
            failures = report.failures.len(),
            "space processed on demand"
        );
        Ok(report)
    }
}

/// Periodic driver. Ticks once on start, then every `interval`; ticks never
/// overlap.
pub struct Scheduler {
    engine: Arc<Engine>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            engine,
            clock,
            interval,
        }
    }

    /// Spawns the loop on the current tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await });
        SchedulerHandle { cancel, join }
    }

    /// Ticks until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_catch_up = self.engine.max_catch_up(),
            "scheduler started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick(&cancel).await;
        }
        info!("scheduler stopped");
    }

    /// Runs a single tick on the blocking pool.
    pub async fn tick(&self, cancel: &CancellationToken) -> Option<TickReport> {
        let engine = self.engine.clone();
        let now = self.clock.now();
        let token = cancel.clone();
        match tokio::task::spawn_blocking(move || engine.tick(now, Some(&token))).await {
            Ok(report) => {
                info!(
                    now = %now,
                    processed = report.processed.len(),
                    materialized = report.materialized(),
                    skipped = report.skipped(),
                    failures = report.failures.len(),
                    cancelled = report.cancelled,
                    "scheduler tick finished"
                );
                Some(report)
            }
            Err(err) => {
                error!(error = %err, "scheduler tick aborted");
                None
            }
        }
    }
}

pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancels the loop and waits for any in-flight tick to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            warn!(error = %err, "scheduler task did not shut down cleanly");
        }
    }
}
