// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use budgit::db;
use budgit::error::EngineError;
use budgit::ledger::{self, NewExpense};
use budgit::models::{ExpenseType, Frequency, RecurringDeposit, TransferDirection};
use budgit::recurring::deposits::{self, NewRecurringDeposit, RecurringDepositUpdate};
use budgit::recurring::{process_due, process_rule};
use budgit::spaces;
use budgit::utils::parse_datetime;
use chrono::NaiveDateTime;
use rusqlite::Connection;

fn ts(s: &str) -> NaiveDateTime {
    parse_datetime(s).unwrap()
}

struct Fixture {
    conn: Connection,
    space_id: String,
    account_id: String,
}

fn setup(funded_cents: i64) -> Fixture {
    let conn = db::open_in_memory().unwrap();
    let now = ts("2024-01-01 00:00:00");
    let space = spaces::create_space(&conn, "Home", now).unwrap();
    let account = spaces::create_account(&conn, &space.id, "Savings", now).unwrap();
    if funded_cents > 0 {
        ledger::create_expense(
            &conn,
            NewExpense {
                space_id: space.id.clone(),
                description: "Salary".into(),
                amount_cents: funded_cents,
                r#type: ExpenseType::Topup,
                date: now,
                payment_method_id: None,
                tag_ids: vec![],
            },
            now,
        )
        .unwrap();
    }
    Fixture {
        conn,
        space_id: space.id,
        account_id: account.id,
    }
}

fn create(f: &Fixture, amount_cents: i64, frequency: Frequency, start: &str, end: Option<&str>) -> RecurringDeposit {
    deposits::create(
        &f.conn,
        NewRecurringDeposit {
            space_id: f.space_id.clone(),
            account_id: f.account_id.clone(),
            amount_cents,
            frequency,
            start_date: ts(start),
            end_date: end.map(ts),
            title: "  Rainy day  ".into(),
        },
        ts("2024-01-01 00:00:00"),
    )
    .unwrap()
}

#[test]
fn deposits_stop_when_available_balance_runs_out() {
    let mut f = setup(10_000);
    let rule = create(&f, 4_000, Frequency::Monthly, "2024-01-01 00:00:00", None);

    let report = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, ts("2024-04-15 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.occurrences, 4);
    assert_eq!(report.materialized, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.next_occurrence, ts("2024-05-01 00:00:00"));

    let transfers = ledger::list_transfers(&f.conn, &f.account_id).unwrap();
    assert_eq!(transfers.len(), 2);
    assert!(transfers.iter().all(|t| t.direction == TransferDirection::Deposit
        && t.note == "Rainy day"
        && t.recurring_deposit_id.as_deref() == Some(rule.id.as_str())));
    assert_eq!(ledger::account_balance(&f.conn, &f.account_id).unwrap(), 8_000);
    assert_eq!(ledger::available_balance(&f.conn, &f.space_id).unwrap(), 2_000);
}

#[test]
fn unfunded_space_skips_but_still_advances() {
    let mut f = setup(0);
    let rule = create(&f, 1_000, Frequency::Weekly, "2024-01-01 00:00:00", None);
    let report = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, ts("2024-01-15 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 0);
    assert_eq!(report.skipped, 3);
    assert!(ledger::list_transfers(&f.conn, &f.account_id).unwrap().is_empty());
    let stored = deposits::get(&f.conn, &rule.id).unwrap();
    assert_eq!(stored.schedule.next_occurrence, ts("2024-01-22 00:00:00"));
    assert!(stored.schedule.is_active);
}

#[test]
fn exact_available_balance_is_enough() {
    let mut f = setup(5_000);
    let rule = create(&f, 5_000, Frequency::Yearly, "2024-01-01 00:00:00", None);
    let report = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, ts("2024-01-01 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 1);
    assert_eq!(ledger::available_balance(&f.conn, &f.space_id).unwrap(), 0);
}

#[test]
fn end_date_deactivates_deposit_rule() {
    let mut f = setup(100_000);
    let rule = create(
        &f,
        1_000,
        Frequency::Biweekly,
        "2024-01-01 00:00:00",
        Some("2024-01-31 23:59:59"),
    );
    let report = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, ts("2024-06-01 00:00:00"), 100)
        .unwrap();
    // Jan 1, Jan 15, Jan 29
    assert_eq!(report.materialized, 3);
    assert!(report.deactivated);
    assert!(!deposits::get(&f.conn, &rule.id).unwrap().schedule.is_active);
    assert_eq!(ledger::account_balance(&f.conn, &f.account_id).unwrap(), 3_000);

    let later = ts("2025-01-01 00:00:00");
    let again = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, later, 100).unwrap();
    assert_eq!(again.occurrences, 0);
    let tick = process_due::<RecurringDeposit>(&mut f.conn, None, later, 100, None).unwrap();
    assert!(tick.processed.is_empty());
    assert_eq!(ledger::list_transfers(&f.conn, &f.account_id).unwrap().len(), 3);
    assert_eq!(ledger::account_balance(&f.conn, &f.account_id).unwrap(), 3_000);
}

#[test]
fn deposit_replay_with_same_now_is_a_no_op() {
    let mut f = setup(100_000);
    let rule = create(&f, 2_000, Frequency::Weekly, "2024-01-01 00:00:00", None);
    let now = ts("2024-01-29 00:00:00");

    let first = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, now, 100).unwrap();
    assert_eq!(first.materialized, 5);
    let second = process_rule::<RecurringDeposit>(&mut f.conn, &rule.id, now, 100).unwrap();
    assert_eq!(second.occurrences, 0);
    let tick = process_due::<RecurringDeposit>(&mut f.conn, Some(&f.space_id), now, 100, None).unwrap();
    assert!(tick.processed.is_empty());

    assert_eq!(ledger::list_transfers(&f.conn, &f.account_id).unwrap().len(), 5);
    assert_eq!(ledger::available_balance(&f.conn, &f.space_id).unwrap(), 90_000);
}

#[test]
fn create_requires_an_account_of_the_same_space() {
    let f = setup(0);
    let now = ts("2024-01-01 00:00:00");
    let other = spaces::create_space(&f.conn, "Office", now).unwrap();
    let foreign = spaces::create_account(&f.conn, &other.id, "Petty cash", now).unwrap();
    let err = deposits::create(
        &f.conn,
        NewRecurringDeposit {
            space_id: f.space_id.clone(),
            account_id: foreign.id,
            amount_cents: 1_000,
            frequency: Frequency::Monthly,
            start_date: now,
            end_date: None,
            title: String::new(),
        },
        now,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = deposits::create(
        &f.conn,
        NewRecurringDeposit {
            space_id: f.space_id.clone(),
            account_id: f.account_id.clone(),
            amount_cents: -5,
            frequency: Frequency::Monthly,
            start_date: now,
            end_date: None,
            title: String::new(),
        },
        now,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn update_and_toggle_deposit_rule() {
    let f = setup(0);
    let rule = create(&f, 1_000, Frequency::Monthly, "2024-01-01 00:00:00", None);
    assert_eq!(rule.title, "Rainy day");

    let updated = deposits::update(
        &f.conn,
        &rule.id,
        RecurringDepositUpdate {
            account_id: f.account_id.clone(),
            amount_cents: 2_500,
            frequency: Frequency::Weekly,
            start_date: ts("2024-02-01 00:00:00"),
            end_date: Some(ts("2024-12-31 23:59:59")),
            title: "Holiday".into(),
        },
        ts("2024-01-02 00:00:00"),
    )
    .unwrap();
    assert_eq!(updated.schedule.next_occurrence, ts("2024-02-01 00:00:00"));

    let stored = deposits::get(&f.conn, &rule.id).unwrap();
    assert_eq!(stored.amount_cents, 2_500);
    assert_eq!(stored.schedule.frequency, Frequency::Weekly);
    assert_eq!(stored.title, "Holiday");

    assert!(!deposits::toggle(&f.conn, &rule.id, ts("2024-01-03 00:00:00")).unwrap().schedule.is_active);
    assert!(deposits::due(&f.conn, None, ts("2024-03-01 00:00:00")).unwrap().is_empty());

    deposits::delete(&f.conn, &rule.id).unwrap();
    assert!(deposits::list_for_space(&f.conn, &f.space_id).unwrap().is_empty());
}

#[test]
fn manual_transfers_respect_both_balances() {
    let f = setup(5_000);
    let now = ts("2024-01-02 00:00:00");

    let err = ledger::create_transfer(&f.conn, &f.account_id, 6_000, TransferDirection::Deposit, "", now)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientFunds {
            needed: 6_000,
            available: 5_000
        }
    ));

    ledger::create_transfer(&f.conn, &f.account_id, 3_000, TransferDirection::Deposit, "", now).unwrap();
    let err = ledger::create_transfer(&f.conn, &f.account_id, 3_001, TransferDirection::Withdrawal, "", now)
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));

    ledger::create_transfer(&f.conn, &f.account_id, 3_000, TransferDirection::Withdrawal, "back", now)
        .unwrap();
    assert_eq!(ledger::account_balance(&f.conn, &f.account_id).unwrap(), 0);
    assert_eq!(ledger::available_balance(&f.conn, &f.space_id).unwrap(), 5_000);
}
