// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use budgit::db;
use budgit::error::EngineError;
use budgit::ledger;
use budgit::models::{ExpenseType, Frequency, RecurringExpense};
use budgit::recurring::expenses::{self, NewRecurringExpense, RecurringExpenseUpdate};
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
    tag_id: String,
}

fn setup() -> Fixture {
    let conn = db::open_in_memory().unwrap();
    let now = ts("2024-01-01 00:00:00");
    let space = spaces::create_space(&conn, "Home", now).unwrap();
    let tag = spaces::create_tag(&conn, &space.id, "Rent", None).unwrap();
    Fixture {
        conn,
        space_id: space.id,
        tag_id: tag.id,
    }
}

fn new_rule(f: &Fixture, frequency: Frequency, start: &str, end: Option<&str>) -> NewRecurringExpense {
    NewRecurringExpense {
        space_id: f.space_id.clone(),
        description: "Rent".into(),
        amount_cents: 120_000,
        r#type: ExpenseType::Expense,
        payment_method_id: None,
        frequency,
        start_date: ts(start),
        end_date: end.map(ts),
        tag_ids: vec![f.tag_id.clone()],
    }
}

fn create(f: &Fixture, frequency: Frequency, start: &str, end: Option<&str>) -> RecurringExpense {
    expenses::create(&f.conn, new_rule(f, frequency, start, end), ts("2024-01-01 00:00:00")).unwrap()
}

#[test]
fn catch_up_writes_every_missed_occurrence() {
    let mut f = setup();
    let rule = create(&f, Frequency::Daily, "2024-01-01 09:00:00", None);

    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-01-10 12:00:00"), 100)
        .unwrap();
    assert_eq!(report.occurrences, 10);
    assert_eq!(report.materialized, 10);
    assert_eq!(report.next_occurrence, ts("2024-01-11 09:00:00"));
    assert!(report.is_active);

    let written = ledger::expenses_for_rule(&f.conn, &rule.id).unwrap();
    assert_eq!(written.len(), 10);
    for (i, e) in written.iter().enumerate() {
        assert_eq!(e.date, ts(&format!("2024-01-{:02} 09:00:00", i + 1)));
        assert_eq!(e.amount_cents, 120_000);
        assert_eq!(e.description, "Rent");
        assert_eq!(e.r#type, ExpenseType::Expense);
        assert_eq!(e.tag_ids, vec![f.tag_id.clone()]);
        assert_eq!(e.recurring_expense_id.as_deref(), Some(rule.id.as_str()));
    }

    let stored = expenses::get(&f.conn, &rule.id).unwrap();
    assert_eq!(stored.schedule.next_occurrence, ts("2024-01-11 09:00:00"));
}

#[test]
fn replay_with_same_now_is_a_no_op() {
    let mut f = setup();
    let rule = create(&f, Frequency::Weekly, "2024-01-01 00:00:00", None);
    let now = ts("2024-02-01 00:00:00");

    let first = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, now, 100).unwrap();
    assert_eq!(first.materialized, 5);
    let second = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, now, 100).unwrap();
    assert_eq!(second.occurrences, 0);
    assert_eq!(ledger::expenses_for_rule(&f.conn, &rule.id).unwrap().len(), 5);
}

#[test]
fn end_date_stops_and_deactivates_the_rule() {
    let mut f = setup();
    let rule = create(
        &f,
        Frequency::Weekly,
        "2024-01-01 00:00:00",
        Some("2024-01-20 23:59:59"),
    );

    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-03-01 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 3);
    assert!(report.deactivated);

    let stored = expenses::get(&f.conn, &rule.id).unwrap();
    assert!(!stored.schedule.is_active);
    assert_eq!(stored.schedule.next_occurrence, ts("2024-01-22 00:00:00"));

    let dates: Vec<_> = ledger::expenses_for_rule(&f.conn, &rule.id)
        .unwrap()
        .into_iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(
        dates,
        vec![
            ts("2024-01-01 00:00:00"),
            ts("2024-01-08 00:00:00"),
            ts("2024-01-15 00:00:00")
        ]
    );

    let later = ts("2024-12-01 00:00:00");
    let again = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, later, 100).unwrap();
    assert_eq!(again.occurrences, 0);
    assert!(!again.is_active);
    let tick = process_due::<RecurringExpense>(&mut f.conn, None, later, 100, None).unwrap();
    assert!(tick.processed.is_empty());
    assert!(tick.failures.is_empty());
    assert_eq!(ledger::expenses_for_rule(&f.conn, &rule.id).unwrap().len(), 3);
    assert_eq!(
        expenses::get(&f.conn, &rule.id).unwrap().schedule.next_occurrence,
        ts("2024-01-22 00:00:00")
    );
}

#[test]
fn occurrence_on_the_end_date_is_included() {
    let mut f = setup();
    let rule = create(
        &f,
        Frequency::Daily,
        "2024-01-01 00:00:00",
        Some("2024-01-03 00:00:00"),
    );
    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-01-03 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 3);
    assert!(report.deactivated);
    assert!(!expenses::get(&f.conn, &rule.id).unwrap().schedule.is_active);
}

#[test]
fn rule_not_yet_due_writes_nothing() {
    let mut f = setup();
    let rule = create(&f, Frequency::Monthly, "2024-06-01 00:00:00", None);
    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-05-31 23:59:59"), 100)
        .unwrap();
    assert_eq!(report.occurrences, 0);
    assert!(ledger::expenses_for_rule(&f.conn, &rule.id).unwrap().is_empty());
    assert_eq!(
        expenses::get(&f.conn, &rule.id).unwrap().schedule.next_occurrence,
        ts("2024-06-01 00:00:00")
    );
}

#[test]
fn paused_rule_is_not_due() {
    let mut f = setup();
    let rule = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    let paused = expenses::toggle(&f.conn, &rule.id, ts("2024-01-01 00:00:00")).unwrap();
    assert!(!paused.schedule.is_active);

    let report = process_due::<RecurringExpense>(&mut f.conn, None, ts("2024-01-05 00:00:00"), 100, None)
        .unwrap();
    assert!(report.processed.is_empty());
    assert!(ledger::expenses_for_rule(&f.conn, &rule.id).unwrap().is_empty());

    let resumed = expenses::toggle(&f.conn, &rule.id, ts("2024-01-05 00:00:00")).unwrap();
    assert!(resumed.schedule.is_active);
}

#[test]
fn exceeding_the_catch_up_limit_rolls_back() {
    let mut f = setup();
    let rule = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    let now = ts("2024-01-31 00:00:00");

    let err = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, now, 5).unwrap_err();
    assert!(matches!(err, EngineError::CatchUpLimit { limit: 5, .. }));
    assert!(ledger::expenses_for_rule(&f.conn, &rule.id).unwrap().is_empty());
    let stored = expenses::get(&f.conn, &rule.id).unwrap();
    assert_eq!(stored.schedule.next_occurrence, ts("2024-01-01 00:00:00"));
    assert!(stored.schedule.is_active);

    let report = process_due::<RecurringExpense>(&mut f.conn, None, now, 5, None).unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].rule_id, rule.id);
}

#[test]
fn topup_rule_raises_the_space_balance() {
    let mut f = setup();
    let mut new = new_rule(&f, Frequency::Monthly, "2024-01-15 00:00:00", None);
    new.r#type = ExpenseType::Topup;
    new.amount_cents = 300_000;
    let rule = expenses::create(&f.conn, new, ts("2024-01-01 00:00:00")).unwrap();

    process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-03-20 00:00:00"), 100).unwrap();
    assert_eq!(ledger::space_balance(&f.conn, &f.space_id).unwrap(), 900_000);
}

#[test]
fn monthly_rule_keeps_its_day_of_month() {
    let mut f = setup();
    let rule = create(&f, Frequency::Monthly, "2024-01-31 08:00:00", None);
    process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-04-30 12:00:00"), 100).unwrap();
    let dates: Vec<_> = ledger::expenses_for_rule(&f.conn, &rule.id)
        .unwrap()
        .into_iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(
        dates,
        vec![
            ts("2024-01-31 08:00:00"),
            ts("2024-02-29 08:00:00"),
            ts("2024-03-31 08:00:00"),
            ts("2024-04-30 08:00:00"),
        ]
    );
    assert_eq!(
        expenses::get(&f.conn, &rule.id).unwrap().schedule.next_occurrence,
        ts("2024-05-31 08:00:00")
    );
}

#[test]
fn create_rejects_invalid_input() {
    let f = setup();
    let now = ts("2024-01-01 00:00:00");

    let mut blank = new_rule(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    blank.description = "   ".into();
    assert!(matches!(
        expenses::create(&f.conn, blank, now),
        Err(EngineError::Validation(_))
    ));

    let mut zero = new_rule(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    zero.amount_cents = 0;
    assert!(matches!(
        expenses::create(&f.conn, zero, now),
        Err(EngineError::Validation(_))
    ));

    let backwards = new_rule(
        &f,
        Frequency::Daily,
        "2024-02-01 00:00:00",
        Some("2024-01-01 00:00:00"),
    );
    assert!(matches!(
        expenses::create(&f.conn, backwards, now),
        Err(EngineError::Validation(_))
    ));

    let other = spaces::create_space(&f.conn, "Office", now).unwrap();
    let foreign = spaces::create_tag(&f.conn, &other.id, "Supplies", None).unwrap();
    let mut cross = new_rule(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    cross.tag_ids = vec![foreign.id];
    assert!(matches!(
        expenses::create(&f.conn, cross, now),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn update_pulls_next_occurrence_forward_to_the_new_start() {
    let f = setup();
    let rule = create(&f, Frequency::Monthly, "2024-01-01 00:00:00", None);
    let upd = RecurringExpenseUpdate {
        description: "Rent (new flat)".into(),
        amount_cents: 130_000,
        r#type: ExpenseType::Expense,
        payment_method_id: None,
        frequency: Frequency::Monthly,
        start_date: ts("2024-03-05 00:00:00"),
        end_date: None,
        tag_ids: vec![],
    };
    let updated = expenses::update(&f.conn, &rule.id, upd, ts("2024-01-02 00:00:00")).unwrap();
    assert_eq!(updated.schedule.next_occurrence, ts("2024-03-05 00:00:00"));

    let stored = expenses::get(&f.conn, &rule.id).unwrap();
    assert_eq!(stored.description, "Rent (new flat)");
    assert_eq!(stored.amount_cents, 130_000);
    assert!(stored.tag_ids.is_empty());
    assert_eq!(stored.schedule.next_occurrence, ts("2024-03-05 00:00:00"));
}

#[test]
fn deleting_a_rule_keeps_generated_expenses() {
    let mut f = setup();
    let rule = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-01-02 00:00:00"), 100).unwrap();

    expenses::delete(&f.conn, &rule.id).unwrap();
    assert!(matches!(
        expenses::get(&f.conn, &rule.id),
        Err(EngineError::NotFound { .. })
    ));
    let remaining = ledger::list_expenses(&f.conn, &f.space_id, None).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|e| e.recurring_expense_id.is_none()));
}

#[test]
fn due_filters_by_space() {
    let f = setup();
    let now = ts("2024-01-01 00:00:00");
    let mine = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    let other = spaces::create_space(&f.conn, "Office", now).unwrap();
    let mut theirs = new_rule(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    theirs.space_id = other.id.clone();
    theirs.tag_ids = vec![];
    expenses::create(&f.conn, theirs, now).unwrap();

    assert_eq!(expenses::due(&f.conn, None, now).unwrap().len(), 2);
    let scoped = expenses::due(&f.conn, Some(&f.space_id), now).unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, mine.id);
}

#[test]
fn list_puts_active_rules_first() {
    let f = setup();
    let now = ts("2024-01-01 00:00:00");
    let a = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    let b = create(&f, Frequency::Daily, "2024-02-01 00:00:00", None);
    expenses::set_active(&f.conn, &a.id, false, now).unwrap();

    let ids: Vec<_> = expenses::list_for_space(&f.conn, &f.space_id)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[test]
fn set_next_occurrence_moves_the_schedule() {
    let f = setup();
    let rule = create(&f, Frequency::Daily, "2024-01-01 00:00:00", None);
    expenses::set_next_occurrence(
        &f.conn,
        &rule.id,
        ts("2024-01-10 00:00:00"),
        ts("2024-01-01 00:00:00"),
    )
    .unwrap();
    assert!(expenses::due(&f.conn, None, ts("2024-01-09 23:59:59")).unwrap().is_empty());
    assert_eq!(expenses::due(&f.conn, None, ts("2024-01-10 00:00:00")).unwrap().len(), 1);
}

#[test]
fn moved_next_occurrence_keeps_its_own_day() {
    let mut f = setup();
    let rule = create(&f, Frequency::Monthly, "2024-01-31 00:00:00", None);
    expenses::set_next_occurrence(
        &f.conn,
        &rule.id,
        ts("2024-03-10 00:00:00"),
        ts("2024-01-01 00:00:00"),
    )
    .unwrap();

    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-04-20 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 2);
    assert_eq!(report.next_occurrence, ts("2024-05-10 00:00:00"));
    let dates: Vec<_> = ledger::expenses_for_rule(&f.conn, &rule.id)
        .unwrap()
        .into_iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(dates, vec![ts("2024-03-10 00:00:00"), ts("2024-04-10 00:00:00")]);
}

#[test]
fn editing_start_to_a_later_day_does_not_skip_a_month() {
    let mut f = setup();
    let rule = create(&f, Frequency::Monthly, "2024-01-15 00:00:00", None);
    process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-02-20 00:00:00"), 100).unwrap();

    expenses::update(
        &f.conn,
        &rule.id,
        RecurringExpenseUpdate {
            description: "Rent".into(),
            amount_cents: 120_000,
            r#type: ExpenseType::Expense,
            payment_method_id: None,
            frequency: Frequency::Monthly,
            start_date: ts("2024-01-31 00:00:00"),
            end_date: None,
            tag_ids: vec![],
        },
        ts("2024-02-21 00:00:00"),
    )
    .unwrap();

    let report = process_rule::<RecurringExpense>(&mut f.conn, &rule.id, ts("2024-03-20 00:00:00"), 100)
        .unwrap();
    assert_eq!(report.materialized, 1);
    assert_eq!(report.next_occurrence, ts("2024-04-15 00:00:00"));
    let dates: Vec<_> = ledger::expenses_for_rule(&f.conn, &rule.id)
        .unwrap()
        .into_iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(
        dates,
        vec![
            ts("2024-01-15 00:00:00"),
            ts("2024-02-15 00:00:00"),
            ts("2024-03-15 00:00:00")
        ]
    );
}
