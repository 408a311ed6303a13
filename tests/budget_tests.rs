// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use budgit::budget::{self, BudgetUpdate, NewBudget};
use budgit::db;
use budgit::error::EngineError;
use budgit::ledger::{self, NewExpense};
use budgit::models::{BudgetPeriod, BudgetStatus, ExpenseType};
use budgit::spaces;
use budgit::utils::parse_datetime;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn ts(s: &str) -> NaiveDateTime {
    parse_datetime(s).unwrap()
}

struct Fixture {
    conn: Connection,
    space_id: String,
    food: String,
    dining: String,
    travel: String,
}

fn setup() -> Fixture {
    let conn = db::open_in_memory().unwrap();
    let now = ts("2024-01-01 00:00:00");
    let space = spaces::create_space(&conn, "Home", now).unwrap();
    let food = spaces::create_tag(&conn, &space.id, "food", None).unwrap();
    let dining = spaces::create_tag(&conn, &space.id, "dining", None).unwrap();
    let travel = spaces::create_tag(&conn, &space.id, "travel", None).unwrap();
    Fixture {
        conn,
        space_id: space.id,
        food: food.id,
        dining: dining.id,
        travel: travel.id,
    }
}

fn spend(f: &Fixture, amount_cents: i64, kind: ExpenseType, date: &str, tags: &[&String]) {
    ledger::create_expense(
        &f.conn,
        NewExpense {
            space_id: f.space_id.clone(),
            description: "x".into(),
            amount_cents,
            r#type: kind,
            date: ts(date),
            payment_method_id: None,
            tag_ids: tags.iter().map(|t| (*t).clone()).collect(),
        },
        ts(date),
    )
    .unwrap();
}

fn monthly_budget(f: &Fixture, tags: Vec<String>, amount_cents: i64) -> String {
    budget::create(
        &f.conn,
        NewBudget {
            space_id: f.space_id.clone(),
            tag_ids: tags,
            amount_cents,
            period: BudgetPeriod::Monthly,
            start_date: ts("2024-01-01 00:00:00"),
            end_date: None,
        },
        ts("2024-01-01 00:00:00"),
    )
    .unwrap()
    .id
}

#[test]
fn classification_boundaries() {
    let d = |s: &str| Decimal::from_str(s).unwrap();
    assert_eq!(BudgetStatus::classify(d("0")), BudgetStatus::OnTrack);
    assert_eq!(BudgetStatus::classify(d("74.99")), BudgetStatus::OnTrack);
    assert_eq!(BudgetStatus::classify(d("75")), BudgetStatus::Warning);
    assert_eq!(BudgetStatus::classify(d("100")), BudgetStatus::Warning);
    assert_eq!(BudgetStatus::classify(d("100.01")), BudgetStatus::Over);
}

#[test]
fn expense_with_several_budget_tags_counts_once() {
    let f = setup();
    monthly_budget(&f, vec![f.food.clone(), f.dining.clone()], 10_000);
    spend(&f, 3_000, ExpenseType::Expense, "2024-03-10 12:00:00", &[&f.food, &f.dining]);
    spend(&f, 1_000, ExpenseType::Expense, "2024-03-11 12:00:00", &[&f.dining]);
    spend(&f, 9_000, ExpenseType::Expense, "2024-03-11 12:00:00", &[&f.travel]);

    let out = budget::budgets_with_spent(&f.conn, &f.space_id, ts("2024-03-15 00:00:00")).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].spent_cents, 4_000);
    assert_eq!(out[0].percentage, Decimal::from(40));
    assert_eq!(out[0].status, BudgetStatus::OnTrack);
}

#[test]
fn only_expenses_inside_the_current_period_count() {
    let f = setup();
    monthly_budget(&f, vec![f.food.clone()], 10_000);
    spend(&f, 1_000, ExpenseType::Expense, "2024-02-29 23:59:59", &[&f.food]);
    spend(&f, 2_000, ExpenseType::Expense, "2024-03-01 00:00:00", &[&f.food]);
    spend(&f, 3_000, ExpenseType::Expense, "2024-03-31 23:59:59", &[&f.food]);
    spend(&f, 4_000, ExpenseType::Expense, "2024-04-01 00:00:00", &[&f.food]);
    spend(&f, 5_000, ExpenseType::Topup, "2024-03-05 00:00:00", &[&f.food]);

    let out = budget::budgets_with_spent(&f.conn, &f.space_id, ts("2024-03-20 00:00:00")).unwrap();
    assert_eq!(out[0].period_start, ts("2024-03-01 00:00:00"));
    assert_eq!(out[0].period_end, ts("2024-03-31 23:59:59"));
    assert_eq!(out[0].spent_cents, 5_000);
    assert_eq!(out[0].status, BudgetStatus::OnTrack);
}

#[test]
fn status_moves_to_warning_and_over() {
    let f = setup();
    monthly_budget(&f, vec![f.food.clone()], 10_000);
    spend(&f, 7_500, ExpenseType::Expense, "2024-03-02 00:00:00", &[&f.food]);
    let now = ts("2024-03-20 00:00:00");
    let out = budget::budgets_with_spent(&f.conn, &f.space_id, now).unwrap();
    assert_eq!(out[0].status, BudgetStatus::Warning);

    spend(&f, 2_501, ExpenseType::Expense, "2024-03-03 00:00:00", &[&f.food]);
    let out = budget::budgets_with_spent(&f.conn, &f.space_id, now).unwrap();
    assert_eq!(out[0].status, BudgetStatus::Over);
    assert_eq!(out[0].percentage, Decimal::from_str("100.01").unwrap());
}

#[test]
fn inactive_or_out_of_window_budgets_are_skipped() {
    let f = setup();
    let paused = monthly_budget(&f, vec![f.food.clone()], 10_000);
    budget::set_active(&f.conn, &paused, false, ts("2024-01-02 00:00:00")).unwrap();

    budget::create(
        &f.conn,
        NewBudget {
            space_id: f.space_id.clone(),
            tag_ids: vec![f.travel.clone()],
            amount_cents: 50_000,
            period: BudgetPeriod::Yearly,
            start_date: ts("2024-01-01 00:00:00"),
            end_date: Some(ts("2024-02-29 23:59:59")),
        },
        ts("2024-01-01 00:00:00"),
    )
    .unwrap();

    assert_eq!(
        budget::budgets_with_spent(&f.conn, &f.space_id, ts("2024-02-15 00:00:00"))
            .unwrap()
            .len(),
        1
    );
    assert!(
        budget::budgets_with_spent(&f.conn, &f.space_id, ts("2024-03-01 00:00:00"))
            .unwrap()
            .is_empty()
    );
    assert_eq!(budget::list_for_space(&f.conn, &f.space_id).unwrap().len(), 2);
}

#[test]
fn weekly_budget_uses_monday_to_sunday() {
    let f = setup();
    budget::create(
        &f.conn,
        NewBudget {
            space_id: f.space_id.clone(),
            tag_ids: vec![f.food.clone()],
            amount_cents: 2_000,
            period: BudgetPeriod::Weekly,
            start_date: ts("2024-01-01 00:00:00"),
            end_date: None,
        },
        ts("2024-01-01 00:00:00"),
    )
    .unwrap();
    spend(&f, 500, ExpenseType::Expense, "2024-05-12 23:59:59", &[&f.food]);
    spend(&f, 700, ExpenseType::Expense, "2024-05-13 00:00:00", &[&f.food]);
    spend(&f, 900, ExpenseType::Expense, "2024-05-19 23:59:59", &[&f.food]);

    let out = budget::budgets_with_spent(&f.conn, &f.space_id, ts("2024-05-15 10:00:00")).unwrap();
    assert_eq!(out[0].spent_cents, 1_600);
    assert_eq!(out[0].status, BudgetStatus::Warning);
}

#[test]
fn create_and_update_validate_input() {
    let f = setup();
    let now = ts("2024-01-01 00:00:00");
    let base = NewBudget {
        space_id: f.space_id.clone(),
        tag_ids: vec![f.food.clone()],
        amount_cents: 1_000,
        period: BudgetPeriod::Monthly,
        start_date: now,
        end_date: None,
    };

    let mut no_tags = base.clone();
    no_tags.tag_ids.clear();
    assert!(matches!(budget::create(&f.conn, no_tags, now), Err(EngineError::Validation(_))));

    let mut zero = base.clone();
    zero.amount_cents = 0;
    assert!(matches!(budget::create(&f.conn, zero, now), Err(EngineError::Validation(_))));

    let other = spaces::create_space(&f.conn, "Office", now).unwrap();
    let foreign = spaces::create_tag(&f.conn, &other.id, "food", None).unwrap();
    let mut cross = base.clone();
    cross.tag_ids = vec![foreign.id];
    assert!(matches!(budget::create(&f.conn, cross, now), Err(EngineError::Validation(_))));

    let created = budget::create(&f.conn, base, now).unwrap();
    let updated = budget::update(
        &f.conn,
        &created.id,
        BudgetUpdate {
            tag_ids: vec![f.dining.clone(), f.travel.clone()],
            amount_cents: 2_000,
            period: BudgetPeriod::Yearly,
            start_date: now,
            end_date: None,
        },
        now,
    )
    .unwrap();
    assert_eq!(updated.amount_cents, 2_000);

    let stored = budget::get(&f.conn, &created.id).unwrap();
    let mut expected = vec![f.dining.clone(), f.travel.clone()];
    expected.sort();
    assert_eq!(stored.tag_ids, expected);
    assert_eq!(stored.period, BudgetPeriod::Yearly);

    budget::delete(&f.conn, &created.id).unwrap();
    assert!(matches!(budget::get(&f.conn, &created.id), Err(EngineError::NotFound { .. })));
}
