// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Ledger rows (expenses and account transfers) and the balance formulas
//! derived from them. Nothing here is cached; every balance is aggregated from
//! the raw rows on each call.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::{EngineError, EngineResult};
use crate::models::{AccountTransfer, AccountWithBalance, Expense, ExpenseType, TransferDirection};
use crate::spaces::{self, ensure_payment_method_in_space, ensure_tags_in_space};
use crate::utils::{fmt_ts, new_id};

/// Input for a manually entered expense or top-up.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub space_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub date: NaiveDateTime,
    pub payment_method_id: Option<String>,
    pub tag_ids: Vec<String>,
}

pub fn create_expense(conn: &Connection, new: NewExpense, now: NaiveDateTime) -> EngineResult<Expense> {
    let description = new.description.trim().to_string();
    if description.is_empty() {
        return Err(EngineError::validation("expense description cannot be empty"));
    }
    if new.amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    spaces::get_space(conn, &new.space_id)?;
    ensure_tags_in_space(conn, &new.space_id, &new.tag_ids)?;
    ensure_payment_method_in_space(conn, &new.space_id, new.payment_method_id.as_deref())?;

    let expense = Expense {
        id: new_id(),
        space_id: new.space_id,
        description,
        amount_cents: new.amount_cents,
        r#type: new.r#type,
        date: new.date,
        payment_method_id: new.payment_method_id,
        recurring_expense_id: None,
        tag_ids: new.tag_ids,
        created_at: now,
        updated_at: now,
    };
    insert_expense(conn, &expense)?;
    Ok(expense)
}

/// Writes an expense row and its tag links without further checks.
pub fn insert_expense(conn: &Connection, expense: &Expense) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO expenses(id, space_id, description, amount_cents, type, date,
                              payment_method_id, recurring_expense_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            expense.id,
            expense.space_id,
            expense.description,
            expense.amount_cents,
            expense.r#type,
            fmt_ts(&expense.date),
            expense.payment_method_id,
            expense.recurring_expense_id,
            fmt_ts(&expense.created_at),
            fmt_ts(&expense.updated_at),
        ],
    )?;
    let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO expense_tags(expense_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in &expense.tag_ids {
        stmt.execute(params![expense.id, tag_id])?;
    }
    Ok(())
}

pub fn get_expense(conn: &Connection, id: &str) -> EngineResult<Expense> {
    let mut expense = conn
        .query_row(
            &format!("{} WHERE id=?1", EXPENSE_SELECT),
            params![id],
            expense_from_row,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found("Expense", id))?;
    expense.tag_ids = expense_tag_ids(conn, &expense.id)?;
    Ok(expense)
}

/// Expenses of a space, newest first.
pub fn list_expenses(conn: &Connection, space_id: &str, limit: Option<usize>) -> EngineResult<Vec<Expense>> {
    let mut sql = format!(
        "{} WHERE space_id=?1 ORDER BY date DESC, created_at DESC, id",
        EXPENSE_SELECT
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![space_id], expense_from_row)?;
    let mut data = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for expense in &mut data {
        expense.tag_ids = expense_tag_ids(conn, &expense.id)?;
    }
    Ok(data)
}

/// Expenses generated by one recurring rule, oldest first.
pub fn expenses_for_rule(conn: &Connection, recurring_expense_id: &str) -> EngineResult<Vec<Expense>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE recurring_expense_id=?1 ORDER BY date, id",
        EXPENSE_SELECT
    ))?;
    let rows = stmt.query_map(params![recurring_expense_id], expense_from_row)?;
    let mut data = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for expense in &mut data {
        expense.tag_ids = expense_tag_ids(conn, &expense.id)?;
    }
    Ok(data)
}

/// Editable fields of an existing expense.
#[derive(Debug, Clone)]
pub struct ExpenseUpdate {
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub date: NaiveDateTime,
    pub payment_method_id: Option<String>,
    pub tag_ids: Vec<String>,
}

/// Rewrites an expense in place. The recurring back-reference is kept.
pub fn update_expense(conn: &Connection, id: &str, upd: ExpenseUpdate, now: NaiveDateTime) -> EngineResult<Expense> {
    let mut expense = get_expense(conn, id)?;
    let description = upd.description.trim().to_string();
    if description.is_empty() {
        return Err(EngineError::validation("expense description cannot be empty"));
    }
    if upd.amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    ensure_tags_in_space(conn, &expense.space_id, &upd.tag_ids)?;
    ensure_payment_method_in_space(conn, &expense.space_id, upd.payment_method_id.as_deref())?;

    expense.description = description;
    expense.amount_cents = upd.amount_cents;
    expense.r#type = upd.r#type;
    expense.date = upd.date;
    expense.payment_method_id = upd.payment_method_id;
    expense.tag_ids = upd.tag_ids;
    expense.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE expenses SET description=?1, amount_cents=?2, type=?3, date=?4,
                payment_method_id=?5, updated_at=?6 WHERE id=?7",
        params![
            expense.description,
            expense.amount_cents,
            expense.r#type,
            fmt_ts(&expense.date),
            expense.payment_method_id,
            fmt_ts(&now),
            id
        ],
    )?;
    tx.execute("DELETE FROM expense_tags WHERE expense_id=?1", params![id])?;
    {
        let mut stmt =
            tx.prepare_cached("INSERT OR IGNORE INTO expense_tags(expense_id, tag_id) VALUES (?1, ?2)")?;
        for tag_id in &expense.tag_ids {
            stmt.execute(params![id, tag_id])?;
        }
    }
    tx.commit()?;
    Ok(expense)
}

/// Deleting a generated expense leaves its rule's schedule untouched.
pub fn delete_expense(conn: &Connection, id: &str) -> EngineResult<()> {
    let n = conn.execute("DELETE FROM expenses WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(EngineError::not_found("Expense", id));
    }
    Ok(())
}

const EXPENSE_SELECT: &str = "SELECT id, space_id, description, amount_cents, type, date, payment_method_id,
        recurring_expense_id, created_at, updated_at FROM expenses";

fn expense_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: r.get(0)?,
        space_id: r.get(1)?,
        description: r.get(2)?,
        amount_cents: r.get(3)?,
        r#type: r.get(4)?,
        date: r.get(5)?,
        payment_method_id: r.get(6)?,
        recurring_expense_id: r.get(7)?,
        tag_ids: Vec::new(),
        created_at: r.get(8)?,
        updated_at: r.get(9)?,
    })
}

fn expense_tag_ids(conn: &Connection, expense_id: &str) -> EngineResult<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT tag_id FROM expense_tags WHERE expense_id=?1 ORDER BY tag_id")?;
    let rows = stmt.query_map(params![expense_id], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Writes a transfer row without balance checks.
pub fn insert_transfer(conn: &Connection, transfer: &AccountTransfer) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO account_transfers(id, account_id, amount_cents, direction, note,
                                       recurring_deposit_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            transfer.id,
            transfer.account_id,
            transfer.amount_cents,
            transfer.direction,
            transfer.note,
            transfer.recurring_deposit_id,
            fmt_ts(&transfer.created_at),
        ],
    )?;
    Ok(())
}

/// Moves money between the space's unallocated balance and one of its
/// accounts. Deposits are limited by the available balance, withdrawals by
/// the account balance.
pub fn create_transfer(
    conn: &Connection,
    account_id: &str,
    amount_cents: i64,
    direction: TransferDirection,
    note: &str,
    now: NaiveDateTime,
) -> EngineResult<AccountTransfer> {
    if amount_cents <= 0 {
        return Err(EngineError::validation("amount must be positive"));
    }
    let account = spaces::get_account(conn, account_id)?;
    let limit = match direction {
        TransferDirection::Deposit => available_balance(conn, &account.space_id)?,
        TransferDirection::Withdrawal => account_balance(conn, &account.id)?,
    };
    if amount_cents > limit {
        return Err(EngineError::InsufficientFunds {
            needed: amount_cents,
            available: limit,
        });
    }
    let transfer = AccountTransfer {
        id: new_id(),
        account_id: account.id,
        amount_cents,
        direction,
        note: note.trim().to_string(),
        recurring_deposit_id: None,
        created_at: now,
    };
    insert_transfer(conn, &transfer)?;
    Ok(transfer)
}

pub fn list_transfers(conn: &Connection, account_id: &str) -> EngineResult<Vec<AccountTransfer>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, amount_cents, direction, note, recurring_deposit_id, created_at
         FROM account_transfers WHERE account_id=?1 ORDER BY created_at DESC, id",
    )?;
    let rows = stmt.query_map(params![account_id], |r| {
        Ok(AccountTransfer {
            id: r.get(0)?,
            account_id: r.get(1)?,
            amount_cents: r.get(2)?,
            direction: r.get(3)?,
            note: r.get(4)?,
            recurring_deposit_id: r.get(5)?,
            created_at: r.get(6)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_transfer(conn: &Connection, id: &str) -> EngineResult<()> {
    let n = conn.execute("DELETE FROM account_transfers WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(EngineError::not_found("Transfer", id));
    }
    Ok(())
}

/// Sum of expense amounts of one type in a space, over all dates.
pub fn sum_expenses_by_type(conn: &Connection, space_id: &str, kind: ExpenseType) -> EngineResult<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE space_id=?1 AND type=?2",
        params![space_id, kind],
        |r| r.get(0),
    )?;
    Ok(total)
}

/// Σ top-ups − Σ expenses.
pub fn space_balance(conn: &Connection, space_id: &str) -> EngineResult<i64> {
    let topups = sum_expenses_by_type(conn, space_id, ExpenseType::Topup)?;
    let expenses = sum_expenses_by_type(conn, space_id, ExpenseType::Expense)?;
    Ok(topups - expenses)
}

/// Σ deposits − Σ withdrawals for one account.
pub fn account_balance(conn: &Connection, account_id: &str) -> EngineResult<i64> {
    let balance: i64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN direction='deposit' THEN amount_cents ELSE -amount_cents END), 0)
         FROM account_transfers WHERE account_id=?1",
        params![account_id],
        |r| r.get(0),
    )?;
    Ok(balance)
}

/// Sum of every account balance in the space.
pub fn total_allocated(conn: &Connection, space_id: &str) -> EngineResult<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN t.direction='deposit' THEN t.amount_cents ELSE -t.amount_cents END), 0)
         FROM account_transfers t
         JOIN money_accounts a ON t.account_id=a.id
         WHERE a.space_id=?1",
        params![space_id],
        |r| r.get(0),
    )?;
    Ok(total)
}

/// Money in the space not yet allocated to any account.
pub fn available_balance(conn: &Connection, space_id: &str) -> EngineResult<i64> {
    Ok(space_balance(conn, space_id)? - total_allocated(conn, space_id)?)
}

pub fn account_balances(conn: &Connection, space_id: &str) -> EngineResult<Vec<AccountWithBalance>> {
    let accounts = spaces::list_accounts(conn, space_id)?;
    let mut data = Vec::with_capacity(accounts.len());
    for account in accounts {
        let balance_cents = account_balance(conn, &account.id)?;
        data.push(AccountWithBalance {
            account,
            balance_cents,
        });
    }
    Ok(data)
}

/// Amount spent (expense-type rows only) in `[start, end]` on expenses that
/// carry at least one of `tag_ids`. An expense matching several tags counts once.
pub fn spent_for_tags(
    conn: &Connection,
    space_id: &str,
    tag_ids: &[String],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> EngineResult<i64> {
    if tag_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; tag_ids.len()].join(",");
    let sql = format!(
        "SELECT COALESCE(SUM(e.amount_cents), 0)
         FROM expenses e
         WHERE e.space_id=? AND e.type='expense' AND e.date >= ? AND e.date <= ?
           AND EXISTS (SELECT 1 FROM expense_tags et
                       WHERE et.expense_id=e.id AND et.tag_id IN ({}))",
        placeholders
    );
    let mut values: Vec<String> = vec![space_id.to_string(), fmt_ts(&start), fmt_ts(&end)];
    values.extend(tag_ids.iter().cloned());
    let spent: i64 = conn.query_row(&sql, params_from_iter(values), |r| r.get(0))?;
    Ok(spent)
}
