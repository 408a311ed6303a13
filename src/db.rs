// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Budgit", "budgit"));

pub fn db_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.db_path {
        return Ok(path.clone());
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("budgit.sqlite"))
}

pub fn open_or_init(config: &Config) -> Result<Connection> {
    let path = db_path(config)?;
    open_at(&path)
}

pub fn open_at(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Create directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS spaces(
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS money_accounts(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(space_id, name),
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_money_accounts_space ON money_accounts(space_id);

    CREATE TABLE IF NOT EXISTS tags(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        name TEXT NOT NULL,
        color TEXT,
        UNIQUE(space_id, name),
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS payment_methods(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        name TEXT NOT NULL,
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS recurring_expenses(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        description TEXT NOT NULL,
        amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
        type TEXT NOT NULL CHECK(type IN ('expense','topup')),
        payment_method_id TEXT,
        frequency TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT,
        next_occurrence TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE,
        FOREIGN KEY(payment_method_id) REFERENCES payment_methods(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_recurring_expenses_due
        ON recurring_expenses(is_active, next_occurrence);
    CREATE INDEX IF NOT EXISTS idx_recurring_expenses_space
        ON recurring_expenses(space_id, is_active, next_occurrence);

    CREATE TABLE IF NOT EXISTS recurring_expense_tags(
        recurring_expense_id TEXT NOT NULL,
        tag_id TEXT NOT NULL,
        PRIMARY KEY(recurring_expense_id, tag_id),
        FOREIGN KEY(recurring_expense_id) REFERENCES recurring_expenses(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS recurring_deposits(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        account_id TEXT NOT NULL,
        amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
        title TEXT NOT NULL DEFAULT '',
        frequency TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT,
        next_occurrence TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE,
        FOREIGN KEY(account_id) REFERENCES money_accounts(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_recurring_deposits_due
        ON recurring_deposits(is_active, next_occurrence);
    CREATE INDEX IF NOT EXISTS idx_recurring_deposits_space
        ON recurring_deposits(space_id, is_active, next_occurrence);

    CREATE TABLE IF NOT EXISTS expenses(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        description TEXT NOT NULL,
        amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
        type TEXT NOT NULL CHECK(type IN ('expense','topup')),
        date TEXT NOT NULL,
        payment_method_id TEXT,
        recurring_expense_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE,
        FOREIGN KEY(payment_method_id) REFERENCES payment_methods(id) ON DELETE SET NULL,
        FOREIGN KEY(recurring_expense_id) REFERENCES recurring_expenses(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_expenses_space_date ON expenses(space_id, date);
    CREATE INDEX IF NOT EXISTS idx_expenses_recurring ON expenses(recurring_expense_id);

    CREATE TABLE IF NOT EXISTS expense_tags(
        expense_id TEXT NOT NULL,
        tag_id TEXT NOT NULL,
        PRIMARY KEY(expense_id, tag_id),
        FOREIGN KEY(expense_id) REFERENCES expenses(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_expense_tags_tag ON expense_tags(tag_id, expense_id);

    CREATE TABLE IF NOT EXISTS account_transfers(
        id TEXT PRIMARY KEY NOT NULL,
        account_id TEXT NOT NULL,
        amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
        direction TEXT NOT NULL CHECK(direction IN ('deposit','withdrawal')),
        note TEXT NOT NULL DEFAULT '',
        recurring_deposit_id TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(account_id) REFERENCES money_accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(recurring_deposit_id) REFERENCES recurring_deposits(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_account_transfers_account ON account_transfers(account_id);

    CREATE TABLE IF NOT EXISTS budgets(
        id TEXT PRIMARY KEY NOT NULL,
        space_id TEXT NOT NULL,
        amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
        period TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(space_id) REFERENCES spaces(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_budgets_space ON budgets(space_id);

    CREATE TABLE IF NOT EXISTS budget_tags(
        budget_id TEXT NOT NULL,
        tag_id TEXT NOT NULL,
        PRIMARY KEY(budget_id, tag_id),
        FOREIGN KEY(budget_id) REFERENCES budgets(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}
