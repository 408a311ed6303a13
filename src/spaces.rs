// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The records the engine references but does not own: spaces, their
//! accounts, tags and payment methods.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::{EngineError, EngineResult};
use crate::models::{MoneyAccount, PaymentMethod, Space, Tag};
use crate::utils::{fmt_ts, new_id};

pub fn create_space(conn: &Connection, name: &str, now: NaiveDateTime) -> EngineResult<Space> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("space name cannot be empty"));
    }
    let space = Space {
        id: new_id(),
        name: name.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO spaces(id, name, created_at) VALUES (?1, ?2, ?3)",
        params![space.id, space.name, fmt_ts(&now)],
    )?;
    Ok(space)
}

pub fn get_space(conn: &Connection, id: &str) -> EngineResult<Space> {
    conn.query_row(
        "SELECT id, name, created_at FROM spaces WHERE id=?1",
        params![id],
        |r| {
            Ok(Space {
                id: r.get(0)?,
                name: r.get(1)?,
                created_at: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("Space", id))
}

pub fn list_spaces(conn: &Connection) -> EngineResult<Vec<Space>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM spaces ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok(Space {
            id: r.get(0)?,
            name: r.get(1)?,
            created_at: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Resolves a space by ID or by exact name.
pub fn resolve_space(conn: &Connection, key: &str) -> EngineResult<Space> {
    let key = key.trim();
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM spaces WHERE id=?1 OR name=?1 ORDER BY id=?1 DESC LIMIT 1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    match id {
        Some(id) => get_space(conn, &id),
        None => Err(EngineError::not_found("Space", key)),
    }
}

pub fn create_account(
    conn: &Connection,
    space_id: &str,
    name: &str,
    now: NaiveDateTime,
) -> EngineResult<MoneyAccount> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("account name cannot be empty"));
    }
    get_space(conn, space_id)?;
    let account = MoneyAccount {
        id: new_id(),
        space_id: space_id.to_string(),
        name: name.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO money_accounts(id, space_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![account.id, account.space_id, account.name, fmt_ts(&now)],
    )?;
    Ok(account)
}

pub fn get_account(conn: &Connection, id: &str) -> EngineResult<MoneyAccount> {
    conn.query_row(
        "SELECT id, space_id, name, created_at FROM money_accounts WHERE id=?1",
        params![id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("Account", id))
}

pub fn list_accounts(conn: &Connection, space_id: &str) -> EngineResult<Vec<MoneyAccount>> {
    let mut stmt = conn.prepare(
        "SELECT id, space_id, name, created_at FROM money_accounts WHERE space_id=?1 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![space_id], account_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Resolves an account of `space_id` by ID or by name.
pub fn resolve_account(conn: &Connection, space_id: &str, key: &str) -> EngineResult<MoneyAccount> {
    let key = key.trim();
    conn.query_row(
        "SELECT id, space_id, name, created_at FROM money_accounts
         WHERE space_id=?1 AND (id=?2 OR name=?2) ORDER BY id=?2 DESC LIMIT 1",
        params![space_id, key],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("Account", key))
}

fn account_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<MoneyAccount> {
    Ok(MoneyAccount {
        id: r.get(0)?,
        space_id: r.get(1)?,
        name: r.get(2)?,
        created_at: r.get(3)?,
    })
}

pub fn create_tag(
    conn: &Connection,
    space_id: &str,
    name: &str,
    color: Option<&str>,
) -> EngineResult<Tag> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(EngineError::validation("tag name cannot be empty"));
    }
    get_space(conn, space_id)?;
    let tag = Tag {
        id: new_id(),
        space_id: space_id.to_string(),
        name,
        color: color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
    };
    conn.execute(
        "INSERT INTO tags(id, space_id, name, color) VALUES (?1, ?2, ?3, ?4)",
        params![tag.id, tag.space_id, tag.name, tag.color],
    )?;
    Ok(tag)
}

pub fn list_tags(conn: &Connection, space_id: &str) -> EngineResult<Vec<Tag>> {
    let mut stmt =
        conn.prepare("SELECT id, space_id, name, color FROM tags WHERE space_id=?1 ORDER BY name")?;
    let rows = stmt.query_map(params![space_id], |r| {
        Ok(Tag {
            id: r.get(0)?,
            space_id: r.get(1)?,
            name: r.get(2)?,
            color: r.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Maps tag IDs or names of `space_id` to tag IDs, failing on the first unknown one.
pub fn resolve_tags(conn: &Connection, space_id: &str, keys: &[String]) -> EngineResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM tags WHERE space_id=?1 AND (id=?2 OR name=?3) ORDER BY id=?2 DESC LIMIT 1",
    )?;
    let mut ids: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let id: String = stmt
            .query_row(params![space_id, key, key.to_lowercase()], |r| r.get(0))
            .optional()?
            .ok_or_else(|| EngineError::not_found("Tag", key))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Checks that every tag ID belongs to `space_id`.
pub fn ensure_tags_in_space(conn: &Connection, space_id: &str, tag_ids: &[String]) -> EngineResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; tag_ids.len()].join(",");
    let sql = format!(
        "SELECT COUNT(DISTINCT id) FROM tags WHERE space_id=? AND id IN ({})",
        placeholders
    );
    let mut values: Vec<&str> = Vec::with_capacity(tag_ids.len() + 1);
    values.push(space_id);
    values.extend(tag_ids.iter().map(String::as_str));
    let found: i64 = conn.query_row(&sql, params_from_iter(values), |r| r.get(0))?;
    let mut distinct = tag_ids.to_vec();
    distinct.sort();
    distinct.dedup();
    if found as usize != distinct.len() {
        return Err(EngineError::validation(
            "one or more tags do not belong to this space",
        ));
    }
    Ok(())
}

pub fn create_payment_method(
    conn: &Connection,
    space_id: &str,
    name: &str,
) -> EngineResult<PaymentMethod> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("payment method name cannot be empty"));
    }
    get_space(conn, space_id)?;
    let method = PaymentMethod {
        id: new_id(),
        space_id: space_id.to_string(),
        name: name.to_string(),
    };
    conn.execute(
        "INSERT INTO payment_methods(id, space_id, name) VALUES (?1, ?2, ?3)",
        params![method.id, method.space_id, method.name],
    )?;
    Ok(method)
}

/// Checks that an optional payment method belongs to `space_id`.
pub fn ensure_payment_method_in_space(
    conn: &Connection,
    space_id: &str,
    payment_method_id: Option<&str>,
) -> EngineResult<()> {
    let Some(id) = payment_method_id else {
        return Ok(());
    };
    let owner: Option<String> = conn
        .query_row(
            "SELECT space_id FROM payment_methods WHERE id=?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    match owner {
        Some(owner) if owner == space_id => Ok(()),
        Some(_) => Err(EngineError::validation(
            "payment method does not belong to this space",
        )),
        None => Err(EngineError::not_found("Payment method", id)),
    }
}

pub fn list_payment_methods(conn: &Connection, space_id: &str) -> EngineResult<Vec<PaymentMethod>> {
    let mut stmt = conn
        .prepare("SELECT id, space_id, name FROM payment_methods WHERE space_id=?1 ORDER BY name")?;
    let rows = stmt.query_map(params![space_id], |r| {
        Ok(PaymentMethod {
            id: r.get(0)?,
            space_id: r.get(1)?,
            name: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Resolves a payment method of `space_id` by ID or by name.
pub fn resolve_payment_method(conn: &Connection, space_id: &str, key: &str) -> EngineResult<String> {
    let key = key.trim();
    conn.query_row(
        "SELECT id FROM payment_methods WHERE space_id=?1 AND (id=?2 OR name=?2)
         ORDER BY id=?2 DESC LIMIT 1",
        params![space_id, key],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("Payment method", key))
}
