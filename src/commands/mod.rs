// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod budgets;
pub mod deposits;
pub mod doctor;
pub mod expenses;
pub mod methods;
pub mod process;
pub mod recurring;
pub mod reports;
pub mod spaces;
pub mod tags;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use clap::ArgMatches;
use rusqlite::Connection;

use crate::models::Space;
use crate::utils::parse_datetime;

pub(crate) fn arg<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing required argument '{}'", name))
}

pub(crate) fn opt<'a>(m: &'a ArgMatches, name: &str) -> Option<&'a str> {
    m.get_one::<String>(name).map(String::as_str)
}

pub(crate) fn space(conn: &Connection, m: &ArgMatches) -> Result<Space> {
    Ok(crate::spaces::resolve_space(conn, arg(m, "space")?)?)
}

/// Every `--tag` value resolved to a tag ID of the space.
pub(crate) fn tag_ids(conn: &Connection, space_id: &str, m: &ArgMatches) -> Result<Vec<String>> {
    let keys: Vec<String> = m
        .get_many::<String>("tag")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    Ok(crate::spaces::resolve_tags(conn, space_id, &keys)?)
}

pub(crate) fn method_id(conn: &Connection, space_id: &str, m: &ArgMatches) -> Result<Option<String>> {
    match opt(m, "method") {
        Some(key) => Ok(Some(crate::spaces::resolve_payment_method(conn, space_id, key)?)),
        None => Ok(None),
    }
}

/// `--at` when given, otherwise `now`.
pub(crate) fn at_or(m: &ArgMatches, now: NaiveDateTime) -> Result<NaiveDateTime> {
    match opt(m, "at") {
        Some(s) => parse_datetime(s),
        None => Ok(now),
    }
}

pub(crate) fn yes_no(b: bool) -> String {
    if b { "yes".into() } else { "no".into() }
}
