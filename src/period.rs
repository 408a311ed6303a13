// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::models::BudgetPeriod;
use crate::utils::days_in_month;

/// Inclusive `[start, end]` bounds of the period of kind `period` containing `now`.
///
/// Weeks run Monday 00:00:00 through Sunday 23:59:59; months and years run from
/// their first day at midnight to their last day at 23:59:59.
pub fn bounds(period: BudgetPeriod, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let today = now.date();
    let (first, last) = match period {
        BudgetPeriod::Weekly => {
            let offset = today.weekday().num_days_from_monday() as i64;
            let monday = today - TimeDelta::days(offset);
            (monday, monday + TimeDelta::days(6))
        }
        BudgetPeriod::Monthly => {
            let first = today.with_day(1).unwrap_or(today);
            let last_day = days_in_month(today.year(), today.month());
            (first, today.with_day(last_day).unwrap_or(today))
        }
        BudgetPeriod::Yearly => (
            NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
        ),
    };
    (start_of_day(first), end_of_day(last))
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| start_of_day(date))
}
