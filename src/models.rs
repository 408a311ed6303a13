// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, Months, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::utils::days_in_month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Decodes a stored value. Anything unrecognised is treated as monthly.
    pub fn from_stored(s: &str) -> Frequency {
        s.parse().unwrap_or_else(|_| {
            tracing::warn!(value = s, "unknown stored frequency, treating as monthly");
            Frequency::Monthly
        })
    }

    /// Next occurrence after `from`. Month and year steps clamp to the last
    /// valid day of the target month.
    pub fn advance(&self, from: NaiveDateTime) -> NaiveDateTime {
        let next = match self {
            Frequency::Daily => from.checked_add_signed(TimeDelta::days(1)),
            Frequency::Weekly => from.checked_add_signed(TimeDelta::days(7)),
            Frequency::Biweekly => from.checked_add_signed(TimeDelta::days(14)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Yearly => from.checked_add_months(Months::new(12)),
        };
        next.unwrap_or(NaiveDateTime::MAX)
    }

    /// Like [`Frequency::advance`], but a month or year step taken from a
    /// date that was clamped to a month end returns to `anchor_day` once the
    /// target month is long enough. Any other date keeps its own day.
    pub fn advance_anchored(&self, from: NaiveDateTime, anchor_day: u32) -> NaiveDateTime {
        let next = self.advance(from);
        let clamped = from.day() < anchor_day && from.day() == days_in_month(from.year(), from.month());
        match self {
            Frequency::Monthly | Frequency::Yearly if clamped => {
                let day = anchor_day.min(days_in_month(next.year(), next.month()));
                next.with_day(day).unwrap_or(next)
            }
            _ => next,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(EngineError::validation(format!(
                "unknown frequency '{}'",
                other
            ))),
        }
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Frequency::from_stored)
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    Expense,
    Topup,
}

impl ExpenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Expense => "expense",
            ExpenseType::Topup => "topup",
        }
    }
}

impl FromStr for ExpenseType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(ExpenseType::Expense),
            "topup" => Ok(ExpenseType::Topup),
            other => Err(EngineError::validation(format!(
                "unknown expense type '{}'",
                other
            ))),
        }
    }
}

impl FromSql for ExpenseType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: EngineError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ExpenseType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Deposit,
    Withdrawal,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Deposit => "deposit",
            TransferDirection::Withdrawal => "withdrawal",
        }
    }

    /// Effect of a transfer of `amount` on the account balance.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransferDirection::Deposit => amount,
            TransferDirection::Withdrawal => -amount,
        }
    }
}

impl FromStr for TransferDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransferDirection::Deposit),
            "withdrawal" => Ok(TransferDirection::Withdrawal),
            other => Err(EngineError::validation(format!(
                "unknown transfer direction '{}'",
                other
            ))),
        }
    }
}

impl FromSql for TransferDirection {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: EngineError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TransferDirection {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }

    /// Decodes a stored value. Anything unrecognised is treated as monthly.
    pub fn from_stored(s: &str) -> BudgetPeriod {
        s.parse().unwrap_or_else(|_| {
            tracing::warn!(value = s, "unknown stored budget period, treating as monthly");
            BudgetPeriod::Monthly
        })
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetPeriod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(BudgetPeriod::Weekly),
            "monthly" => Ok(BudgetPeriod::Monthly),
            "yearly" => Ok(BudgetPeriod::Yearly),
            other => Err(EngineError::validation(format!(
                "unknown budget period '{}'",
                other
            ))),
        }
    }
}

impl FromSql for BudgetPeriod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(BudgetPeriod::from_stored)
    }
}

impl ToSql for BudgetPeriod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OnTrack,
    Warning,
    Over,
}

impl BudgetStatus {
    pub fn classify(percentage: Decimal) -> BudgetStatus {
        if percentage > Decimal::ONE_HUNDRED {
            BudgetStatus::Over
        } else if percentage >= Decimal::from(75) {
            BudgetStatus::Warning
        } else {
            BudgetStatus::OnTrack
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::OnTrack => "on_track",
            BudgetStatus::Warning => "warning",
            BudgetStatus::Over => "over",
        }
    }
}

/// When a recurring rule fires and whether it still does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    /// Inclusive upper bound for occurrences.
    pub end_date: Option<NaiveDateTime>,
    pub next_occurrence: NaiveDateTime,
    pub is_active: bool,
}

impl Schedule {
    pub fn new(
        frequency: Frequency,
        start_date: NaiveDateTime,
        end_date: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            frequency,
            start_date,
            end_date,
            next_occurrence: start_date,
            is_active: true,
        }
    }

    pub fn advance(&self, from: NaiveDateTime) -> NaiveDateTime {
        self.frequency
            .advance_anchored(from, self.start_date.day())
    }

    pub fn past_end(&self, at: NaiveDateTime) -> bool {
        self.end_date.is_some_and(|end| at > end)
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.is_active && self.next_occurrence <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneyAccount {
    pub id: String,
    pub space_id: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountWithBalance {
    #[serde(flatten)]
    pub account: MoneyAccount,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub space_id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub space_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub space_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub date: NaiveDateTime,
    pub payment_method_id: Option<String>,
    pub recurring_expense_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub direction: TransferDirection,
    pub note: String,
    pub recurring_deposit_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: String,
    pub space_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub r#type: ExpenseType,
    pub payment_method_id: Option<String>,
    pub tag_ids: Vec<String>,
    #[serde(flatten)]
    pub schedule: Schedule,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringDeposit {
    pub id: String,
    pub space_id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub title: String,
    #[serde(flatten)]
    pub schedule: Schedule,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub space_id: String,
    pub tag_ids: Vec<String>,
    pub amount_cents: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Budget {
    pub fn covers(&self, now: NaiveDateTime) -> bool {
        self.start_date <= now && self.end_date.is_none_or(|end| now <= end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetWithSpent {
    #[serde(flatten)]
    pub budget: Budget,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub spent_cents: i64,
    pub percentage: Decimal,
    pub status: BudgetStatus,
}
