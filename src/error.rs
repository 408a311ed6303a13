// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by the stores and the recurrence engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("Recurring rule {rule_id} exceeded the catch-up limit of {limit} occurrences")]
    CatchUpLimit { rule_id: String, limit: usize },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
