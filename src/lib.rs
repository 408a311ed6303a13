// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod budget;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod period;
pub mod recurring;
pub mod scheduler;
pub mod spaces;
pub mod utils;
