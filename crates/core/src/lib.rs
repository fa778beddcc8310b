// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod apply;
mod clock;
mod command;
mod dashboard;
mod engine;
mod error;
mod ledger;
mod state;
mod trigger;

#[cfg(test)]
mod tests;

// Re-export public types and functions
pub use apply::{apply, apply_refining_run};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{Command, OperationCommand, Routed, RunCommand};
pub use dashboard::{BoardSnapshot, LevelBoard, TowerThroughput};
pub use engine::{CommandOutcome, Engine, NextState, Record, WorkflowView};
pub use error::CoreError;
pub use state::{
    LedgerSnapshot, RunRecorded, TransitionResult, operation_snapshot, refining_run_snapshot,
};
pub use trigger::{
    Change, DEFAULT_EVENT_BUFFER, EntityRef, RecomputationTrigger, RecomputeEvent,
    RecomputeReason, Subscription,
};
