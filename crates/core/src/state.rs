// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crudeline_audit::{AuditEvent, StateSnapshot};
use crudeline_domain::{Operation, RefiningRun, Tank, Tower};
use serde::Serialize;

/// Converts an operation to a snapshot for audit purposes.
#[must_use]
pub fn operation_snapshot(operation: &Operation) -> StateSnapshot {
    StateSnapshot::new(operation.summary())
}

/// Converts a refining run to a snapshot for audit purposes.
#[must_use]
pub fn refining_run_snapshot(run: &RefiningRun) -> StateSnapshot {
    StateSnapshot::new(format!(
        "run={},tower={},feed_tank={},total={},outputs={},active={}",
        run.id,
        run.tower_reference,
        run.tank_reference,
        run.total_quantity,
        run.outputs.len(),
        run.active
    ))
}

/// The result of a successful operation command.
///
/// Transitions are atomic: they either succeed completely or fail without side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    /// The operation after the command.
    pub new_state: Operation,
    /// The audit event recording this command.
    pub audit_event: AuditEvent,
    /// False when the command left the operation exactly as it was.
    pub changed: bool,
}

/// The result of a successful refining run command.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecorded {
    pub run: RefiningRun,
    pub audit_event: AuditEvent,
    /// False when the command left the run exactly as it was.
    pub changed: bool,
}

/// A consistent copy of everything the engine holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub tanks: Vec<Tank>,
    pub towers: Vec<Tower>,
    pub operations: Vec<Operation>,
    pub refining_runs: Vec<RefiningRun>,
}
