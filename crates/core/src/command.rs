// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crudeline_domain::{
    Operation, OperationEdits, OperationId, RefiningRun, RefiningRunId, WorkflowState,
};

/// A command represents user or system intent as data only.
///
/// Commands are the only way to request changes to operations and refining runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Register a new reception or dispatch in its initial state.
    CreateOperation {
        /// The operation as captured by the scheduling form.
        operation: Operation,
    },
    /// Move an operation to `target`, applying `edits` in the same step.
    Transition {
        /// The operation to move.
        operation_id: OperationId,
        /// The requested state in either dimension.
        target: WorkflowState,
        /// Field values captured together with the request.
        edits: OperationEdits,
    },
    /// Soft-delete or restore an operation.
    SetOperationActive {
        /// The operation to change.
        operation_id: OperationId,
        /// The new flag value.
        active: bool,
    },
    /// Record a tower charge.
    RecordRefiningRun {
        /// The run, with its output shares.
        run: RefiningRun,
    },
    /// Replace a recorded tower charge.
    UpdateRefiningRun {
        /// The corrected run; its identifier selects the record.
        run: RefiningRun,
    },
    /// Soft-delete or restore a refining run.
    SetRefiningRunActive {
        /// The run to change.
        run_id: RefiningRunId,
        /// The new flag value.
        active: bool,
    },
}

/// A command against a single operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationCommand {
    Create {
        operation: Operation,
    },
    Transition {
        operation_id: OperationId,
        target: WorkflowState,
        edits: OperationEdits,
    },
    SetActive {
        operation_id: OperationId,
        active: bool,
    },
}

/// A command against a single refining run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunCommand {
    Record { run: RefiningRun },
    Update { run: RefiningRun },
    SetActive { run_id: RefiningRunId, active: bool },
}

/// A command sorted by the kind of record it changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Operation(OperationCommand),
    RefiningRun(RunCommand),
}

impl Command {
    /// The name used for audit actions and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateOperation { .. } => "CreateOperation",
            Self::Transition { .. } => "Transition",
            Self::SetOperationActive { .. } => "SetOperationActive",
            Self::RecordRefiningRun { .. } => "RecordRefiningRun",
            Self::UpdateRefiningRun { .. } => "UpdateRefiningRun",
            Self::SetRefiningRunActive { .. } => "SetRefiningRunActive",
        }
    }

    /// The operation this command targets, if any.
    #[must_use]
    pub const fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::CreateOperation { operation } => Some(operation.id()),
            Self::Transition { operation_id, .. }
            | Self::SetOperationActive { operation_id, .. } => Some(*operation_id),
            Self::RecordRefiningRun { .. }
            | Self::UpdateRefiningRun { .. }
            | Self::SetRefiningRunActive { .. } => None,
        }
    }

    /// Splits the command by the record it changes.
    #[must_use]
    pub fn route(self) -> Routed {
        match self {
            Self::CreateOperation { operation } => {
                Routed::Operation(OperationCommand::Create { operation })
            }
            Self::Transition {
                operation_id,
                target,
                edits,
            } => Routed::Operation(OperationCommand::Transition {
                operation_id,
                target,
                edits,
            }),
            Self::SetOperationActive {
                operation_id,
                active,
            } => Routed::Operation(OperationCommand::SetActive {
                operation_id,
                active,
            }),
            Self::RecordRefiningRun { run } => Routed::RefiningRun(RunCommand::Record { run }),
            Self::UpdateRefiningRun { run } => Routed::RefiningRun(RunCommand::Update { run }),
            Self::SetRefiningRunActive { run_id, active } => {
                Routed::RefiningRun(RunCommand::SetActive { run_id, active })
            }
        }
    }
}

impl OperationCommand {
    /// The operation this command targets.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        match self {
            Self::Create { operation } => operation.id(),
            Self::Transition { operation_id, .. } | Self::SetActive { operation_id, .. } => {
                *operation_id
            }
        }
    }
}

impl RunCommand {
    /// The refining run this command targets.
    #[must_use]
    pub const fn run_id(&self) -> RefiningRunId {
        match self {
            Self::Record { run } | Self::Update { run } => run.id,
            Self::SetActive { run_id, .. } => *run_id,
        }
    }

    /// The run as the command supplies it, if it supplies one.
    #[must_use]
    pub const fn run(&self) -> Option<&RefiningRun> {
        match self {
            Self::Record { run } | Self::Update { run } => Some(run),
            Self::SetActive { .. } => None,
        }
    }
}
