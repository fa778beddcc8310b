// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read-only helpers over the rule tables for building steppers and forms.

use crate::fields::FieldName;
use crate::rules::{is_field_editable, valid_transitions};
use crate::states::{LoadState, OperationKind, OperationStatus, TransportState, WorkflowState};
use serde::Serialize;

/// Where a step sits relative to the operation's current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepProgress {
    /// Already passed.
    Done,
    /// The operation is here.
    Current,
    /// Not reached yet.
    Upcoming,
    /// Will never be reached (the operation was cancelled first).
    Skipped,
}

/// One entry of the visible workflow stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    pub state: WorkflowState,
    pub progress: StepProgress,
}

const RECEPTION_PATH: [TransportState; 4] = [
    TransportState::Programmed,
    TransportState::InTransit,
    TransportState::AtFacility,
    TransportState::Completed,
];

const DISPATCH_PATH: [TransportState; 4] = [
    TransportState::Programmed,
    TransportState::AtFacility,
    TransportState::InTransit,
    TransportState::Completed,
];

/// The transport happy path for `kind`, in order.
#[must_use]
pub const fn transport_path(kind: OperationKind) -> [TransportState; 4] {
    match kind {
        OperationKind::Reception => RECEPTION_PATH,
        OperationKind::Dispatch => DISPATCH_PATH,
    }
}

/// Every state reachable in one step from `status`, transport moves first.
#[must_use]
pub fn next_states(kind: OperationKind, status: OperationStatus) -> Vec<WorkflowState> {
    valid_transitions(kind, WorkflowState::Transport(status.transport))
        .iter()
        .chain(valid_transitions(kind, WorkflowState::Load(status.load)))
        .copied()
        .collect()
}

/// Fields a form may edit while the operation is in `status`.
#[must_use]
pub fn editable_fields(kind: OperationKind, status: OperationStatus) -> Vec<FieldName> {
    FieldName::ALL
        .into_iter()
        .filter(|field| is_field_editable(kind, *field, status))
        .collect()
}

/// Builds the stepper: the transport happy path followed by the load path.
///
/// Transport history is not stored, so a cancelled operation shows only
/// `Programmed` as done, the remaining transport steps as skipped, the load
/// steps up to its last load state as done, and `Cancelled` appended as current.
#[must_use]
pub fn workflow_steps(kind: OperationKind, status: OperationStatus) -> Vec<WorkflowStep> {
    let path = transport_path(kind);
    let cancelled = status.transport == TransportState::Cancelled;
    let reached: Option<usize> = path.iter().position(|s| *s == status.transport);

    let mut steps: Vec<WorkflowStep> = path
        .iter()
        .enumerate()
        .map(|(index, state)| {
            let progress = match reached {
                Some(at) if index < at => StepProgress::Done,
                Some(at) if index == at => StepProgress::Current,
                Some(_) => StepProgress::Upcoming,
                None if cancelled && index == 0 => StepProgress::Done,
                None if cancelled => StepProgress::Skipped,
                None => StepProgress::Upcoming,
            };
            WorkflowStep {
                state: WorkflowState::Transport(*state),
                progress,
            }
        })
        .collect();

    let load_at: Option<usize> = LoadState::ALL.iter().position(|s| *s == status.load);
    steps.extend(LoadState::ALL.iter().enumerate().map(|(index, state)| {
        let progress = match load_at {
            Some(at) if index < at => StepProgress::Done,
            Some(at) if index == at && cancelled => StepProgress::Done,
            Some(at) if index == at => StepProgress::Current,
            _ if cancelled => StepProgress::Skipped,
            _ => StepProgress::Upcoming,
        };
        WorkflowStep {
            state: WorkflowState::Load(*state),
            progress,
        }
    }));

    if cancelled {
        steps.push(WorkflowStep {
            state: WorkflowState::Transport(TransportState::Cancelled),
            progress: StepProgress::Current,
        });
    }

    steps
}
