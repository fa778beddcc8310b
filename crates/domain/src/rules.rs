// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Static workflow rule tables.
//!
//! Every rule the state machine applies is a row in one of these tables:
//!
//! - adjacency: which states are reachable in one step
//! - required fields: what must be captured before entering a state
//! - prerequisites: where the other dimension must be before entering a state
//! - blockers: where the other dimension must not be when entering a state
//! - editability: which fields a form may change in the current state
//!
//! The tables are keyed per operation kind. Lookups never branch on business
//! data; extending the workflow means adding rows, not control flow.

use crate::fields::FieldName;
use crate::states::{LoadState, OperationKind, OperationStatus, TransportState, WorkflowState};

const PROGRAMMED: WorkflowState = WorkflowState::Transport(TransportState::Programmed);
const IN_TRANSIT: WorkflowState = WorkflowState::Transport(TransportState::InTransit);
const AT_FACILITY: WorkflowState = WorkflowState::Transport(TransportState::AtFacility);
const COMPLETED: WorkflowState = WorkflowState::Transport(TransportState::Completed);
const CANCELLED: WorkflowState = WorkflowState::Transport(TransportState::Cancelled);
const PENDING_SAMPLING: WorkflowState = WorkflowState::Load(LoadState::PendingSampling);
const SAMPLING_APPROVED: WorkflowState = WorkflowState::Load(LoadState::SamplingApproved);
const LOAD_IN_PROGRESS: WorkflowState = WorkflowState::Load(LoadState::InProgress);
const LOAD_FINISHED: WorkflowState = WorkflowState::Load(LoadState::Finished);

type Table<V> = &'static [(WorkflowState, &'static [V])];

const RECEPTION_TRANSITIONS: Table<WorkflowState> = &[
    (PROGRAMMED, &[IN_TRANSIT, CANCELLED]),
    (IN_TRANSIT, &[AT_FACILITY, CANCELLED]),
    (AT_FACILITY, &[COMPLETED, CANCELLED]),
    (COMPLETED, &[]),
    (CANCELLED, &[]),
    (PENDING_SAMPLING, &[SAMPLING_APPROVED]),
    (SAMPLING_APPROVED, &[LOAD_IN_PROGRESS]),
    (LOAD_IN_PROGRESS, &[LOAD_FINISHED]),
    (LOAD_FINISHED, &[]),
];

// Dispatch trucks arrive empty, load, then leave.
const DISPATCH_TRANSITIONS: Table<WorkflowState> = &[
    (PROGRAMMED, &[AT_FACILITY, CANCELLED]),
    (AT_FACILITY, &[IN_TRANSIT, CANCELLED]),
    (IN_TRANSIT, &[COMPLETED, CANCELLED]),
    (COMPLETED, &[]),
    (CANCELLED, &[]),
    (PENDING_SAMPLING, &[SAMPLING_APPROVED]),
    (SAMPLING_APPROVED, &[LOAD_IN_PROGRESS]),
    (LOAD_IN_PROGRESS, &[LOAD_FINISHED]),
    (LOAD_FINISHED, &[]),
];

const RECEPTION_REQUIRED_FIELDS: Table<FieldName> = &[
    (
        IN_TRANSIT,
        &[
            FieldName::PlateNumber,
            FieldName::GuideId,
            FieldName::SentQuantity,
        ],
    ),
    (
        AT_FACILITY,
        &[FieldName::TankReference, FieldName::LineReference],
    ),
    (COMPLETED, &[FieldName::ReceivedQuantity]),
    (
        LOAD_IN_PROGRESS,
        &[FieldName::StartTimestamp, FieldName::EndTimestamp],
    ),
    (
        LOAD_FINISHED,
        &[FieldName::ReceivedQuantity, FieldName::EndTimestamp],
    ),
];

const DISPATCH_REQUIRED_FIELDS: Table<FieldName> = &[
    (
        AT_FACILITY,
        &[
            FieldName::PlateNumber,
            FieldName::TankReference,
            FieldName::LineReference,
        ],
    ),
    (IN_TRANSIT, &[FieldName::SentQuantity, FieldName::GuideId]),
    (COMPLETED, &[FieldName::ReceivedQuantity]),
    (
        LOAD_IN_PROGRESS,
        &[FieldName::StartTimestamp, FieldName::EndTimestamp],
    ),
    (
        LOAD_FINISHED,
        &[FieldName::SentQuantity, FieldName::EndTimestamp],
    ),
];

const RECEPTION_PREREQUISITES: Table<WorkflowState> = &[
    (SAMPLING_APPROVED, &[AT_FACILITY]),
    (LOAD_IN_PROGRESS, &[AT_FACILITY]),
    (LOAD_FINISHED, &[AT_FACILITY]),
    (COMPLETED, &[LOAD_FINISHED]),
];

const DISPATCH_PREREQUISITES: Table<WorkflowState> = &[
    (SAMPLING_APPROVED, &[AT_FACILITY]),
    (LOAD_IN_PROGRESS, &[AT_FACILITY]),
    (LOAD_FINISHED, &[AT_FACILITY]),
    (IN_TRANSIT, &[LOAD_FINISHED]),
];

// Pumping must be finished before a truck can be turned away.
const RECEPTION_BLOCKERS: Table<WorkflowState> = &[(CANCELLED, &[LOAD_IN_PROGRESS])];

const DISPATCH_BLOCKERS: Table<WorkflowState> = &[(CANCELLED, &[LOAD_IN_PROGRESS])];

/// States of each dimension in which a field may be edited.
#[derive(Debug, Clone, Copy)]
struct EditWindow {
    transport: &'static [TransportState],
    load: &'static [LoadState],
}

const ANY_LOAD: &[LoadState] = &LoadState::ALL;
const BEFORE_PUMPING: &[LoadState] = &[LoadState::PendingSampling, LoadState::SamplingApproved];
const UNTIL_FINISHED: &[LoadState] = &[
    LoadState::PendingSampling,
    LoadState::SamplingApproved,
    LoadState::InProgress,
];
const MEASURING: &[LoadState] = &[LoadState::InProgress, LoadState::Finished];

const RECEPTION_EDITABLE: &[(FieldName, EditWindow)] = &[
    (
        FieldName::ContractReference,
        EditWindow {
            transport: &[TransportState::Programmed],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::PlateNumber,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::InTransit],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::DriverInfo,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::InTransit],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::GuideId,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::InTransit],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::SentQuantity,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::InTransit],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::TankReference,
        EditWindow {
            transport: &[TransportState::InTransit, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::LineReference,
        EditWindow {
            transport: &[TransportState::InTransit, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::StartTimestamp,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::EndTimestamp,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: UNTIL_FINISHED,
        },
    ),
    (
        FieldName::ReceivedQuantity,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: MEASURING,
        },
    ),
];

const DISPATCH_EDITABLE: &[(FieldName, EditWindow)] = &[
    (
        FieldName::ContractReference,
        EditWindow {
            transport: &[TransportState::Programmed],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::PlateNumber,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::DriverInfo,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::TankReference,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::LineReference,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::StartTimestamp,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: BEFORE_PUMPING,
        },
    ),
    (
        FieldName::EndTimestamp,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: UNTIL_FINISHED,
        },
    ),
    (
        FieldName::SentQuantity,
        EditWindow {
            transport: &[TransportState::Programmed, TransportState::AtFacility],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::GuideId,
        EditWindow {
            transport: &[TransportState::AtFacility],
            load: ANY_LOAD,
        },
    ),
    (
        FieldName::ReceivedQuantity,
        EditWindow {
            transport: &[TransportState::InTransit],
            load: &[LoadState::Finished],
        },
    ),
];

fn lookup<V>(table: Table<V>, state: WorkflowState) -> &'static [V] {
    for (key, values) in table {
        if *key == state {
            return *values;
        }
    }
    &[]
}

const fn transition_table(kind: OperationKind) -> Table<WorkflowState> {
    match kind {
        OperationKind::Reception => RECEPTION_TRANSITIONS,
        OperationKind::Dispatch => DISPATCH_TRANSITIONS,
    }
}

const fn required_fields_table(kind: OperationKind) -> Table<FieldName> {
    match kind {
        OperationKind::Reception => RECEPTION_REQUIRED_FIELDS,
        OperationKind::Dispatch => DISPATCH_REQUIRED_FIELDS,
    }
}

const fn prerequisite_table(kind: OperationKind) -> Table<WorkflowState> {
    match kind {
        OperationKind::Reception => RECEPTION_PREREQUISITES,
        OperationKind::Dispatch => DISPATCH_PREREQUISITES,
    }
}

const fn blocker_table(kind: OperationKind) -> Table<WorkflowState> {
    match kind {
        OperationKind::Reception => RECEPTION_BLOCKERS,
        OperationKind::Dispatch => DISPATCH_BLOCKERS,
    }
}

const fn editable_table(kind: OperationKind) -> &'static [(FieldName, EditWindow)] {
    match kind {
        OperationKind::Reception => RECEPTION_EDITABLE,
        OperationKind::Dispatch => DISPATCH_EDITABLE,
    }
}

/// States reachable in one step from `state` for an operation of `kind`.
///
/// The result never contains `state` itself and is empty for terminal states.
#[must_use]
pub fn valid_transitions(kind: OperationKind, state: WorkflowState) -> &'static [WorkflowState] {
    lookup(transition_table(kind), state)
}

/// Fields that must be present (and positive, for quantities) before entering `target`.
#[must_use]
pub fn required_fields_for_transition(
    kind: OperationKind,
    target: WorkflowState,
) -> &'static [FieldName] {
    lookup(required_fields_table(kind), target)
}

/// States the opposite dimension must be in before entering `target`.
#[must_use]
pub fn state_prerequisites(kind: OperationKind, target: WorkflowState) -> &'static [WorkflowState] {
    lookup(prerequisite_table(kind), target)
}

/// States of the opposite dimension from which `target` cannot be entered.
#[must_use]
pub fn state_blockers(kind: OperationKind, target: WorkflowState) -> &'static [WorkflowState] {
    lookup(blocker_table(kind), target)
}

/// Whether a form may edit `field` while the operation is in `status`.
///
/// This table is independent of the transition tables and is not enforced by
/// `attempt_transition`.
#[must_use]
pub fn is_field_editable(kind: OperationKind, field: FieldName, status: OperationStatus) -> bool {
    editable_table(kind)
        .iter()
        .find(|(name, _)| *name == field)
        .is_some_and(|(_, window)| {
            window.transport.contains(&status.transport) && window.load.contains(&status.load)
        })
}
