// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::fields::FieldName;
use crate::states::{LoadState, WorkflowState};
use crate::types::{OperationId, RefiningRunId, TankId};
use serde::{Deserialize, Serialize};

/// Errors that can occur during domain validation and parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown operation kind string.
    InvalidOperationKind(String),
    /// Unknown transport state string.
    InvalidTransportState(String),
    /// Unknown load state string.
    InvalidLoadState(String),
    /// Workflow state string is not `transport:<state>` or `load:<state>`.
    InvalidWorkflowState(String),
    /// Unknown field name.
    InvalidFieldName(String),
    /// New operations must start in the initial state with no measurement.
    OperationNotInitial {
        /// The operation identifier.
        operation_id: OperationId,
        /// The status the record arrived with.
        status: String,
    },
    /// Contract reference is missing an identifier.
    InvalidContractReference {
        /// The operation identifier.
        operation_id: OperationId,
    },
    /// A quantity is negative, NaN, or infinite.
    InvalidQuantity {
        /// Which quantity was rejected.
        field: &'static str,
        /// Description of the violation.
        reason: String,
    },
    /// Tank capacity is negative or not finite.
    InvalidCapacity {
        /// The tank identifier.
        tank_id: TankId,
    },
    /// Refining run output shares are out of range.
    InvalidPercentage {
        /// The refining run identifier.
        run_id: RefiningRunId,
        /// Description of the violation.
        reason: String,
    },
    /// Operation pumping window ends before it starts.
    InvalidOperationWindow {
        /// The operation identifier.
        operation_id: OperationId,
    },
    /// Refining run ends before it starts.
    InvalidRunWindow {
        /// The refining run identifier.
        run_id: RefiningRunId,
    },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOperationKind(s) => write!(f, "Invalid operation kind: {s}"),
            Self::InvalidTransportState(s) => write!(f, "Invalid transport state: {s}"),
            Self::InvalidLoadState(s) => write!(f, "Invalid load state: {s}"),
            Self::InvalidWorkflowState(s) => {
                write!(
                    f,
                    "Invalid workflow state: {s}. Expected 'transport:<state>' or 'load:<state>'"
                )
            }
            Self::InvalidFieldName(s) => write!(f, "Invalid field name: {s}"),
            Self::OperationNotInitial {
                operation_id,
                status,
            } => {
                write!(
                    f,
                    "Operation {operation_id} must be created in the initial state, got {status}"
                )
            }
            Self::InvalidContractReference { operation_id } => {
                write!(
                    f,
                    "Operation {operation_id} has an unassigned contract reference"
                )
            }
            Self::InvalidQuantity { field, reason } => {
                write!(f, "Invalid {field}: {reason}")
            }
            Self::InvalidCapacity { tank_id } => {
                write!(
                    f,
                    "Tank {tank_id} capacity must be a finite, non-negative number"
                )
            }
            Self::InvalidPercentage { run_id, reason } => {
                write!(f, "Refining run {run_id} has invalid outputs: {reason}")
            }
            Self::InvalidOperationWindow { operation_id } => {
                write!(f, "Operation {operation_id} pumping window ends before it starts")
            }
            Self::InvalidRunWindow { run_id } => {
                write!(f, "Refining run {run_id} ends before it starts")
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// A single reason a transition was rejected.
///
/// `attempt_transition` returns every applicable violation at once so callers
/// can render them together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionError {
    /// The target is not adjacent to the current state.
    InvalidTransition {
        /// Current state in the target's dimension.
        from: WorkflowState,
        /// Requested state.
        to: WorkflowState,
    },
    /// A field required by the target state is absent or not positive.
    MissingRequiredField {
        /// The missing field.
        field: FieldName,
        /// Requested state.
        target_state: WorkflowState,
    },
    /// The other dimension is not where the target requires it to be.
    StatePrerequisite {
        /// Requested state.
        target_state: WorkflowState,
        /// State the other dimension must be in.
        requires: WorkflowState,
        /// State the other dimension is actually in.
        actual: WorkflowState,
    },
    /// The other dimension is in a state that forbids the target.
    StateConflict {
        /// Requested state.
        target_state: WorkflowState,
        /// State of the other dimension that blocks it.
        blocked_by: WorkflowState,
    },
    /// A measurement was supplied before the load finished.
    PrematureField {
        /// The offending field.
        field: FieldName,
        /// Load state the operation would be left in.
        load_state: LoadState,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid transition from {from} to {to}")
            }
            Self::MissingRequiredField {
                field,
                target_state,
            } => {
                write!(
                    f,
                    "Field '{field}' is required to transition to {target_state}"
                )
            }
            Self::StatePrerequisite {
                target_state,
                requires,
                actual,
            } => {
                write!(
                    f,
                    "Transition to {target_state} requires {requires}, but operation is {actual}"
                )
            }
            Self::StateConflict {
                target_state,
                blocked_by,
            } => {
                write!(
                    f,
                    "Transition to {target_state} is not allowed while operation is {blocked_by}"
                )
            }
            Self::PrematureField { field, load_state } => {
                write!(
                    f,
                    "Field '{field}' cannot be set while load state is {load_state}"
                )
            }
        }
    }
}

impl std::error::Error for TransitionError {}
