// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crudeline_domain::{DomainError, OperationId, RefiningRunId, TankId, TowerId, TransitionError};

/// Errors that can occur while executing commands or answering queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A domain rule was violated.
    DomainViolation(DomainError),
    /// The workflow rejected a transition; every reason is listed.
    TransitionRejected {
        /// The operation that was not changed.
        operation_id: OperationId,
        /// All reasons, never empty.
        errors: Vec<TransitionError>,
    },
    /// No operation with this identifier exists.
    OperationNotFound(OperationId),
    /// An operation with this identifier already exists.
    DuplicateOperation(OperationId),
    /// No refining run with this identifier exists.
    RefiningRunNotFound(RefiningRunId),
    /// A refining run with this identifier already exists.
    DuplicateRefiningRun(RefiningRunId),
    /// The referenced tank is not registered.
    TankNotFound(TankId),
    /// The referenced tower is not registered.
    TowerNotFound(TowerId),
    /// `on_change` was called outside a Tokio runtime.
    NoRuntime,
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainViolation(err) => write!(f, "Domain violation: {err}"),
            Self::TransitionRejected {
                operation_id,
                errors,
            } => {
                write!(f, "Operation {operation_id} transition rejected: ")?;
                for (index, err) in errors.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
            Self::OperationNotFound(id) => write!(f, "Operation {id} not found"),
            Self::DuplicateOperation(id) => write!(f, "Operation {id} already exists"),
            Self::RefiningRunNotFound(id) => write!(f, "Refining run {id} not found"),
            Self::DuplicateRefiningRun(id) => write!(f, "Refining run {id} already exists"),
            Self::TankNotFound(id) => write!(f, "Tank {id} not found"),
            Self::TowerNotFound(id) => write!(f, "Tower {id} not found"),
            Self::NoRuntime => write!(f, "Change subscriptions require a Tokio runtime"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        Self::DomainViolation(err)
    }
}
