// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The transition check applied to a single operation.
//!
//! `attempt_transition` is pure: it validates against the rule tables and
//! returns the updated copy. Committing the copy and announcing the change is
//! the caller's job.

use crate::error::TransitionError;
use crate::fields::FieldName;
use crate::rules::{
    required_fields_for_transition, state_blockers, state_prerequisites, valid_transitions,
};
use crate::states::{LoadState, WorkflowState};
use crate::types::Operation;

/// Validates and applies a transition to `target`.
///
/// 1. `target` equal to the current state is an idempotent no-op.
/// 2. `target` must be adjacent to the current state in its dimension;
///    otherwise the single `InvalidTransition` error is returned.
/// 3. Every missing required field, unmet prerequisite, blocking state, and
///    premature measurement is collected and returned together.
///
/// # Errors
///
/// Returns every [`TransitionError`] that applies. The list is never empty.
pub fn attempt_transition(
    operation: &Operation,
    target: WorkflowState,
) -> Result<Operation, Vec<TransitionError>> {
    let status = operation.status();
    let current: WorkflowState = status.current_for(target);

    if current == target {
        let violations: Vec<TransitionError> = invariant_violations(operation, status.load);
        return if violations.is_empty() {
            Ok(operation.clone())
        } else {
            Err(violations)
        };
    }

    if !valid_transitions(operation.kind(), current).contains(&target) {
        return Err(vec![TransitionError::InvalidTransition {
            from: current,
            to: target,
        }]);
    }

    let mut errors: Vec<TransitionError> = missing_fields(operation, target)
        .into_iter()
        .map(|field| TransitionError::MissingRequiredField {
            field,
            target_state: target,
        })
        .collect();

    for requires in state_prerequisites(operation.kind(), target) {
        if !status.is_in(*requires) {
            errors.push(TransitionError::StatePrerequisite {
                target_state: target,
                requires: *requires,
                actual: status.current_for(*requires),
            });
        }
    }

    for blocked_by in state_blockers(operation.kind(), target) {
        if status.is_in(*blocked_by) {
            errors.push(TransitionError::StateConflict {
                target_state: target,
                blocked_by: *blocked_by,
            });
        }
    }

    let next_status = status.with_state(target);
    errors.extend(invariant_violations(operation, next_status.load));

    if errors.is_empty() {
        Ok(operation.clone().with_status(next_status))
    } else {
        Err(errors)
    }
}

/// Required fields for `target` that `operation` does not yet satisfy.
#[must_use]
pub fn missing_fields(operation: &Operation, target: WorkflowState) -> Vec<FieldName> {
    required_fields_for_transition(operation.kind(), target)
        .iter()
        .copied()
        .filter(|field| !operation.has_field(*field))
        .collect()
}

// The measured quantity stays unset until the load has finished.
fn invariant_violations(operation: &Operation, load: LoadState) -> Vec<TransitionError> {
    let measured = operation.received_quantity().is_some_and(|q| q.abs() > 0.0);
    if measured && load != LoadState::Finished {
        vec![TransitionError::PrematureField {
            field: FieldName::ReceivedQuantity,
            load_state: load,
        }]
    } else {
        Vec::new()
    }
}
