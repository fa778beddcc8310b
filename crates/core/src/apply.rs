// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::command::{OperationCommand, RunCommand};
use crate::error::CoreError;
use crate::state::{RunRecorded, TransitionResult, operation_snapshot, refining_run_snapshot};
use crudeline_audit::{Action, Actor, AuditEvent, AuditSubject, Cause, StateSnapshot};
use crudeline_domain::{
    Operation, RefiningRun, attempt_transition, validate_edits, validate_new_operation,
    validate_refining_run,
};
use time::OffsetDateTime;

/// Applies an operation command to the current record, producing the new
/// record and its audit event.
///
/// `current` is `None` when no operation with the command's identifier exists.
///
/// # Errors
///
/// Returns an error if:
/// - A created operation is not in its initial state or fails validation
/// - The operation already exists (create) or does not exist (other commands)
/// - Staged edits carry invalid values
/// - The workflow rejects the transition
pub fn apply(
    current: Option<&Operation>,
    command: OperationCommand,
    actor: Actor,
    cause: Cause,
    now: OffsetDateTime,
) -> Result<TransitionResult, CoreError> {
    match command {
        OperationCommand::Create { operation } => {
            if current.is_some() {
                return Err(CoreError::DuplicateOperation(operation.id()));
            }
            validate_new_operation(&operation)?;

            let action: Action = Action::new(
                String::from("CreateOperation"),
                Some(format!(
                    "Programmed {} for contract {}/{}",
                    operation.kind(),
                    operation.contract_reference().contract_id,
                    operation.contract_reference().line_item_id
                )),
            );
            let audit_event: AuditEvent = AuditEvent::new(
                AuditSubject::Operation(operation.id()),
                actor,
                cause,
                action,
                StateSnapshot::absent(),
                operation_snapshot(&operation),
                now,
            );

            Ok(TransitionResult {
                new_state: operation,
                audit_event,
                changed: true,
            })
        }
        OperationCommand::Transition {
            operation_id,
            target,
            edits,
        } => {
            let current: &Operation = current.ok_or(CoreError::OperationNotFound(operation_id))?;
            validate_edits(current, &edits)?;

            let new_state: Operation = attempt_transition(&current.with_edits(&edits), target)
                .map_err(|errors| CoreError::TransitionRejected {
                    operation_id,
                    errors,
                })?;

            let details: String = if edits.is_empty() {
                format!("Moved to {target}")
            } else {
                format!("Moved to {target} with staged edits")
            };
            let audit_event: AuditEvent = AuditEvent::new(
                AuditSubject::Operation(operation_id),
                actor,
                cause,
                Action::new(String::from("Transition"), Some(details)),
                operation_snapshot(current),
                operation_snapshot(&new_state),
                now,
            );

            Ok(TransitionResult {
                changed: new_state != *current,
                new_state,
                audit_event,
            })
        }
        OperationCommand::SetActive {
            operation_id,
            active,
        } => {
            let current: &Operation = current.ok_or(CoreError::OperationNotFound(operation_id))?;
            let new_state: Operation = current.with_active(active);

            let details: &str = if active { "Restored" } else { "Deactivated" };
            let audit_event: AuditEvent = AuditEvent::new(
                AuditSubject::Operation(operation_id),
                actor,
                cause,
                Action::new(
                    String::from("SetOperationActive"),
                    Some(String::from(details)),
                ),
                operation_snapshot(current),
                operation_snapshot(&new_state),
                now,
            );

            Ok(TransitionResult {
                changed: new_state != *current,
                new_state,
                audit_event,
            })
        }
    }
}

/// Applies a refining run command to the recorded run, producing the new run
/// and its audit event.
///
/// `existing` is `None` when no run with the command's identifier exists.
///
/// # Errors
///
/// Returns an error if:
/// - A recorded run already exists, or an updated one does not
/// - The supplied run fails validation
pub fn apply_refining_run(
    existing: Option<&RefiningRun>,
    command: RunCommand,
    actor: Actor,
    cause: Cause,
    now: OffsetDateTime,
) -> Result<RunRecorded, CoreError> {
    let run_id = command.run_id();
    let (name, run, details): (&str, RefiningRun, String) = match command {
        RunCommand::Record { run } => {
            if existing.is_some() {
                return Err(CoreError::DuplicateRefiningRun(run.id));
            }
            validate_refining_run(&run)?;
            let details: String = format!(
                "Charged {} bbl from tank {} into tower {}",
                run.total_quantity, run.tank_reference, run.tower_reference
            );
            ("RecordRefiningRun", run, details)
        }
        RunCommand::Update { run } => {
            if existing.is_none() {
                return Err(CoreError::RefiningRunNotFound(run_id));
            }
            validate_refining_run(&run)?;
            let details: String = format!(
                "Corrected to {} bbl from tank {} into tower {}",
                run.total_quantity, run.tank_reference, run.tower_reference
            );
            ("UpdateRefiningRun", run, details)
        }
        RunCommand::SetActive { active, .. } => {
            let current: &RefiningRun = existing.ok_or(CoreError::RefiningRunNotFound(run_id))?;
            let run: RefiningRun = RefiningRun {
                active,
                ..current.clone()
            };
            let details: &str = if active { "Restored" } else { "Deactivated" };
            ("SetRefiningRunActive", run, String::from(details))
        }
    };

    let before: StateSnapshot = existing.map_or_else(StateSnapshot::absent, refining_run_snapshot);
    let audit_event: AuditEvent = AuditEvent::new(
        AuditSubject::RefiningRun(run_id),
        actor,
        cause,
        Action::new(String::from(name), Some(details)),
        before,
        refining_run_snapshot(&run),
        now,
    );

    Ok(RunRecorded {
        changed: existing != Some(&run),
        run,
        audit_event,
    })
}
