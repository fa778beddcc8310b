// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::apply::{apply, apply_refining_run};
use crate::clock::Clock;
use crate::command::{Command, OperationCommand, Routed, RunCommand};
use crate::error::CoreError;
use crate::ledger::{Ledger, OperationSlot, lock, write};
use crate::state::{LedgerSnapshot, RunRecorded, TransitionResult};
use crate::trigger::{EntityRef, RecomputationTrigger, RecomputeReason};
use crudeline_audit::{Actor, AuditEvent, AuditSubject, Cause};
use crudeline_domain::{
    FieldName, Operation, OperationId, OperationKind, OperationStatus, RefiningRun,
    SectionEstimate, Tank, TankEstimate, TankId, Tower, TowerId, WorkflowState, WorkflowStep,
    editable_fields, estimated_tower_throughput, missing_fields, next_states, tank_estimate,
    validate_tank, workflow_steps,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// The record a command produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum Record {
    Operation(Operation),
    RefiningRun(RefiningRun),
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub record: Record,
    /// `None` when the command left the record unchanged.
    pub audit_event: Option<AuditEvent>,
    /// Entities whose estimates were invalidated.
    pub affected: Vec<EntityRef>,
    /// Sequence of the published recompute, if one was published.
    pub sequence: Option<u64>,
}

/// A state reachable in one step and what it still needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextState {
    pub state: WorkflowState,
    pub missing_fields: Vec<FieldName>,
}

/// Everything a form needs to render an operation's workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub next_states: Vec<NextState>,
    pub editable_fields: Vec<FieldName>,
    pub steps: Vec<WorkflowStep>,
}

/// The lifecycle engine: executes commands against the ledger, records the
/// audit trail, and announces every change through the recompute trigger.
///
/// All methods take `&self`; share the engine behind an `Arc`.
pub struct Engine {
    ledger: Ledger,
    trigger: RecomputationTrigger,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, trigger: RecomputationTrigger) -> Self {
        Self {
            ledger: Ledger::default(),
            trigger,
            clock,
        }
    }

    /// The trigger recompute events are published on.
    #[must_use]
    pub const fn trigger(&self) -> &RecomputationTrigger {
        &self.trigger
    }

    /// The engine's notion of the current time.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Registers or replaces a tank definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the tank's capacity is invalid.
    pub fn register_tank(&self, tank: Tank) -> Result<u64, CoreError> {
        validate_tank(&tank)?;
        let id: TankId = tank.id;
        let mut tanks = write(&self.ledger.tanks);
        tanks.insert(id, tank);
        let sequence: u64 = self
            .trigger
            .notify(EntityRef::Tank(id), RecomputeReason::EntityRegistered);
        drop(tanks);
        info!(tank_id = %id, sequence, "Registered tank");
        Ok(sequence)
    }

    /// Registers or replaces a tower definition.
    pub fn register_tower(&self, tower: Tower) -> u64 {
        let id: TowerId = tower.id;
        let mut towers = write(&self.ledger.towers);
        towers.insert(id, tower);
        let sequence: u64 = self
            .trigger
            .notify(EntityRef::Tower(id), RecomputeReason::EntityRegistered);
        drop(towers);
        info!(tower_id = %id, sequence, "Registered tower");
        sequence
    }

    /// Executes a command on behalf of `actor`.
    ///
    /// On success the change is committed, one audit event is recorded and
    /// one recompute event is published, in that order, while the affected
    /// record is still locked. A command that changes nothing records and
    /// publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is rejected; nothing is changed.
    pub fn execute(
        &self,
        command: Command,
        actor: Actor,
        cause: Cause,
    ) -> Result<CommandOutcome, CoreError> {
        let now: OffsetDateTime = self.clock.now();
        let reason: RecomputeReason = reason_for(&command);
        let name: &'static str = command.name();
        debug!(command = name, actor = %actor.id, "Executing command");

        let outcome = match command.route() {
            Routed::Operation(command @ OperationCommand::Create { .. }) => {
                self.create_operation(command, actor, cause, now, reason)
            }
            Routed::Operation(command) => self.change_operation(command, actor, cause, now, reason),
            Routed::RefiningRun(command) => {
                self.change_refining_run(command, actor, cause, now, reason)
            }
        };

        match &outcome {
            Ok(done) => info!(
                command = name,
                event_id = ?done.audit_event.as_ref().and_then(|e| e.event_id),
                sequence = ?done.sequence,
                "Command accepted"
            ),
            Err(err) => warn!(command = name, error = %err, "Command rejected"),
        }
        outcome
    }

    fn create_operation(
        &self,
        command: OperationCommand,
        actor: Actor,
        cause: Cause,
        now: OffsetDateTime,
        reason: RecomputeReason,
    ) -> Result<CommandOutcome, CoreError> {
        let mut operations = write(&self.ledger.operations);
        let existing: Option<Operation> = operations
            .get(&command.operation_id())
            .map(|slot| lock(slot).clone());

        let result: TransitionResult = apply(existing.as_ref(), command, actor, cause, now)?;
        self.ensure_tank(result.new_state.tank_reference())?;

        let operation: Operation = result.new_state;
        operations.insert(operation.id(), Arc::new(Mutex::new(operation.clone())));
        let audit_event: AuditEvent = self.ledger.record_audit(result.audit_event);
        let affected: Vec<EntityRef> = touched_by(&[&operation]);
        let sequence: Option<u64> = self.trigger.notify_all(&affected, reason);
        drop(operations);

        Ok(CommandOutcome {
            record: Record::Operation(operation),
            audit_event: Some(audit_event),
            affected,
            sequence,
        })
    }

    fn change_operation(
        &self,
        command: OperationCommand,
        actor: Actor,
        cause: Cause,
        now: OffsetDateTime,
        reason: RecomputeReason,
    ) -> Result<CommandOutcome, CoreError> {
        let id: OperationId = command.operation_id();
        let slot: OperationSlot = self
            .ledger
            .operation_slot(id)
            .ok_or(CoreError::OperationNotFound(id))?;
        let mut current = lock(&slot);

        let result: TransitionResult = apply(Some(&*current), command, actor, cause, now)?;
        if !result.changed {
            debug!(operation_id = %id, "Command left operation unchanged");
            return Ok(CommandOutcome {
                record: Record::Operation(result.new_state),
                audit_event: None,
                affected: Vec::new(),
                sequence: None,
            });
        }
        self.ensure_tank(result.new_state.tank_reference())?;

        // A reassigned tank invalidates both the old and the new one.
        let affected: Vec<EntityRef> = touched_by(&[&*current, &result.new_state]);
        *current = result.new_state.clone();
        let audit_event: AuditEvent = self.ledger.record_audit(result.audit_event);
        let sequence: Option<u64> = self.trigger.notify_all(&affected, reason);
        drop(current);

        Ok(CommandOutcome {
            record: Record::Operation(result.new_state),
            audit_event: Some(audit_event),
            affected,
            sequence,
        })
    }

    fn change_refining_run(
        &self,
        command: RunCommand,
        actor: Actor,
        cause: Cause,
        now: OffsetDateTime,
        reason: RecomputeReason,
    ) -> Result<CommandOutcome, CoreError> {
        if let Some(run) = command.run() {
            if self.ledger.tower(run.tower_reference).is_none() {
                return Err(CoreError::TowerNotFound(run.tower_reference));
            }
            for tank in run.touched_tanks() {
                self.ensure_tank(Some(tank))?;
            }
        }

        let mut runs = write(&self.ledger.refining_runs);
        let existing: Option<RefiningRun> = runs.get(&command.run_id()).cloned();
        let recorded: RunRecorded =
            apply_refining_run(existing.as_ref(), command, actor, cause, now)?;
        if !recorded.changed {
            debug!(run_id = %recorded.run.id, "Command left refining run unchanged");
            return Ok(CommandOutcome {
                record: Record::RefiningRun(recorded.run),
                audit_event: None,
                affected: Vec::new(),
                sequence: None,
            });
        }

        let run: RefiningRun = recorded.run;
        // A corrected run invalidates what the old version touched as well.
        let affected: Vec<EntityRef> = touched_by_runs(&[existing.as_ref(), Some(&run)]);
        runs.insert(run.id, run.clone());
        let audit_event: AuditEvent = self.ledger.record_audit(recorded.audit_event);
        let sequence: Option<u64> = self.trigger.notify_all(&affected, reason);
        drop(runs);

        Ok(CommandOutcome {
            record: Record::RefiningRun(run),
            audit_event: Some(audit_event),
            affected,
            sequence,
        })
    }

    fn ensure_tank(&self, tank: Option<TankId>) -> Result<(), CoreError> {
        match tank {
            Some(id) if self.ledger.tank(id).is_none() => Err(CoreError::TankNotFound(id)),
            _ => Ok(()),
        }
    }

    /// Returns the operation with `id`, if any.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<Operation> {
        self.ledger.operation(id)
    }

    /// Every operation, ordered by identifier.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.ledger.operations()
    }

    /// Every refining run, ordered by identifier.
    #[must_use]
    pub fn refining_runs(&self) -> Vec<RefiningRun> {
        self.ledger.refining_runs()
    }

    #[must_use]
    pub fn tank(&self, id: TankId) -> Option<Tank> {
        self.ledger.tank(id)
    }

    #[must_use]
    pub fn tanks(&self) -> Vec<Tank> {
        self.ledger.tanks()
    }

    #[must_use]
    pub fn tower(&self, id: TowerId) -> Option<Tower> {
        self.ledger.tower(id)
    }

    #[must_use]
    pub fn towers(&self) -> Vec<Tower> {
        self.ledger.towers()
    }

    /// Copies every record out of the ledger.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            tanks: self.tanks(),
            towers: self.towers(),
            operations: self.operations(),
            refining_runs: self.refining_runs(),
        }
    }

    /// The full audit trail in recording order.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEvent> {
        self.ledger.audit_log()
    }

    /// The audit trail of one record.
    #[must_use]
    pub fn audit_for(&self, subject: AuditSubject) -> Vec<AuditEvent> {
        self.ledger
            .audit_log()
            .into_iter()
            .filter(|event| event.subject == subject)
            .collect()
    }

    /// Current estimate for one tank.
    ///
    /// # Errors
    ///
    /// Returns an error if the tank is not registered.
    pub fn tank_estimate(&self, id: TankId) -> Result<TankEstimate, CoreError> {
        let tank: Tank = self.tank(id).ok_or(CoreError::TankNotFound(id))?;
        Ok(tank_estimate(
            &tank,
            &self.operations(),
            &self.refining_runs(),
            self.now(),
        ))
    }

    /// Estimates for every active tank.
    #[must_use]
    pub fn tank_estimates(&self) -> Vec<TankEstimate> {
        let operations: Vec<Operation> = self.operations();
        let runs: Vec<RefiningRun> = self.refining_runs();
        let now: OffsetDateTime = self.now();
        self.tanks()
            .iter()
            .filter(|tank| tank.active)
            .map(|tank| tank_estimate(tank, &operations, &runs, now))
            .collect()
    }

    /// Current per-section throughput of one tower.
    ///
    /// # Errors
    ///
    /// Returns an error if the tower is not registered.
    pub fn tower_throughput(&self, id: TowerId) -> Result<Vec<SectionEstimate>, CoreError> {
        let tower: Tower = self.tower(id).ok_or(CoreError::TowerNotFound(id))?;
        Ok(estimated_tower_throughput(
            &tower,
            &self.refining_runs(),
            self.now(),
        ))
    }

    /// Workflow position, next steps, and editable fields of one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation does not exist.
    pub fn workflow(&self, id: OperationId) -> Result<WorkflowView, CoreError> {
        let operation: Operation = self.operation(id).ok_or(CoreError::OperationNotFound(id))?;
        let kind: OperationKind = operation.kind();
        let status: OperationStatus = operation.status();

        Ok(WorkflowView {
            operation_id: id,
            kind,
            status,
            next_states: next_states(kind, status)
                .into_iter()
                .map(|state| NextState {
                    state,
                    missing_fields: missing_fields(&operation, state),
                })
                .collect(),
            editable_fields: editable_fields(kind, status),
            steps: workflow_steps(kind, status),
        })
    }
}

const fn reason_for(command: &Command) -> RecomputeReason {
    match command {
        Command::CreateOperation { operation } => RecomputeReason::OperationCreated {
            operation_id: operation.id(),
        },
        Command::Transition {
            operation_id,
            target,
            ..
        } => RecomputeReason::OperationTransitioned {
            operation_id: *operation_id,
            target: *target,
        },
        Command::SetOperationActive {
            operation_id,
            active,
        } => RecomputeReason::OperationActivityChanged {
            operation_id: *operation_id,
            active: *active,
        },
        Command::RecordRefiningRun { run } => RecomputeReason::RefiningRunRecorded { run_id: run.id },
        Command::UpdateRefiningRun { run } => RecomputeReason::RefiningRunUpdated { run_id: run.id },
        Command::SetRefiningRunActive { run_id, active } => {
            RecomputeReason::RefiningRunActivityChanged {
                run_id: *run_id,
                active: *active,
            }
        }
    }
}

fn touched_by(operations: &[&Operation]) -> Vec<EntityRef> {
    let mut entities: Vec<EntityRef> = operations
        .iter()
        .filter_map(|operation| operation.tank_reference())
        .map(EntityRef::Tank)
        .collect();
    entities.sort_unstable();
    entities.dedup();
    entities
}

fn touched_by_runs(runs: &[Option<&RefiningRun>]) -> Vec<EntityRef> {
    let mut entities: Vec<EntityRef> = Vec::new();
    for run in runs.iter().flatten() {
        entities.extend(run.touched_tanks().into_iter().map(EntityRef::Tank));
        entities.push(EntityRef::Tower(run.tower_reference));
    }
    entities.sort_unstable();
    entities.dedup();
    entities
}
