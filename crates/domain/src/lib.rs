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

mod error;
mod fields;
mod rules;
mod states;
mod transition;
mod types;
mod validation;
mod volumetric;
mod workflow;

#[cfg(test)]
mod tests;

pub use error::{DomainError, TransitionError};
pub use fields::FieldName;
pub use rules::{
    is_field_editable, required_fields_for_transition, state_blockers, state_prerequisites,
    valid_transitions,
};
pub use states::{LoadState, OperationKind, OperationStatus, TransportState, WorkflowState};
pub use transition::{attempt_transition, missing_fields};
pub use types::{
    ContractReference, DistillationSection, LineId, Operation, OperationEdits, OperationId,
    ProductId, RefiningRun, RefiningRunId, RunOutput, SectionId, Tank, TankId, Tower, TowerId,
};
pub use validation::{
    validate_edits, validate_new_operation, validate_refining_run, validate_tank,
};
pub use volumetric::{
    SectionEstimate, TankEstimate, estimated_tank_level, estimated_tower_throughput,
    fill_percentage, operation_contribution, refining_run_contribution, tank_estimate,
    time_fraction,
};
pub use workflow::{
    StepProgress, WorkflowStep, editable_fields, next_states, transport_path, workflow_steps,
};
