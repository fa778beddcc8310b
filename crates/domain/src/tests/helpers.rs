// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{
    ContractReference, LineId, LoadState, Operation, OperationEdits, OperationId, OperationKind,
    ProductId, Tank, TankId, TransportState, WorkflowState, attempt_transition,
};
use time::{Duration, OffsetDateTime, macros::datetime};

pub const T0: OffsetDateTime = datetime!(2026-03-02 08:00 UTC);

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

pub fn transport(state: TransportState) -> WorkflowState {
    WorkflowState::Transport(state)
}

pub fn load(state: LoadState) -> WorkflowState {
    WorkflowState::Load(state)
}

pub fn create_test_tank(id: i64, capacity: f64) -> Tank {
    Tank {
        id: TankId(id),
        name: format!("TK-{id}"),
        capacity,
        product_reference: ProductId(1),
        is_raw_material_storage: true,
        active: true,
    }
}

pub fn create_test_operation(id: i64, kind: OperationKind) -> Operation {
    Operation::new(OperationId(id), kind, ContractReference::new(10, 100))
}

/// Walks `operation` through `target`, panicking on rejection.
pub fn step(operation: &Operation, target: WorkflowState, edits: &OperationEdits) -> Operation {
    attempt_transition(&operation.with_edits(edits), target)
        .unwrap_or_else(|errors| panic!("transition to {target} rejected: {errors:?}"))
}

/// A reception into `tank` that is pumping `quantity` over `[start, end]`.
pub fn pumping_reception(
    id: i64,
    tank: i64,
    quantity: f64,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Operation {
    let op = create_test_operation(id, OperationKind::Reception);
    let op = step(
        &op,
        transport(TransportState::InTransit),
        &OperationEdits::new()
            .plate_number("ABC-123")
            .guide_id("G-1")
            .sent_quantity(quantity),
    );
    let op = step(
        &op,
        transport(TransportState::AtFacility),
        &OperationEdits::new()
            .tank_reference(TankId(tank))
            .line_reference(LineId(1)),
    );
    let op = step(
        &op,
        load(LoadState::SamplingApproved),
        &OperationEdits::new(),
    );
    step(
        &op,
        load(LoadState::InProgress),
        &OperationEdits::new().window(start, end),
    )
}

/// A dispatch out of `tank` that is loading `quantity` over `[start, end]`.
pub fn loading_dispatch(
    id: i64,
    tank: i64,
    quantity: f64,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Operation {
    let op = create_test_operation(id, OperationKind::Dispatch);
    let op = step(
        &op,
        transport(TransportState::AtFacility),
        &OperationEdits::new()
            .plate_number("XYZ-987")
            .tank_reference(TankId(tank))
            .line_reference(LineId(2)),
    );
    let op = step(
        &op,
        load(LoadState::SamplingApproved),
        &OperationEdits::new(),
    );
    step(
        &op,
        load(LoadState::InProgress),
        &OperationEdits::new().window(start, end).sent_quantity(quantity),
    )
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
