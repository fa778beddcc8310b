// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{
    Clock, Command, CommandOutcome, Engine, FixedClock, RecomputationTrigger,
};
use crudeline_audit::{Actor, Cause};
use crudeline_domain::{
    ContractReference, DistillationSection, LineId, LoadState, Operation, OperationEdits,
    OperationId, OperationKind, ProductId, SectionId, Tank, TankId, Tower, TowerId,
    TransportState, WorkflowState,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime, macros::datetime};

pub const T0: OffsetDateTime = datetime!(2026-03-02 08:00 UTC);

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("op-12"), String::from("operator"))
}

pub fn create_test_cause() -> Cause {
    Cause::new(String::from("req-456"), String::from("Operator request"))
}

pub fn create_test_tank(id: i64, capacity: f64) -> Tank {
    Tank {
        id: TankId(id),
        name: format!("TK-{id}"),
        capacity,
        product_reference: ProductId(id),
        is_raw_material_storage: id == 1,
        active: true,
    }
}

pub fn create_test_tower(id: i64) -> Tower {
    Tower::new(
        TowerId(id),
        "T-101",
        vec![
            DistillationSection {
                id: SectionId(1),
                order: 1,
                product_reference: ProductId(2),
                operational: true,
            },
            DistillationSection {
                id: SectionId(2),
                order: 2,
                product_reference: ProductId(3),
                operational: true,
            },
        ],
    )
}

pub fn create_test_operation(id: i64, kind: OperationKind) -> Operation {
    Operation::new(OperationId(id), kind, ContractReference::new(10, 100))
}

/// An engine at `T0` with a feed tank 1, product tanks 2 and 3, and tower 1.
pub fn create_test_engine() -> (Arc<Engine>, Arc<FixedClock>) {
    let clock: Arc<FixedClock> = Arc::new(FixedClock::new(T0));
    let engine: Engine = Engine::new(
        Arc::clone(&clock) as Arc<dyn Clock>,
        RecomputationTrigger::new(64),
    );
    engine.register_tank(create_test_tank(1, 5000.0)).unwrap();
    engine.register_tank(create_test_tank(2, 2000.0)).unwrap();
    engine.register_tank(create_test_tank(3, 2000.0)).unwrap();
    engine.register_tower(create_test_tower(1));
    (Arc::new(engine), clock)
}

pub fn execute(engine: &Engine, command: Command) -> CommandOutcome {
    let name: &str = command.name();
    engine
        .execute(command, create_test_actor(), create_test_cause())
        .unwrap_or_else(|err| panic!("{name} rejected: {err}"))
}

pub fn transition(id: i64, target: WorkflowState, edits: OperationEdits) -> Command {
    Command::Transition {
        operation_id: OperationId(id),
        target,
        edits,
    }
}

pub fn transport(state: TransportState) -> WorkflowState {
    WorkflowState::Transport(state)
}

pub fn load(state: LoadState) -> WorkflowState {
    WorkflowState::Load(state)
}

/// Creates reception `id` and walks it to `AtFacility`/`InProgress`.
pub fn start_pumping_reception(
    engine: &Engine,
    id: i64,
    tank: i64,
    quantity: f64,
    start: OffsetDateTime,
    end: OffsetDateTime,
) {
    execute(
        engine,
        Command::CreateOperation {
            operation: create_test_operation(id, OperationKind::Reception),
        },
    );
    execute(
        engine,
        transition(
            id,
            transport(TransportState::InTransit),
            OperationEdits::new()
                .plate_number("ABC-123")
                .guide_id("G-1")
                .sent_quantity(quantity),
        ),
    );
    execute(
        engine,
        transition(
            id,
            transport(TransportState::AtFacility),
            OperationEdits::new()
                .tank_reference(TankId(tank))
                .line_reference(LineId(1)),
        ),
    );
    execute(
        engine,
        transition(id, load(LoadState::SamplingApproved), OperationEdits::new()),
    );
    execute(
        engine,
        transition(
            id,
            load(LoadState::InProgress),
            OperationEdits::new().window(start, end),
        ),
    );
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
