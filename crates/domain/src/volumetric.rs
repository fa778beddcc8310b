// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Time-weighted volumetric accounting.
//!
//! Tank and tower figures are **computed**, never stored. Each is a pure
//! function of the operation ledger, the refining runs, and the injected
//! current time.
//!
//! ## Time weighting
//!
//! Every contributor with a `[start, end]` window and a quantity `q`
//! contributes:
//!
//! - `0` when `now < start`
//! - `q` when `now >= end`
//! - `q * (now - start) / (end - start)` otherwise
//!
//! A zero-length (or inverted) window contributes fully as soon as
//! `now >= start`. Nothing in this module can fail or produce NaN from
//! well-formed timestamps; degenerate inputs resolve to `0` or to the full
//! quantity.

use crate::states::LoadState;
use crate::types::{
    DistillationSection, Operation, ProductId, RefiningRun, SectionId, Tank, TankId, Tower,
};
use serde::Serialize;
use time::OffsetDateTime;

/// Fraction of a window elapsed at `now`, in `[0, 1]`.
#[must_use]
pub fn time_fraction(start: OffsetDateTime, end: OffsetDateTime, now: OffsetDateTime) -> f64 {
    if now < start {
        return 0.0;
    }
    if now >= end {
        return 1.0;
    }
    let window: f64 = (end - start).as_seconds_f64();
    let elapsed: f64 = (now - start).as_seconds_f64();
    let fraction: f64 = elapsed / window;
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Signed barrels an operation has moved into (+) or out of (−) `tank` by `now`.
///
/// - inactive or other-tank operations contribute nothing
/// - a finished load contributes its full transferred quantity, also after
///   the operation is cancelled
/// - a load in progress is time-weighted over its window; without both
///   timestamps it contributes nothing
/// - loads that have not started contribute nothing
#[must_use]
pub fn operation_contribution(operation: &Operation, tank: TankId, now: OffsetDateTime) -> f64 {
    if !operation.is_active() || operation.tank_reference() != Some(tank) {
        return 0.0;
    }

    let quantity: f64 = finite_or_zero(operation.transferred_quantity());
    let fraction: f64 = match operation.status().load {
        LoadState::Finished => 1.0,
        LoadState::InProgress => match (operation.start_timestamp(), operation.end_timestamp()) {
            (Some(start), Some(end)) => time_fraction(start, end, now),
            _ => 0.0,
        },
        LoadState::PendingSampling | LoadState::SamplingApproved => 0.0,
    };

    operation.kind().tank_sign() * quantity * fraction
}

/// Signed barrels a refining run has moved into (+) or out of (−) `tank` by `now`.
///
/// The feed tank loses `total * f`; each output tank gains
/// `total * percentage / 100 * f`. A tank that is both feed and output
/// receives both terms.
#[must_use]
pub fn refining_run_contribution(run: &RefiningRun, tank: TankId, now: OffsetDateTime) -> f64 {
    if !run.active {
        return 0.0;
    }

    let fraction: f64 = time_fraction(run.start_timestamp, run.end_timestamp, now);
    let total: f64 = finite_or_zero(run.total_quantity);

    let consumed: f64 = if run.tank_reference == tank {
        total * fraction
    } else {
        0.0
    };

    let produced: f64 = run
        .outputs
        .iter()
        .filter(|output| output.tank_reference == tank)
        .map(|output| total * share(output.percentage) * fraction)
        .sum();

    produced - consumed
}

/// Current best estimate of barrels held in `tank`.
///
/// The sum of every reception and dispatch touching the tank plus every
/// refining run feeding from or producing into it, each time-weighted.
#[must_use]
pub fn estimated_tank_level(
    tank: &Tank,
    operations: &[Operation],
    refining_runs: &[RefiningRun],
    now: OffsetDateTime,
) -> f64 {
    let from_operations: f64 = operations
        .iter()
        .map(|operation| operation_contribution(operation, tank.id, now))
        .sum();
    let from_runs: f64 = refining_runs
        .iter()
        .map(|run| refining_run_contribution(run, tank.id, now))
        .sum();
    from_operations + from_runs
}

/// Level percentage of capacity; `0` for a tank with no usable capacity.
#[must_use]
pub fn fill_percentage(level: f64, capacity: f64) -> f64 {
    if capacity.is_finite() && capacity > 0.0 && level.is_finite() {
        level / capacity * 100.0
    } else {
        0.0
    }
}

/// A tank's derived figures at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankEstimate {
    pub tank_id: TankId,
    /// Estimated barrels in the tank.
    pub level: f64,
    pub capacity: f64,
    /// `level / capacity * 100`, or `0` when capacity is `0`.
    pub fill_percentage: f64,
    /// Remaining room, never negative.
    pub free_space: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
}

/// Computes every derived figure for `tank` at `now`.
#[must_use]
pub fn tank_estimate(
    tank: &Tank,
    operations: &[Operation],
    refining_runs: &[RefiningRun],
    now: OffsetDateTime,
) -> TankEstimate {
    let level: f64 = estimated_tank_level(tank, operations, refining_runs, now);
    let capacity: f64 = finite_or_zero(tank.capacity);
    TankEstimate {
        tank_id: tank.id,
        level,
        capacity,
        fill_percentage: fill_percentage(level, capacity),
        free_space: (capacity - level).max(0.0),
        computed_at: now,
    }
}

/// Planned and time-weighted throughput of one tower section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEstimate {
    pub section_id: SectionId,
    pub product_reference: ProductId,
    pub operational: bool,
    /// `Σ total * percentage` over the tower's runs, ignoring time.
    pub expected_total: f64,
    /// The same sum with each run's time fraction applied.
    pub time_weighted_actual: f64,
}

impl SectionEstimate {
    /// Planned minus actual; positive while a run is behind its plan.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.expected_total - self.time_weighted_actual
    }
}

/// Throughput per material section of `tower`, in section order.
///
/// Runs bound to other towers and inactive runs are ignored. A section whose
/// product none of the runs produce reports zeros.
#[must_use]
pub fn estimated_tower_throughput(
    tower: &Tower,
    refining_runs: &[RefiningRun],
    now: OffsetDateTime,
) -> Vec<SectionEstimate> {
    let runs: Vec<&RefiningRun> = refining_runs
        .iter()
        .filter(|run| run.active && run.tower_reference == tower.id)
        .collect();

    let mut sections: Vec<&DistillationSection> = tower.sections.iter().collect();
    sections.sort_by_key(|section| section.order);

    sections
        .into_iter()
        .map(|section| {
            let mut expected_total: f64 = 0.0;
            let mut time_weighted_actual: f64 = 0.0;
            for run in &runs {
                let total: f64 = finite_or_zero(run.total_quantity);
                let fraction: f64 = time_fraction(run.start_timestamp, run.end_timestamp, now);
                for output in run
                    .outputs
                    .iter()
                    .filter(|output| output.product_reference == section.product_reference)
                {
                    let planned: f64 = total * share(output.percentage);
                    expected_total += planned;
                    time_weighted_actual = planned.mul_add(fraction, time_weighted_actual);
                }
            }
            SectionEstimate {
                section_id: section.id,
                product_reference: section.product_reference,
                operational: section.operational,
                expected_total,
                time_weighted_actual,
            }
        })
        .collect()
}

fn share(percentage: f64) -> f64 {
    finite_or_zero(percentage) / 100.0
}

const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
