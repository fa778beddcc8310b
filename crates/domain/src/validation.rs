// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use crate::states::OperationStatus;
use crate::types::{Operation, OperationEdits, RefiningRun, Tank};

/// Tolerance for output shares that should add up to at most 100 %.
const PERCENTAGE_TOLERANCE: f64 = 1e-6;

/// Validates an operation record supplied for creation.
///
/// # Errors
///
/// Returns an error if:
/// - The operation is not in the initial workflow state
/// - A received quantity is already recorded
/// - The contract reference is unassigned
/// - The sent quantity is negative or not finite
pub fn validate_new_operation(operation: &Operation) -> Result<(), DomainError> {
    if operation.status() != OperationStatus::INITIAL || operation.received_quantity().is_some() {
        return Err(DomainError::OperationNotInitial {
            operation_id: operation.id(),
            status: operation.status().to_string(),
        });
    }

    if !operation.contract_reference().is_assigned() {
        return Err(DomainError::InvalidContractReference {
            operation_id: operation.id(),
        });
    }

    validate_quantity("sent_quantity", operation.sent_quantity())
}

/// Validates field values staged against an existing operation.
///
/// Only the supplied values are checked, except for the pumping window which
/// is checked as it would stand after the edits.
///
/// # Errors
///
/// Returns an error if:
/// - A staged quantity is negative or not finite
/// - A staged contract reference is unassigned
/// - The resulting window ends before it starts
pub fn validate_edits(operation: &Operation, edits: &OperationEdits) -> Result<(), DomainError> {
    if let Some(quantity) = edits.sent_quantity {
        validate_quantity("sent_quantity", quantity)?;
    }
    if let Some(quantity) = edits.received_quantity {
        validate_quantity("received_quantity", quantity)?;
    }

    if edits
        .contract_reference
        .is_some_and(|contract| !contract.is_assigned())
    {
        return Err(DomainError::InvalidContractReference {
            operation_id: operation.id(),
        });
    }

    let start = edits.start_timestamp.or(operation.start_timestamp());
    let end = edits.end_timestamp.or(operation.end_timestamp());
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        return Err(DomainError::InvalidOperationWindow {
            operation_id: operation.id(),
        });
    }

    Ok(())
}

/// Validates a tank definition.
///
/// # Errors
///
/// Returns an error if the capacity is negative or not finite.
pub fn validate_tank(tank: &Tank) -> Result<(), DomainError> {
    if !tank.capacity.is_finite() || tank.capacity < 0.0 {
        return Err(DomainError::InvalidCapacity { tank_id: tank.id });
    }
    Ok(())
}

/// Validates a refining run before it is recorded.
///
/// # Errors
///
/// Returns an error if:
/// - The total quantity is negative or not finite
/// - The run ends before it starts
/// - Any output share is outside `(0, 100]`
/// - The output shares add up to more than 100 %
pub fn validate_refining_run(run: &RefiningRun) -> Result<(), DomainError> {
    validate_quantity("total_quantity", run.total_quantity)?;

    if run.end_timestamp < run.start_timestamp {
        return Err(DomainError::InvalidRunWindow { run_id: run.id });
    }

    let mut total_share: f64 = 0.0;
    for output in &run.outputs {
        if !output.percentage.is_finite() || output.percentage <= 0.0 || output.percentage > 100.0
        {
            return Err(DomainError::InvalidPercentage {
                run_id: run.id,
                reason: format!(
                    "output for product {} has share {}",
                    output.product_reference, output.percentage
                ),
            });
        }
        total_share += output.percentage;
    }

    if total_share > 100.0 + PERCENTAGE_TOLERANCE {
        return Err(DomainError::InvalidPercentage {
            run_id: run.id,
            reason: format!("output shares add up to {total_share}"),
        });
    }

    Ok(())
}

fn validate_quantity(field: &'static str, value: f64) -> Result<(), DomainError> {
    if !value.is_finite() {
        return Err(DomainError::InvalidQuantity {
            field,
            reason: String::from("must be a finite number"),
        });
    }
    if value < 0.0 {
        return Err(DomainError::InvalidQuantity {
            field,
            reason: format!("must not be negative, got {value}"),
        });
    }
    Ok(())
}
