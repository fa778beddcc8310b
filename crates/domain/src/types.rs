// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::fields::FieldName;
use crate::states::{OperationKind, OperationStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw numeric identifier.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a reception or dispatch.
    OperationId
);
id_type!(
    /// Identifier of a storage tank.
    TankId
);
id_type!(
    /// Identifier of a distillation tower.
    TowerId
);
id_type!(
    /// Identifier of a tower section.
    SectionId
);
id_type!(
    /// Identifier of a refining run (tower charge).
    RefiningRunId
);
id_type!(
    /// Identifier of a crude or refined product.
    ProductId
);
id_type!(
    /// Identifier of a loading/unloading arm.
    LineId
);

/// The commercial contract and the line item an operation fulfils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractReference {
    /// The contract identifier.
    pub contract_id: i64,
    /// The contract line item (product and contracted quantity).
    pub line_item_id: i64,
}

impl ContractReference {
    /// Creates a new contract reference.
    #[must_use]
    pub const fn new(contract_id: i64, line_item_id: i64) -> Self {
        Self {
            contract_id,
            line_item_id,
        }
    }

    /// A reference is usable once both identifiers are assigned.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.contract_id > 0 && self.line_item_id > 0
    }
}

const fn default_active() -> bool {
    true
}

/// A tanker-truck reception or dispatch.
///
/// Fields are private: after creation an operation only changes through
/// [`crate::attempt_transition`] (optionally carrying [`OperationEdits`])
/// and the soft-delete flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    id: OperationId,
    kind: OperationKind,
    contract_reference: ContractReference,
    #[serde(default)]
    line_reference: Option<LineId>,
    #[serde(default)]
    tank_reference: Option<TankId>,
    #[serde(default)]
    sent_quantity: f64,
    #[serde(default)]
    received_quantity: Option<f64>,
    #[serde(default)]
    status: OperationStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    start_timestamp: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    end_timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    driver_info: Option<String>,
    #[serde(default)]
    plate_number: Option<String>,
    #[serde(default)]
    guide_id: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

impl Operation {
    /// Creates a new operation in the initial workflow state.
    #[must_use]
    pub const fn new(
        id: OperationId,
        kind: OperationKind,
        contract_reference: ContractReference,
    ) -> Self {
        Self {
            id,
            kind,
            contract_reference,
            line_reference: None,
            tank_reference: None,
            sent_quantity: 0.0,
            received_quantity: None,
            status: OperationStatus::INITIAL,
            start_timestamp: None,
            end_timestamp: None,
            driver_info: None,
            plate_number: None,
            guide_id: None,
            active: true,
        }
    }

    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub const fn contract_reference(&self) -> ContractReference {
        self.contract_reference
    }

    #[must_use]
    pub const fn line_reference(&self) -> Option<LineId> {
        self.line_reference
    }

    #[must_use]
    pub const fn tank_reference(&self) -> Option<TankId> {
        self.tank_reference
    }

    #[must_use]
    pub const fn sent_quantity(&self) -> f64 {
        self.sent_quantity
    }

    #[must_use]
    pub const fn received_quantity(&self) -> Option<f64> {
        self.received_quantity
    }

    #[must_use]
    pub const fn status(&self) -> OperationStatus {
        self.status
    }

    #[must_use]
    pub const fn start_timestamp(&self) -> Option<OffsetDateTime> {
        self.start_timestamp
    }

    #[must_use]
    pub const fn end_timestamp(&self) -> Option<OffsetDateTime> {
        self.end_timestamp
    }

    #[must_use]
    pub fn driver_info(&self) -> Option<&str> {
        self.driver_info.as_deref()
    }

    #[must_use]
    pub fn plate_number(&self) -> Option<&str> {
        self.plate_number.as_deref()
    }

    #[must_use]
    pub fn guide_id(&self) -> Option<&str> {
        self.guide_id.as_deref()
    }

    /// Soft-delete flag. Inactive operations are ignored by volumetric accounting.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true if `field` holds a usable value.
    ///
    /// Numeric fields must be finite and strictly greater than zero; text
    /// fields must be non-blank.
    #[must_use]
    pub fn has_field(&self, field: FieldName) -> bool {
        match field {
            FieldName::ContractReference => self.contract_reference.is_assigned(),
            FieldName::LineReference => self.line_reference.is_some(),
            FieldName::TankReference => self.tank_reference.is_some(),
            FieldName::SentQuantity => is_positive(self.sent_quantity),
            FieldName::ReceivedQuantity => self.received_quantity.is_some_and(is_positive),
            FieldName::StartTimestamp => self.start_timestamp.is_some(),
            FieldName::EndTimestamp => self.end_timestamp.is_some(),
            FieldName::DriverInfo => has_text(self.driver_info.as_deref()),
            FieldName::PlateNumber => has_text(self.plate_number.as_deref()),
            FieldName::GuideId => has_text(self.guide_id.as_deref()),
        }
    }

    /// Quantity moved in or out of the tank by this operation.
    ///
    /// Receptions prefer the measured quantity once it exists; dispatches
    /// leave the tank with the loaded (sent) quantity.
    #[must_use]
    pub fn transferred_quantity(&self) -> f64 {
        match self.kind {
            OperationKind::Reception => self
                .received_quantity
                .filter(|q| is_positive(*q))
                .unwrap_or(self.sent_quantity),
            OperationKind::Dispatch => self.sent_quantity,
        }
    }

    /// Returns a copy with every staged edit applied.
    #[must_use]
    pub fn with_edits(&self, edits: &OperationEdits) -> Self {
        let mut next: Self = self.clone();
        if let Some(contract_reference) = edits.contract_reference {
            next.contract_reference = contract_reference;
        }
        if let Some(line) = edits.line_reference {
            next.line_reference = Some(line);
        }
        if let Some(tank) = edits.tank_reference {
            next.tank_reference = Some(tank);
        }
        if let Some(quantity) = edits.sent_quantity {
            next.sent_quantity = quantity;
        }
        if let Some(quantity) = edits.received_quantity {
            next.received_quantity = Some(quantity);
        }
        if let Some(start) = edits.start_timestamp {
            next.start_timestamp = Some(start);
        }
        if let Some(end) = edits.end_timestamp {
            next.end_timestamp = Some(end);
        }
        if let Some(driver) = &edits.driver_info {
            next.driver_info = Some(driver.clone());
        }
        if let Some(plate) = &edits.plate_number {
            next.plate_number = Some(plate.clone());
        }
        if let Some(guide) = &edits.guide_id {
            next.guide_id = Some(guide.clone());
        }
        next
    }

    /// Returns a copy with the soft-delete flag set.
    #[must_use]
    pub fn with_active(&self, active: bool) -> Self {
        Self {
            active,
            ..self.clone()
        }
    }

    pub(crate) const fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// Compact description used for audit snapshots.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "operation={},kind={},status={},tank={},active={}",
            self.id,
            self.kind,
            self.status,
            self.tank_reference
                .map_or_else(|| String::from("none"), |t| t.to_string()),
            self.active
        )
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|s| !s.trim().is_empty())
}

/// Field values staged by a form and applied together with a transition.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationEdits {
    pub contract_reference: Option<ContractReference>,
    pub line_reference: Option<LineId>,
    pub tank_reference: Option<TankId>,
    pub sent_quantity: Option<f64>,
    pub received_quantity: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_timestamp: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_timestamp: Option<OffsetDateTime>,
    pub driver_info: Option<String>,
    pub plate_number: Option<String>,
    pub guide_id: Option<String>,
}

impl OperationEdits {
    /// Creates an empty set of edits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn line_reference(mut self, line: LineId) -> Self {
        self.line_reference = Some(line);
        self
    }

    #[must_use]
    pub const fn tank_reference(mut self, tank: TankId) -> Self {
        self.tank_reference = Some(tank);
        self
    }

    #[must_use]
    pub const fn sent_quantity(mut self, quantity: f64) -> Self {
        self.sent_quantity = Some(quantity);
        self
    }

    #[must_use]
    pub const fn received_quantity(mut self, quantity: f64) -> Self {
        self.received_quantity = Some(quantity);
        self
    }

    #[must_use]
    pub const fn window(mut self, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        self.start_timestamp = Some(start);
        self.end_timestamp = Some(end);
        self
    }

    #[must_use]
    pub const fn end_timestamp(mut self, end: OffsetDateTime) -> Self {
        self.end_timestamp = Some(end);
        self
    }

    #[must_use]
    pub fn plate_number(mut self, plate: &str) -> Self {
        self.plate_number = Some(plate.to_string());
        self
    }

    #[must_use]
    pub fn guide_id(mut self, guide: &str) -> Self {
        self.guide_id = Some(guide.to_string());
        self
    }

    #[must_use]
    pub fn driver_info(mut self, driver: &str) -> Self {
        self.driver_info = Some(driver.to_string());
        self
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A storage tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: TankId,
    pub name: String,
    /// Nominal capacity in barrels.
    pub capacity: f64,
    pub product_reference: ProductId,
    /// Crude feed tank (true) or finished-product tank (false).
    pub is_raw_material_storage: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// One product stream produced by a refining run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub product_reference: ProductId,
    pub tank_reference: TankId,
    /// Share of the run's total quantity, in percent.
    pub percentage: f64,
}

/// A timed tower charge consuming from one tank and producing into others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefiningRun {
    pub id: RefiningRunId,
    pub tower_reference: TowerId,
    /// Feed tank.
    pub tank_reference: TankId,
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
    pub total_quantity: f64,
    pub outputs: Vec<RunOutput>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl RefiningRun {
    /// Every tank this run reads from or writes to, feed tank first.
    #[must_use]
    pub fn touched_tanks(&self) -> Vec<TankId> {
        let mut tanks: Vec<TankId> = vec![self.tank_reference];
        for output in &self.outputs {
            if !tanks.contains(&output.tank_reference) {
                tanks.push(output.tank_reference);
            }
        }
        tanks
    }
}

/// A material section of a distillation tower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistillationSection {
    pub id: SectionId,
    /// Position of the section in the tower, top first.
    pub order: u32,
    pub product_reference: ProductId,
    pub operational: bool,
}

/// A distillation tower and its material sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tower {
    pub id: TowerId,
    pub name: String,
    pub sections: Vec<DistillationSection>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Tower {
    /// Creates a tower with its sections sorted by `order`.
    #[must_use]
    pub fn new(id: TowerId, name: &str, mut sections: Vec<DistillationSection>) -> Self {
        sections.sort_by_key(|section| section.order);
        Self {
            id,
            name: name.to_string(),
            sections,
            active: true,
        }
    }
}
