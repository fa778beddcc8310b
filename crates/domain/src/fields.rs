// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Names of the operation fields that workflow rules refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// Contract and line item being fulfilled.
    ContractReference,
    /// Loading/unloading arm.
    LineReference,
    /// Destination (reception) or source (dispatch) tank.
    TankReference,
    /// Quantity declared on the guide, or loaded for dispatches.
    SentQuantity,
    /// Measured quantity at destination.
    ReceivedQuantity,
    /// Start of physical transfer.
    StartTimestamp,
    /// End of physical transfer.
    EndTimestamp,
    /// Driver name and identification.
    DriverInfo,
    /// Truck plate.
    PlateNumber,
    /// Transport guide number.
    GuideId,
}

impl FieldName {
    /// All fields in declaration order.
    pub const ALL: [Self; 10] = [
        Self::ContractReference,
        Self::LineReference,
        Self::TankReference,
        Self::SentQuantity,
        Self::ReceivedQuantity,
        Self::StartTimestamp,
        Self::EndTimestamp,
        Self::DriverInfo,
        Self::PlateNumber,
        Self::GuideId,
    ];

    /// Returns the string representation of the field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContractReference => "contract_reference",
            Self::LineReference => "line_reference",
            Self::TankReference => "tank_reference",
            Self::SentQuantity => "sent_quantity",
            Self::ReceivedQuantity => "received_quantity",
            Self::StartTimestamp => "start_timestamp",
            Self::EndTimestamp => "end_timestamp",
            Self::DriverInfo => "driver_info",
            Self::PlateNumber => "plate_number",
            Self::GuideId => "guide_id",
        }
    }

    /// Returns true for fields that must be strictly positive to count as present.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::SentQuantity | Self::ReceivedQuantity)
    }
}

impl FromStr for FieldName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| DomainError::InvalidFieldName(s.to_string()))
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
