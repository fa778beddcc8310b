// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Workflow state definitions for receptions and dispatches.
//!
//! Every operation carries two state dimensions:
//!
//! - the outer transport state (where the truck is in its trip), and
//! - the inner load state (the physical sampling and pumping sub-process).
//!
//! Which moves between states are legal lives in [`crate::rules`], not here.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction of a truck operation relative to the refinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Crude or product arriving into a tank.
    Reception,
    /// Product leaving a tank to fulfil a sales contract.
    Dispatch,
}

impl OperationKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reception => "reception",
            Self::Dispatch => "dispatch",
        }
    }

    /// Sign applied to the transferred quantity when accounting for the tank.
    #[must_use]
    pub const fn tank_sign(&self) -> f64 {
        match self {
            Self::Reception => 1.0,
            Self::Dispatch => -1.0,
        }
    }
}

impl FromStr for OperationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reception" => Ok(Self::Reception),
            "dispatch" => Ok(Self::Dispatch),
            _ => Err(DomainError::InvalidOperationKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outer lifecycle stage of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Scheduled against a contract, truck not yet moving.
    #[default]
    Programmed,
    /// Truck on the road (inbound for receptions, outbound for dispatches).
    InTransit,
    /// Truck inside the facility, attached to a transfer line.
    AtFacility,
    /// Operation closed with a measured quantity.
    Completed,
    /// Operation abandoned before completion.
    Cancelled,
}

impl TransportState {
    /// All transport states in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Programmed,
        Self::InTransit,
        Self::AtFacility,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Programmed => "programmed",
            Self::InTransit => "in_transit",
            Self::AtFacility => "at_facility",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true if no further transport transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl FromStr for TransportState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "programmed" => Ok(Self::Programmed),
            "in_transit" => Ok(Self::InTransit),
            "at_facility" => Ok(Self::AtFacility),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvalidTransportState(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inner lifecycle stage: sampling and pumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Waiting for the quality sample to be drawn and analysed.
    #[default]
    PendingSampling,
    /// Sample accepted, transfer may start.
    SamplingApproved,
    /// Product is being pumped.
    InProgress,
    /// Pumping finished and the quantity has been measured.
    Finished,
}

impl LoadState {
    /// All load states in declaration order.
    pub const ALL: [Self; 4] = [
        Self::PendingSampling,
        Self::SamplingApproved,
        Self::InProgress,
        Self::Finished,
    ];

    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingSampling => "pending_sampling",
            Self::SamplingApproved => "sampling_approved",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }
}

impl FromStr for LoadState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_sampling" => Ok(Self::PendingSampling),
            "sampling_approved" => Ok(Self::SamplingApproved),
            "in_progress" => Ok(Self::InProgress),
            "finished" => Ok(Self::Finished),
            _ => Err(DomainError::InvalidLoadState(s.to_string())),
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state in either workflow dimension.
///
/// Transition targets are expressed with this type so that a single
/// `attempt_transition` entry point covers both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// A transport state.
    Transport(TransportState),
    /// A load state.
    Load(LoadState),
}

impl WorkflowState {
    /// Returns true if both states belong to the same dimension.
    #[must_use]
    pub const fn same_dimension(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Transport(_), Self::Transport(_)) | (Self::Load(_), Self::Load(_))
        )
    }

    /// Returns the dimension label used in string forms.
    #[must_use]
    pub const fn dimension(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Load(_) => "load",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(state) => write!(f, "transport:{state}"),
            Self::Load(state) => write!(f, "load:{state}"),
        }
    }
}

impl FromStr for WorkflowState {
    type Err = DomainError;

    /// Parses `transport:<state>` or `load:<state>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("transport", state)) => Ok(Self::Transport(state.parse()?)),
            Some(("load", state)) => Ok(Self::Load(state.parse()?)),
            _ => Err(DomainError::InvalidWorkflowState(s.to_string())),
        }
    }
}

/// The combined position of an operation in both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct OperationStatus {
    /// Outer transport state.
    pub transport: TransportState,
    /// Inner load state.
    pub load: LoadState,
}

impl OperationStatus {
    /// The state every new operation starts in.
    pub const INITIAL: Self = Self {
        transport: TransportState::Programmed,
        load: LoadState::PendingSampling,
    };

    /// Creates a status from both dimensions.
    #[must_use]
    pub const fn new(transport: TransportState, load: LoadState) -> Self {
        Self { transport, load }
    }

    /// Returns the current state in the dimension of `target`.
    #[must_use]
    pub const fn current_for(&self, target: WorkflowState) -> WorkflowState {
        match target {
            WorkflowState::Transport(_) => WorkflowState::Transport(self.transport),
            WorkflowState::Load(_) => WorkflowState::Load(self.load),
        }
    }

    /// Returns true if `state` is the current state in its dimension.
    #[must_use]
    pub fn is_in(&self, state: WorkflowState) -> bool {
        self.current_for(state) == state
    }

    /// Returns a copy with `target` applied to its dimension.
    #[must_use]
    pub const fn with_state(self, target: WorkflowState) -> Self {
        match target {
            WorkflowState::Transport(transport) => Self {
                transport,
                load: self.load,
            },
            WorkflowState::Load(load) => Self {
                transport: self.transport,
                load,
            },
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.transport, self.load)
    }
}
