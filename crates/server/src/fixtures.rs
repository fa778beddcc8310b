// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Plant topology and seed records loaded at startup.
//!
//! A fixture file is a JSON object with optional `tanks`, `towers`,
//! `operations`, `transitions`, and `refining_runs` arrays. Tanks and towers
//! are registered first, then operations are created, transitions are replayed
//! in file order, and refining runs are recorded last. Every seeded change goes
//! through the engine and is audited under the fixture actor.

use crudeline::{Command, CoreError, Engine};
use crudeline_audit::{Actor, Cause};
use crudeline_domain::{
    DomainError, Operation, OperationEdits, OperationId, RefiningRun, Tank, Tower, WorkflowState,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading a fixture file.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid transition target for operation {operation_id}: {source}")]
    Target {
        operation_id: OperationId,
        #[source]
        source: DomainError,
    },

    #[error("Fixture rejected: {0}")]
    Rejected(#[from] CoreError),
}

/// A transition replayed against a seeded operation.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTransition {
    pub operation_id: OperationId,
    /// `transport:<state>` or `load:<state>`.
    pub target: String,
    #[serde(default)]
    pub edits: OperationEdits,
}

/// The contents of a fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub tanks: Vec<Tank>,
    pub towers: Vec<Tower>,
    pub operations: Vec<Operation>,
    pub transitions: Vec<FixtureTransition>,
    pub refining_runs: Vec<RefiningRun>,
}

/// How many records of each kind a fixture seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureSummary {
    pub tanks: usize,
    pub towers: usize,
    pub operations: usize,
    pub transitions: usize,
    pub refining_runs: usize,
}

impl Fixtures {
    /// Reads and parses a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid fixture JSON.
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let json: String = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parses fixture JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a fixture.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Seeds `engine` with every record, stopping at the first rejection.
    ///
    /// # Errors
    ///
    /// Returns an error if a transition target does not parse or the engine
    /// rejects any record.
    pub fn apply(self, engine: &Engine) -> Result<FixtureSummary, FixtureError> {
        let actor: Actor = Actor::new(String::from("fixtures"), String::from("fixture"));
        let cause: Cause = Cause::new(
            String::from("fixtures"),
            String::from("Seeded from fixture file"),
        );
        let mut summary: FixtureSummary = FixtureSummary::default();

        for tank in self.tanks {
            debug!(tank_id = %tank.id, "Registering fixture tank");
            engine.register_tank(tank)?;
            summary.tanks += 1;
        }

        for tower in self.towers {
            debug!(tower_id = %tower.id, "Registering fixture tower");
            engine.register_tower(tower);
            summary.towers += 1;
        }

        for operation in self.operations {
            engine.execute(
                Command::CreateOperation { operation },
                actor.clone(),
                cause.clone(),
            )?;
            summary.operations += 1;
        }

        for transition in self.transitions {
            let target: WorkflowState = transition.target.parse().map_err(|source| {
                FixtureError::Target {
                    operation_id: transition.operation_id,
                    source,
                }
            })?;
            engine.execute(
                Command::Transition {
                    operation_id: transition.operation_id,
                    target,
                    edits: transition.edits,
                },
                actor.clone(),
                cause.clone(),
            )?;
            summary.transitions += 1;
        }

        for run in self.refining_runs {
            engine.execute(
                Command::RecordRefiningRun { run },
                actor.clone(),
                cause.clone(),
            )?;
            summary.refining_runs += 1;
        }

        info!(
            tanks = summary.tanks,
            towers = summary.towers,
            operations = summary.operations,
            transitions = summary.transitions,
            refining_runs = summary.refining_runs,
            "Fixtures loaded"
        );

        Ok(summary)
    }
}
