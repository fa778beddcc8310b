// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A cached view of tank levels and tower throughput kept fresh by
//! recompute notifications.

use crate::engine::Engine;
use crate::error::CoreError;
use crate::ledger::lock;
use crate::trigger::{Change, EntityRef, Subscription};
use crudeline_domain::{
    Operation, RefiningRun, SectionEstimate, Tank, TankEstimate, TankId, Tower, TowerId,
    estimated_tower_throughput, tank_estimate,
};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// The ledger records one tank's level is computed from.
#[derive(Debug, Clone)]
struct TankInputs {
    tank: Tank,
    operations: Vec<Operation>,
    refining_runs: Vec<RefiningRun>,
}

impl TankInputs {
    fn estimate(&self, now: OffsetDateTime) -> TankEstimate {
        tank_estimate(&self.tank, &self.operations, &self.refining_runs, now)
    }
}

/// The ledger records one tower's throughput is computed from.
#[derive(Debug, Clone)]
struct TowerInputs {
    tower: Tower,
    refining_runs: Vec<RefiningRun>,
}

impl TowerInputs {
    fn throughput(&self, now: OffsetDateTime) -> Vec<SectionEstimate> {
        estimated_tower_throughput(&self.tower, &self.refining_runs, now)
    }
}

#[derive(Debug, Default)]
pub struct BoardView {
    tanks: HashMap<TankId, (u64, TankInputs)>,
    towers: HashMap<TowerId, (u64, TowerInputs)>,
}

/// Throughput figures of one tower.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerThroughput {
    pub tower_id: TowerId,
    pub sections: Vec<SectionEstimate>,
}

/// Every figure held by a board, in id order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub tanks: Vec<TankEstimate>,
    pub towers: Vec<TowerThroughput>,
}

/// Stores `value` unless a value computed for a later sequence is already cached.
pub fn store_if_newer<K: Eq + Hash, V>(
    slots: &mut HashMap<K, (u64, V)>,
    key: K,
    sequence: u64,
    value: V,
) -> bool {
    if slots
        .get(&key)
        .is_some_and(|(cached, _)| *cached > sequence)
    {
        return false;
    }
    slots.insert(key, (sequence, value));
    true
}

/// Live tank and tower figures for a fixed set of entities.
///
/// The board caches the ledger records each entity depends on and keeps them
/// current through one `on_change` subscription per entity. Figures are
/// evaluated at the engine's clock on every read, so in-flight loads and runs
/// keep moving between notifications. Recomputes for an older sequence than
/// the cached one are discarded.
pub struct LevelBoard {
    engine: Arc<Engine>,
    view: Arc<Mutex<BoardView>>,
    subscriptions: Vec<Subscription>,
}

impl LevelBoard {
    /// Subscribes to `entities` and caches their current ledger records.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn attach(engine: &Arc<Engine>, entities: &[EntityRef]) -> Result<Self, CoreError> {
        let view: Arc<Mutex<BoardView>> = Arc::new(Mutex::new(BoardView::default()));
        let mut subscriptions: Vec<Subscription> = Vec::with_capacity(entities.len());

        for &entity in entities {
            let callback_engine: Arc<Engine> = Arc::clone(engine);
            let callback_view: Arc<Mutex<BoardView>> = Arc::clone(&view);
            subscriptions.push(engine.trigger().on_change(entity, move |change: Change| {
                refresh(&callback_engine, &callback_view, change.entity, change.sequence);
            })?);

            // Subscribed first, so nothing published from here on is missed.
            let sequence: u64 = engine.trigger().current_sequence();
            refresh(engine, &view, entity, sequence);
        }

        Ok(Self {
            engine: Arc::clone(engine),
            view,
            subscriptions,
        })
    }

    /// Estimate of a tank at the engine's current time.
    #[must_use]
    pub fn tank(&self, id: TankId) -> Option<TankEstimate> {
        let now: OffsetDateTime = self.engine.now();
        lock(&self.view)
            .tanks
            .get(&id)
            .map(|(_, inputs)| inputs.estimate(now))
    }

    /// Throughput of a tower at the engine's current time.
    #[must_use]
    pub fn tower(&self, id: TowerId) -> Option<Vec<SectionEstimate>> {
        let now: OffsetDateTime = self.engine.now();
        lock(&self.view)
            .towers
            .get(&id)
            .map(|(_, inputs)| inputs.throughput(now))
    }

    /// The sequence the cached records of `entity` were read at.
    #[must_use]
    pub fn sequence(&self, entity: EntityRef) -> Option<u64> {
        let view = lock(&self.view);
        match entity {
            EntityRef::Tank(id) => view.tanks.get(&id).map(|(sequence, _)| *sequence),
            EntityRef::Tower(id) => view.towers.get(&id).map(|(sequence, _)| *sequence),
        }
    }

    /// Every figure on the board at the engine's current time, in id order.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        let now: OffsetDateTime = self.engine.now();
        let view = lock(&self.view);
        let mut tanks: Vec<TankEstimate> = view
            .tanks
            .values()
            .map(|(_, inputs)| inputs.estimate(now))
            .collect();
        tanks.sort_by_key(|estimate| estimate.tank_id);
        let mut towers: Vec<TowerThroughput> = view
            .towers
            .iter()
            .map(|(tower_id, (_, inputs))| TowerThroughput {
                tower_id: *tower_id,
                sections: inputs.throughput(now),
            })
            .collect();
        towers.sort_by_key(|tower| tower.tower_id);
        BoardSnapshot { tanks, towers }
    }

    /// Entities the board follows.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRef> {
        self.subscriptions
            .iter()
            .map(Subscription::entity)
            .collect()
    }
}

impl std::fmt::Debug for LevelBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelBoard")
            .field("entities", &self.entities())
            .finish_non_exhaustive()
    }
}

fn refresh(engine: &Engine, view: &Mutex<BoardView>, entity: EntityRef, sequence: u64) {
    let stored: bool = match entity {
        EntityRef::Tank(id) => {
            let Some(tank) = engine.tank(id) else {
                warn!(%entity, "Cannot refresh unregistered tank");
                return;
            };
            let inputs = TankInputs {
                tank,
                operations: engine
                    .operations()
                    .into_iter()
                    .filter(|operation| operation.tank_reference() == Some(id))
                    .collect(),
                refining_runs: engine
                    .refining_runs()
                    .into_iter()
                    .filter(|run| run.touched_tanks().contains(&id))
                    .collect(),
            };
            store_if_newer(&mut lock(view).tanks, id, sequence, inputs)
        }
        EntityRef::Tower(id) => {
            let Some(tower) = engine.tower(id) else {
                warn!(%entity, "Cannot refresh unregistered tower");
                return;
            };
            let inputs = TowerInputs {
                tower,
                refining_runs: engine
                    .refining_runs()
                    .into_iter()
                    .filter(|run| run.tower_reference == id)
                    .collect(),
            };
            store_if_newer(&mut lock(view).towers, id, sequence, inputs)
        }
    };

    if stored {
        debug!(%entity, sequence, "Board refreshed");
    } else {
        debug!(%entity, sequence, "Discarded stale recompute");
    }
}
