// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! In-memory record store.
//!
//! Each operation sits behind its own mutex so that validating and committing
//! a transition is serialized per operation while different operations move
//! concurrently. The map of operations is only write-locked to add one.

use crudeline_audit::AuditEvent;
use crudeline_domain::{
    Operation, OperationId, RefiningRun, RefiningRunId, Tank, TankId, Tower, TowerId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type OperationSlot = Arc<Mutex<Operation>>;

#[derive(Debug, Default)]
pub struct Ledger {
    pub tanks: RwLock<BTreeMap<TankId, Tank>>,
    pub towers: RwLock<BTreeMap<TowerId, Tower>>,
    pub operations: RwLock<BTreeMap<OperationId, OperationSlot>>,
    pub refining_runs: RwLock<BTreeMap<RefiningRunId, RefiningRun>>,
    audit_log: Mutex<Vec<AuditEvent>>,
}

impl Ledger {
    pub fn operation_slot(&self, id: OperationId) -> Option<OperationSlot> {
        read(&self.operations).get(&id).map(Arc::clone)
    }

    pub fn operation(&self, id: OperationId) -> Option<Operation> {
        self.operation_slot(id).map(|slot| lock(&slot).clone())
    }

    pub fn operations(&self) -> Vec<Operation> {
        let slots: Vec<OperationSlot> = read(&self.operations).values().map(Arc::clone).collect();
        slots.iter().map(|slot| lock(slot).clone()).collect()
    }

    pub fn refining_runs(&self) -> Vec<RefiningRun> {
        read(&self.refining_runs).values().cloned().collect()
    }

    pub fn tank(&self, id: TankId) -> Option<Tank> {
        read(&self.tanks).get(&id).cloned()
    }

    pub fn tanks(&self) -> Vec<Tank> {
        read(&self.tanks).values().cloned().collect()
    }

    pub fn tower(&self, id: TowerId) -> Option<Tower> {
        read(&self.towers).get(&id).cloned()
    }

    pub fn towers(&self) -> Vec<Tower> {
        read(&self.towers).values().cloned().collect()
    }

    /// Appends `event` and returns it stamped with its 1-based position.
    pub fn record_audit(&self, event: AuditEvent) -> AuditEvent {
        let mut log = lock(&self.audit_log);
        let position: u64 = u64::try_from(log.len()).unwrap_or(u64::MAX);
        let recorded: AuditEvent = event.recorded(position.saturating_add(1));
        log.push(recorded.clone());
        recorded
    }

    pub fn audit_log(&self) -> Vec<AuditEvent> {
        lock(&self.audit_log).clone()
    }
}

// Records are replaced whole, so a poisoned lock still guards consistent data.
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
