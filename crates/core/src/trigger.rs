// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Recomputation notifications for derived tank and tower figures.
//!
//! Every accepted change publishes one [`RecomputeEvent`] naming the tanks
//! and towers whose estimates are now stale. Delivery is fire-and-forget:
//!
//! - publishing never blocks and never fails, even with no subscribers
//! - each subscriber sees events in publish order
//! - a subscriber that falls behind the channel buffer gets one resync
//!   notice instead of the events it missed
//! - a panicking callback is logged and does not stop its subscription
//!
//! Events carry a strictly increasing `sequence`, so a consumer that caches
//! results can refuse to overwrite a newer value with an older one.

use crate::error::CoreError;
use crudeline_domain::{OperationId, RefiningRunId, TankId, TowerId, WorkflowState};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// A record whose derived figures depend on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Tank(TankId),
    Tower(TowerId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tank(id) => write!(f, "tank:{id}"),
            Self::Tower(id) => write!(f, "tower:{id}"),
        }
    }
}

/// What caused a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecomputeReason {
    OperationCreated { operation_id: OperationId },
    OperationTransitioned {
        operation_id: OperationId,
        target: WorkflowState,
    },
    OperationActivityChanged {
        operation_id: OperationId,
        active: bool,
    },
    RefiningRunRecorded { run_id: RefiningRunId },
    RefiningRunUpdated { run_id: RefiningRunId },
    RefiningRunActivityChanged {
        run_id: RefiningRunId,
        active: bool,
    },
    /// A tank or tower definition was registered.
    EntityRegistered,
    /// The subscriber missed events and must recompute from scratch.
    Resync,
}

/// One published notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeEvent {
    pub sequence: u64,
    pub entities: Vec<EntityRef>,
    pub reason: RecomputeReason,
}

impl RecomputeEvent {
    /// Returns true if `entity` must be recomputed.
    #[must_use]
    pub fn touches(&self, entity: EntityRef) -> bool {
        self.entities.contains(&entity)
    }
}

/// What an `on_change` callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub entity: EntityRef,
    /// Sequence of the triggering event; for a resync, the latest sequence
    /// published when the lag was detected.
    pub sequence: u64,
    pub reason: RecomputeReason,
}

impl Change {
    /// Returns true if this notice replaces one or more missed events.
    #[must_use]
    pub fn is_resync(&self) -> bool {
        self.reason == RecomputeReason::Resync
    }
}

/// Publisher of recompute notifications.
///
/// A thin wrapper around `tokio::sync::broadcast`; clones share the channel
/// and the sequence counter.
#[derive(Debug, Clone)]
pub struct RecomputationTrigger {
    tx: broadcast::Sender<RecomputeEvent>,
    // Held across the send so channel order always matches sequence order.
    sequence: Arc<Mutex<u64>>,
}

impl RecomputationTrigger {
    /// Creates a trigger buffering up to `buffer` events per subscriber.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            sequence: Arc::new(Mutex::new(0)),
        }
    }

    /// Publishes a recompute for a single entity.
    pub fn notify(&self, entity: EntityRef, reason: RecomputeReason) -> u64 {
        self.publish(vec![entity], reason)
    }

    /// Publishes one recompute covering every entity in `entities`.
    ///
    /// Duplicates are removed. Returns `None` without publishing when
    /// `entities` is empty.
    pub fn notify_all(&self, entities: &[EntityRef], reason: RecomputeReason) -> Option<u64> {
        if entities.is_empty() {
            return None;
        }
        let mut unique: Vec<EntityRef> = entities.to_vec();
        unique.sort_unstable();
        unique.dedup();
        Some(self.publish(unique, reason))
    }

    fn publish(&self, entities: Vec<EntityRef>, reason: RecomputeReason) -> u64 {
        let mut sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        *sequence += 1;
        let event = RecomputeEvent {
            sequence: *sequence,
            entities,
            reason,
        };
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(sequence = *sequence, ?reason, receivers, "Published recompute");
            }
            Err(_) => {
                debug!(sequence = *sequence, ?reason, "No subscribers for recompute");
            }
        }
        *sequence
    }

    /// The sequence of the most recently published event, `0` before any.
    #[must_use]
    pub fn current_sequence(&self) -> u64 {
        latest(&self.sequence)
    }

    /// Subscribes to the raw event stream.
    ///
    /// Events published before the call are not received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecomputeEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers, including `on_change` subscriptions.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Invokes `callback` for every future event touching `entity`.
    ///
    /// The callback runs on a dedicated task, one event at a time, in publish
    /// order. Dropping the returned [`Subscription`] stops delivery.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoRuntime`] when called outside a Tokio runtime.
    pub fn on_change<F>(&self, entity: EntityRef, mut callback: F) -> Result<Subscription, CoreError>
    where
        F: FnMut(Change) + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CoreError::NoRuntime)?;
        let mut rx: broadcast::Receiver<RecomputeEvent> = self.subscribe();
        let sequence: Arc<Mutex<u64>> = Arc::clone(&self.sequence);

        let handle: JoinHandle<()> = runtime.spawn(async move {
            loop {
                let change: Change = match rx.recv().await {
                    Ok(event) if event.touches(entity) => Change {
                        entity,
                        sequence: event.sequence,
                        reason: event.reason,
                    },
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%entity, skipped, "Subscriber lagged, resyncing");
                        Change {
                            entity,
                            sequence: latest(&sequence),
                            reason: RecomputeReason::Resync,
                        }
                    }
                    Err(RecvError::Closed) => break,
                };

                if catch_unwind(AssertUnwindSafe(|| callback(change))).is_err() {
                    error!(%entity, sequence = change.sequence, "Recompute callback panicked");
                }
            }
            debug!(%entity, "Recompute subscription closed");
        });

        Ok(Subscription { entity, handle })
    }
}

fn latest(sequence: &Mutex<u64>) -> u64 {
    *sequence.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for RecomputationTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

/// Handle to an `on_change` callback; delivery stops when dropped.
#[derive(Debug)]
pub struct Subscription {
    entity: EntityRef,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// The entity this subscription listens to.
    #[must_use]
    pub const fn entity(&self) -> EntityRef {
        self.entity
    }

    /// Returns true while the delivery task is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
