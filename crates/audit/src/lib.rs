// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

use crudeline_domain::{OperationId, RefiningRunId};
use serde::Serialize;
use time::OffsetDateTime;

#[cfg(test)]
mod tests;

/// Represents the entity performing an action.
///
/// An actor is any identifiable entity that initiates a state change:
/// a dispatcher at a terminal, a lab technician, or an import job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// The unique identifier for this actor.
    pub id: String,
    /// The type of actor (e.g., "operator", "system", "fixture").
    pub actor_type: String,
}

impl Actor {
    /// Creates a new Actor.
    #[must_use]
    pub const fn new(id: String, actor_type: String) -> Self {
        Self { id, actor_type }
    }

    /// The actor used for changes the system makes on its own behalf.
    #[must_use]
    pub fn system() -> Self {
        Self::new(String::from("crudeline"), String::from("system"))
    }
}

/// Represents the reason or trigger for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cause {
    /// A unique identifier for this cause (e.g., request ID, form submission ID).
    pub id: String,
    /// A description of the cause.
    pub description: String,
}

impl Cause {
    /// Creates a new Cause.
    #[must_use]
    pub const fn new(id: String, description: String) -> Self {
        Self { id, description }
    }
}

/// Represents the specific action performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    /// The name of the action (e.g., "`CreateOperation`", "`Transition`").
    pub name: String,
    /// Optional additional details about the action.
    pub details: Option<String>,
}

impl Action {
    /// Creates a new Action.
    #[must_use]
    pub const fn new(name: String, details: Option<String>) -> Self {
        Self { name, details }
    }
}

/// A compact rendering of a record before or after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub data: String,
}

impl StateSnapshot {
    /// Creates a new `StateSnapshot`.
    #[must_use]
    pub const fn new(data: String) -> Self {
        Self { data }
    }

    /// Snapshot of a record that did not exist yet.
    #[must_use]
    pub fn absent() -> Self {
        Self::new(String::from("absent"))
    }
}

/// The record an audit event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditSubject {
    /// A reception or dispatch.
    Operation(OperationId),
    /// A refining run.
    RefiningRun(RefiningRunId),
}

impl std::fmt::Display for AuditSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operation(id) => write!(f, "operation {id}"),
            Self::RefiningRun(id) => write!(f, "refining run {id}"),
        }
    }
}

/// An immutable audit event representing one accepted change.
///
/// Every successful command produces exactly one audit event. Audit events
/// are immutable once created and capture:
/// - Who performed the action (actor)
/// - Why it was performed (cause)
/// - What action was performed (action)
/// - The record before and after the change
/// - Which record it concerns (subject)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Position in the audit log; `None` until the event has been recorded.
    pub event_id: Option<u64>,
    pub subject: AuditSubject,
    pub actor: Actor,
    pub cause: Cause,
    pub action: Action,
    pub before: StateSnapshot,
    pub after: StateSnapshot,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl AuditEvent {
    /// Creates a new, not yet recorded `AuditEvent`.
    #[must_use]
    pub const fn new(
        subject: AuditSubject,
        actor: Actor,
        cause: Cause,
        action: Action,
        before: StateSnapshot,
        after: StateSnapshot,
        occurred_at: OffsetDateTime,
    ) -> Self {
        Self {
            event_id: None,
            subject,
            actor,
            cause,
            action,
            before,
            after,
            occurred_at,
        }
    }

    /// Returns the same event stamped with its log position.
    #[must_use]
    pub fn recorded(self, event_id: u64) -> Self {
        Self {
            event_id: Some(event_id),
            ..self
        }
    }
}
