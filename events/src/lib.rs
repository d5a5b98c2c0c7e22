//! Mutation notification infrastructure for the booking platform.
//!
//! The CRUD layer that owns resource and reservation storage is the only
//! producer of events. After a write commits it publishes a [`DomainEvent`]
//! describing what changed; registered handlers (the SSE broker in practice)
//! turn that into push notifications.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum of every change class the platform announces
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! Events only say "something changed". Clients are expected to re-query the
//! authoritative availability read path rather than trust the payload.
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Identifiers are carried as opaque strings.

use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a stored entity (room, projector or reservation).
pub type Id = String;

/// The kind of write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    /// Approval or rejection of a reservation, or enabling/disabling a resource.
    #[serde(rename = "estado")]
    Status,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
            Action::Status => write!(f, "estado"),
        }
    }
}

/// Business-level changes, emitted once the corresponding write has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A room was created, edited, removed or had its status toggled.
    RoomChanged { room_id: Id, action: Action },
    /// A projector was created, edited, removed or had its status toggled.
    ProjectorChanged { projector_id: Id, action: Action },
    /// A reservation was booked, edited, cancelled, approved or rejected.
    /// `resource_id` names the booked room or projector so that dashboards can
    /// refresh just that tile.
    ReservationChanged {
        reservation_id: Id,
        resource_id: Id,
        action: Action,
    },
}

impl DomainEvent {
    pub fn action(&self) -> Action {
        match self {
            DomainEvent::RoomChanged { action, .. }
            | DomainEvent::ProjectorChanged { action, .. }
            | DomainEvent::ReservationChanged { action, .. } => *action,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers never report failures back to the publisher; the write that
    /// triggered the event has already succeeded.
    pub async fn publish(&self, event: DomainEvent) {
        debug!(
            "Publishing {:?} to {} handler(s)",
            event,
            self.handlers.len()
        );
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
