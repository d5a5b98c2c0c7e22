use events::{Action, Id};
use serde::Serialize;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Payload announcing that a room or projector changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceChange {
    pub action: Action,
    pub id: Id,
}

/// Payload announcing that a reservation changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationChange {
    pub action: Action,
    pub id: Id,
    pub resource_id: Id,
}

/// Typed events pushed to subscribers. The event type travels as the SSE
/// `event:` field, so only the variant's payload is serialized into `data:`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    RoomsUpdated(ResourceChange),
    ProjectorsUpdated(ResourceChange),
    ReservationsUpdated(ReservationChange),
    /// Sent once to every subscriber when the broker shuts down.
    ServerShutdown { reason: String },
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::RoomsUpdated(_) => "rooms_updated",
            Event::ProjectorsUpdated(_) => "projectors_updated",
            Event::ReservationsUpdated(_) => "reservations_updated",
            Event::ServerShutdown { .. } => "server_shutdown",
        }
    }
}
