use crate::message::{Event as SseEvent, ReservationChange, ResourceChange};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to SSE events and broadcasting
/// them to every active subscriber.
///
/// Every dashboard shows every resource, so there is no per-user routing:
/// each change goes to all connections.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

impl From<&DomainEvent> for SseEvent {
    fn from(event: &DomainEvent) -> Self {
        match event {
            DomainEvent::RoomChanged { room_id, action } => SseEvent::RoomsUpdated(ResourceChange {
                action: *action,
                id: room_id.clone(),
            }),
            DomainEvent::ProjectorChanged {
                projector_id,
                action,
            } => SseEvent::ProjectorsUpdated(ResourceChange {
                action: *action,
                id: projector_id.clone(),
            }),
            DomainEvent::ReservationChanged {
                reservation_id,
                resource_id,
                action,
            } => SseEvent::ReservationsUpdated(ReservationChange {
                action: *action,
                id: reservation_id.clone(),
                resource_id: resource_id.clone(),
            }),
        }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling {:?} for SSE fan-out", event);
        let delivered = self.sse_manager.send_event(SseEvent::from(event)).await;
        trace!("{:?} reached {} subscriber(s)", event.action(), delivered);
    }
}
