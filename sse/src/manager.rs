use crate::connection::{deliver, Admission, BrokerConfig, ConnectionId, ConnectionRegistry};
use crate::message::{Event as SseEvent, EventType};
use crate::transport::{Frame, Transport};
use futures::future::join_all;
use log::*;
use serde::Serialize;
use std::sync::Arc;

/// Reason attached to the final event every subscriber receives at shutdown.
pub const SHUTDOWN_REASON: &str = "server going away";

/// Fan-out broker over the connection registry.
///
/// Delivery is best-effort and at-most-once per subscriber per publish. A
/// subscriber whose write fails is unregistered; the failure is never
/// reported to the publisher and never stops delivery to the others.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new(config: BrokerConfig) -> Self {
        info!(
            "SSE broker config: max_subscribers={}, heartbeat_interval={}s, write_timeout={}ms, channel_capacity={}",
            config.max_subscribers,
            config.heartbeat_interval.as_secs(),
            config.write_timeout.as_millis(),
            config.channel_capacity,
        );
        Self {
            registry: Arc::new(ConnectionRegistry::new(config)),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        self.registry.config()
    }

    /// Admit a new subscriber. Rejection is an ordinary outcome the transport
    /// layer must turn into an immediate "service unavailable" response.
    pub fn try_register(&self, transport: Arc<dyn Transport>) -> Admission {
        self.registry.try_register(transport)
    }

    /// Unregister a connection by ID
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if self.registry.unregister(connection_id) {
            debug!("SSE connection {connection_id} unregistered");
        }
    }

    /// Number of currently active subscribers.
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.registry.is_closed()
    }

    /// Serialize `payload` once and push it as `event_name` to every active
    /// subscriber. Returns how many subscribers accepted the write.
    pub async fn publish<T>(&self, event_name: &str, payload: &T) -> usize
    where
        T: Serialize + ?Sized,
    {
        if self.registry.is_closed() {
            debug!("Dropping {event_name} event: broker is shut down");
            return 0;
        }

        let frame = match Frame::json(event_name, payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Dropping SSE event {event_name:?}: {e}");
                return 0;
            }
        };

        let delivered = self.broadcast(&frame).await;
        debug!("Delivered {event_name} event to {delivered} subscriber(s)");
        delivered
    }

    /// Publish a typed event under its own event type name.
    pub async fn send_event(&self, event: SseEvent) -> usize {
        self.publish(event.event_type(), &event).await
    }

    /// Send a final `server_shutdown` event to everyone, then unregister all
    /// subscribers. Later calls, and later publishes, do nothing.
    pub async fn shutdown(&self) {
        if !self.registry.close() {
            debug!("SSE broker already shut down");
            return;
        }

        let farewell = SseEvent::ServerShutdown {
            reason: SHUTDOWN_REASON.to_string(),
        };
        info!(
            "Shutting down SSE broker with {} active subscriber(s)",
            self.count()
        );
        match Frame::json(farewell.event_type(), &farewell) {
            Ok(frame) => {
                self.broadcast(&frame).await;
            }
            Err(e) => error!("Failed to build shutdown event: {e}"),
        }

        let removed = self.registry.unregister_all();
        info!("SSE broker shut down, released {removed} subscriber(s)");
    }

    async fn broadcast(&self, frame: &Frame) -> usize {
        let snapshot = self.registry.snapshot();
        let write_timeout = self.registry.config().write_timeout;

        let results = join_all(snapshot.iter().map(|(connection_id, transport)| async move {
            (
                connection_id,
                deliver(transport.as_ref(), frame, write_timeout).await,
            )
        }))
        .await;

        let mut delivered = 0;
        for (connection_id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to send event to connection {}: {}. Connection will be cleaned up.",
                        connection_id.as_str(),
                        e
                    );
                    self.registry.unregister(connection_id);
                }
            }
        }
        delivered
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

/// Keeps a subscriber registered for as long as the guard is alive.
///
/// The transport layer moves this into the response stream; when the client
/// disconnects the stream is dropped and the subscriber unregistered.
pub struct SubscriptionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl SubscriptionGuard {
    pub fn new(manager: Arc<Manager>, connection_id: ConnectionId) -> Self {
        Self {
            manager,
            connection_id,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.manager.unregister_connection(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RejectionReason;
    use crate::message::ResourceChange;
    use crate::transport::testing::RecordingTransport;
    use crate::transport::SseTransport;
    use events::Action;
    use serde_json::json;
    use std::time::Duration;

    fn manager(max_subscribers: usize) -> Manager {
        Manager::new(BrokerConfig {
            max_subscribers,
            ..BrokerConfig::default()
        })
    }

    fn register(manager: &Manager, transport: &Arc<RecordingTransport>) -> ConnectionId {
        match manager.try_register(transport.clone()) {
            Admission::Accepted(id) => id,
            Admission::Rejected(reason) => panic!("unexpected rejection: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let manager = manager(10);
        let transports: Vec<_> = (0..3)
            .map(|_| Arc::new(RecordingTransport::default()))
            .collect();
        for transport in &transports {
            register(&manager, transport);
        }

        let delivered = manager
            .publish("rooms_updated", &json!({ "action": "update", "id": "5" }))
            .await;

        assert_eq!(delivered, 3);
        for transport in &transports {
            assert_eq!(
                transport.events(),
                vec![Frame::event(
                    "rooms_updated",
                    r#"{"action":"update","id":"5"}"#
                )]
            );
        }
    }

    #[tokio::test]
    async fn test_event_name_with_line_break_is_dropped_without_disturbing_subscribers() {
        let manager = Manager::default();
        let (transport, mut rx) = SseTransport::channel(4);
        assert!(manager.try_register(Arc::new(transport)).is_accepted());

        let delivered = manager
            .publish("rooms\nupdated", &json!({ "id": "1" }))
            .await;

        assert_eq!(delivered, 0);
        assert_eq!(manager.count(), 1);
        assert!(rx.try_recv().is_err());

        let delivered = manager
            .publish("rooms_updated", &json!({ "id": "1" }))
            .await;

        assert_eq!(delivered, 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_isolated_and_removed() {
        let manager = manager(10);
        let first = Arc::new(RecordingTransport::default());
        let second = Arc::new(RecordingTransport::failing());
        let third = Arc::new(RecordingTransport::default());
        register(&manager, &first);
        let failing_id = register(&manager, &second);
        register(&manager, &third);

        let delivered = manager
            .publish("reservations_updated", &json!({ "action": "delete", "id": "9" }))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(first.events().len(), 1);
        assert_eq!(third.events().len(), 1);
        assert!(second.events().is_empty());
        assert_eq!(manager.count(), 2);
        assert!(!manager.registry.contains(&failing_id));
        assert_eq!(second.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_subscriber_does_not_block_publish() {
        let manager = manager(10);
        let healthy = Arc::new(RecordingTransport::default());
        let stuck = Arc::new(RecordingTransport::hanging());
        register(&manager, &healthy);
        register(&manager, &stuck);

        let started = tokio::time::Instant::now();
        let delivered = manager.publish("projectors_updated", &json!({})).await;

        assert_eq!(delivered, 1);
        assert_eq!(healthy.events().len(), 1);
        assert_eq!(manager.count(), 1);
        assert!(started.elapsed() <= manager.config().write_timeout + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_send_event_uses_event_type_as_name() {
        let manager = manager(10);
        let transport = Arc::new(RecordingTransport::default());
        register(&manager, &transport);

        manager
            .send_event(SseEvent::ProjectorsUpdated(ResourceChange {
                action: Action::Status,
                id: "2".to_string(),
            }))
            .await;

        assert_eq!(
            transport.events(),
            vec![Frame::event(
                "projectors_updated",
                r#"{"action":"estado","id":"2"}"#
            )]
        );
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_is_harmless() {
        let manager = Manager::default();

        assert_eq!(manager.publish("rooms_updated", &json!({})).await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_says_goodbye_then_empties_registry() {
        let manager = manager(10);
        let transports: Vec<_> = (0..2)
            .map(|_| Arc::new(RecordingTransport::default()))
            .collect();
        for transport in &transports {
            register(&manager, transport);
        }

        manager.shutdown().await;

        assert_eq!(manager.count(), 0);
        assert!(manager.is_shut_down());
        for transport in &transports {
            assert_eq!(
                transport.events(),
                vec![Frame::event(
                    "server_shutdown",
                    r#"{"reason":"server going away"}"#
                )]
            );
            assert_eq!(transport.close_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_is_a_no_op() {
        let manager = manager(10);
        let transport = Arc::new(RecordingTransport::default());
        register(&manager, &transport);
        manager.shutdown().await;

        let delivered = manager.publish("rooms_updated", &json!({ "id": "1" })).await;

        assert_eq!(delivered, 0);
        assert_eq!(transport.events().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_twice_and_with_zero_subscribers() {
        let manager = Manager::default();

        manager.shutdown().await;
        manager.shutdown().await;

        assert_eq!(manager.count(), 0);
        assert_eq!(
            manager.try_register(Arc::new(RecordingTransport::default())),
            Admission::Rejected(RejectionReason::ShuttingDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_wait_on_stuck_subscriber() {
        let manager = manager(10);
        register(&manager, &Arc::new(RecordingTransport::hanging()));

        manager.shutdown().await;

        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_guard_unregisters_on_drop() {
        let manager = Arc::new(manager(10));
        let transport = Arc::new(RecordingTransport::default());
        let id = register(&manager, &transport);

        let guard = SubscriptionGuard::new(Arc::clone(&manager), id.clone());
        assert_eq!(guard.connection_id(), &id);
        assert_eq!(manager.count(), 1);

        drop(guard);

        assert_eq!(manager.count(), 0);
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_admission_scenario_with_ceiling_of_two() {
        let manager = manager(2);
        let first = register(&manager, &Arc::new(RecordingTransport::default()));
        register(&manager, &Arc::new(RecordingTransport::default()));

        assert!(!manager
            .try_register(Arc::new(RecordingTransport::default()))
            .is_accepted());

        manager.unregister_connection(&first);

        assert!(manager
            .try_register(Arc::new(RecordingTransport::default()))
            .is_accepted());
    }
}
