use crate::error::Error;
use crate::transport::{Frame, Transport};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_MAX_SUBSCRIBERS: usize = 200;
/// Longer than the idle timeout of common reverse proxies would allow on its
/// own, so keep proxy read timeouts above this value.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(55);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tunables for admission control and liveness probing.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// Ceiling on concurrently registered subscribers.
    pub max_subscribers: usize,
    /// Period between liveness probes for each subscriber.
    pub heartbeat_interval: Duration,
    /// Upper bound on any single write to a subscriber.
    pub write_timeout: Duration,
    /// Outbound buffer size of each subscriber's transport.
    pub channel_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Why a connection was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The configured subscriber ceiling has been reached.
    AtCapacity { limit: usize },
    /// The broker has been shut down.
    ShuttingDown,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RejectionReason::AtCapacity { limit } => {
                write!(f, "subscriber limit of {limit} reached")
            }
            RejectionReason::ShuttingDown => write!(f, "server is shutting down"),
        }
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted(ConnectionId),
    Rejected(RejectionReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }
}

/// Registry-owned state for one active subscriber.
struct Subscriber {
    transport: Arc<dyn Transport>,
    connected_at: DateTime<Utc>,
    last_heartbeat_at: DateTime<Utc>,
    heartbeat: Option<JoinHandle<()>>,
}

/// Writes one frame, giving up after `timeout`.
pub(crate) async fn deliver(
    transport: &dyn Transport,
    frame: &Frame,
    timeout: Duration,
) -> Result<(), Error> {
    time::timeout(timeout, transport.send(frame)).await?
}

/// Registry of active subscribers with admission control and heartbeats.
///
/// A subscriber is removed on its first failed write, when the transport
/// layer reports a disconnect, or at shutdown. Removal takes the entry out of
/// the map, so the heartbeat task is aborted and the transport closed exactly
/// once no matter how many paths race to remove it.
pub struct ConnectionRegistry {
    config: BrokerConfig,
    connections: DashMap<ConnectionId, Subscriber>,
    /// Admitted subscribers, counted before insertion so that the ceiling
    /// check and the increment happen as one atomic step.
    active: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connections: DashMap::new(),
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Admit a transport if there is room, and start its heartbeat.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn try_register(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Admission {
        if self.is_closed() {
            return Admission::Rejected(RejectionReason::ShuttingDown);
        }

        let limit = self.config.max_subscribers;
        let admitted = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if !admitted {
            warn!("Rejecting SSE subscriber: limit of {limit} reached");
            return Admission::Rejected(RejectionReason::AtCapacity { limit });
        }

        let connection_id = ConnectionId::new();
        let now = Utc::now();
        self.connections.insert(
            connection_id.clone(),
            Subscriber {
                transport: Arc::clone(&transport),
                connected_at: now,
                last_heartbeat_at: now,
                heartbeat: None,
            },
        );

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::downgrade(self),
            connection_id.clone(),
            transport,
            self.config.heartbeat_interval,
            self.config.write_timeout,
        ));
        match self.connections.get_mut(&connection_id) {
            Some(mut subscriber) => subscriber.heartbeat = Some(heartbeat),
            // Already removed by a concurrent unregister.
            None => heartbeat.abort(),
        }

        // A shutdown sweep may have run between the closed check and the insert.
        if self.is_closed() {
            self.unregister(&connection_id);
            return Admission::Rejected(RejectionReason::ShuttingDown);
        }

        info!(
            "Registered SSE subscriber {} ({} active)",
            connection_id,
            self.count()
        );
        Admission::Accepted(connection_id)
    }

    /// Remove a subscriber. Returns `true` only for the call that actually
    /// removed it; later calls are no-ops.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, subscriber)) = self.connections.remove(connection_id) else {
            return false;
        };

        self.active.fetch_sub(1, Ordering::AcqRel);
        if let Some(heartbeat) = subscriber.heartbeat {
            heartbeat.abort();
        }
        subscriber.transport.close();

        info!(
            "Unregistered SSE subscriber {} after {}s ({} active)",
            connection_id,
            (Utc::now() - subscriber.connected_at).num_seconds(),
            self.count()
        );
        true
    }

    pub fn count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn last_heartbeat_at(&self, connection_id: &ConnectionId) -> Option<DateTime<Utc>> {
        self.connections
            .get(connection_id)
            .map(|subscriber| subscriber.last_heartbeat_at)
    }

    /// Point-in-time copy of the active set. Shard locks are released before
    /// this returns, so callers can write to transports without holding them.
    pub fn snapshot(&self) -> Vec<(ConnectionId, Arc<dyn Transport>)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().transport)))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop admitting subscribers. Returns `true` the first time only.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Unregister every subscriber currently present.
    pub fn unregister_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }

    fn touch(&self, connection_id: &ConnectionId) {
        if let Some(mut subscriber) = self.connections.get_mut(connection_id) {
            subscriber.last_heartbeat_at = Utc::now();
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

async fn heartbeat_loop(
    registry: Weak<ConnectionRegistry>,
    connection_id: ConnectionId,
    transport: Arc<dyn Transport>,
    period: Duration,
    write_timeout: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let frame = Frame::heartbeat();

    loop {
        ticker.tick().await;
        let result = deliver(transport.as_ref(), &frame, write_timeout).await;

        let Some(registry) = registry.upgrade() else {
            break;
        };
        match result {
            Ok(()) => {
                trace!("Heartbeat delivered to SSE subscriber {connection_id}");
                registry.touch(&connection_id);
            }
            Err(e) => {
                warn!("Heartbeat to SSE subscriber {connection_id} failed: {e}. Reclaiming connection.");
                registry.unregister(&connection_id);
                break;
            }
        }
    }
}
