//! Server-Sent Events (SSE) infrastructure for live resource availability.
//!
//! This crate keeps dashboards and booking forms informed, in near real time,
//! that a room, projector or reservation changed. Clients react by re-querying
//! availability; the events themselves are only change notices.
//!
//! # Architecture
//!
//! - **Admission control**: at most `max_subscribers` connections are held
//!   open. Further attempts are rejected immediately rather than queued.
//! - **Heartbeats**: every subscriber owns a timer task that writes an inert
//!   comment frame each interval. A failed write reclaims the connection; there
//!   is no other reaper.
//! - **Failure isolation**: a publish writes to a snapshot of the active set
//!   concurrently, each write bounded by a timeout. A failing subscriber is
//!   unregistered and the rest still receive the event.
//! - **Ephemeral messages**: nothing is persisted or replayed. A client that
//!   connects after a change sees fresh data on its initial fetch.
//! - **Explicit lifecycle**: the broker is constructed at startup, injected
//!   where needed, and shut down once at process exit.
//!
//! # Message Flow
//!
//! 1. Frontend opens the `/events` stream
//! 2. The web layer wraps the stream in an `SseTransport` and calls
//!    `Manager::try_register`, answering 503 on rejection
//! 3. A CRUD handler commits a write and publishes a `DomainEvent`
//! 4. `SseDomainEventHandler` maps it to a typed event and calls
//!    `Manager::send_event`
//! 5. Every active subscriber receives the event and refreshes its view
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with admission control and heartbeats
//! - `manager`: Fan-out broker, shutdown, and the subscription guard
//! - `message`: Type-safe event definitions
//! - `transport`: Transport seam, frame validation, and the axum-backed transport
//! - `domain_event_handler`: Bridge from domain events to SSE events
//! - `error`: Error types

pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod manager;
pub mod message;
pub mod transport;

pub use connection::{Admission, BrokerConfig, ConnectionId, RejectionReason};
pub use manager::{Manager, SubscriptionGuard};
pub use transport::{Frame, SseTransport, Transport};
