use crate::error::Result;
use crate::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use log::*;
use sse::{Admission, SseTransport, SubscriptionGuard};
use std::convert::Infallible;
use std::sync::Arc;

/// SSE handler that establishes a long-lived connection for availability
/// change notices.
///
/// Admission is decided before any bytes are sent: a rejected client gets an
/// immediate 503 instead of a stream. Liveness is handled by the broker's own
/// heartbeat, so no axum keep-alive is configured.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
) -> Result<Sse<impl Stream<Item = core::result::Result<Event, Infallible>>>> {
    let manager = Arc::clone(&app_state.sse_manager);
    let (transport, mut rx) = SseTransport::channel(manager.config().channel_capacity);

    let connection_id = match manager.try_register(Arc::new(transport)) {
        Admission::Accepted(connection_id) => connection_id,
        Admission::Rejected(reason) => {
            warn!("Refusing SSE connection: {reason}");
            return Err(reason.into());
        }
    };
    debug!("Established SSE connection {connection_id}");

    // Dropping the stream (client went away) drops the guard, which
    // unregisters the subscriber.
    let guard = SubscriptionGuard::new(manager, connection_id);

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }

        debug!("SSE connection {} closed by the server", guard.connection_id());
    };

    Ok(Sse::new(stream))
}
