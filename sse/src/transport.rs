use crate::error::{Error, TransportErrorKind};
use async_trait::async_trait;
use axum::response::sse::Event;
use log::*;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Text of the comment line written on every heartbeat.
pub const HEARTBEAT_COMMENT: &str = "ping";

/// A unit of output for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A named event carrying an already-serialized JSON payload.
    Event { name: String, data: String },
    /// A comment line; EventSource clients discard these.
    Comment(String),
}

impl Frame {
    pub fn event(name: impl Into<String>, data: impl Into<String>) -> Self {
        Frame::Event {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Serialize `payload` and wrap it in an event named `name`, refusing
    /// anything that cannot be written as a single SSE event.
    pub fn json<T>(name: &str, payload: &T) -> Result<Self, Error>
    where
        T: Serialize + ?Sized,
    {
        let frame = Frame::event(name, serde_json::to_string(payload)?);
        frame.validate()?;
        Ok(frame)
    }

    pub fn heartbeat() -> Self {
        Frame::Comment(HEARTBEAT_COMMENT.to_string())
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Frame::Comment(text) if text == HEARTBEAT_COMMENT)
    }

    /// Event names and comments must fit on one line. Data may span lines
    /// (each becomes its own `data:` field) but must not contain `\r`.
    pub fn validate(&self) -> Result<(), Error> {
        let valid = match self {
            Frame::Event { name, data } => !has_line_break(name) && !data.contains('\r'),
            Frame::Comment(text) => !has_line_break(text),
        };
        if valid {
            Ok(())
        } else {
            Err(Error::invalid_frame())
        }
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// The sink a subscriber's frames are written to.
///
/// The physical connection belongs to the transport layer; the broker only
/// needs to know whether a write succeeded and a way to ask for the
/// connection to be torn down.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: &Frame) -> Result<(), Error>;

    /// Best-effort close. Must be safe to call more than once.
    fn close(&self);
}

pub type SseSender = mpsc::Sender<Result<Event, Infallible>>;
pub type SseReceiver = mpsc::Receiver<Result<Event, Infallible>>;

/// Transport backed by a bounded channel that an axum `Sse` response drains.
///
/// Writes never wait: a full buffer means the client is not keeping up and is
/// reported as a failed write.
pub struct SseTransport {
    sender: Mutex<Option<SseSender>>,
}

impl SseTransport {
    pub fn channel(capacity: usize) -> (Self, SseReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn sender(&self) -> Option<SseSender> {
        match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn to_sse_event(frame: &Frame) -> Event {
    match frame {
        Frame::Event { name, data } => Event::default().event(name).data(data),
        Frame::Comment(text) => Event::default().comment(text),
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, frame: &Frame) -> Result<(), Error> {
        // axum panics on a malformed field, so refuse the write instead.
        frame.validate()?;
        let sender = self
            .sender()
            .ok_or_else(|| Error::transport(TransportErrorKind::Closed))?;

        sender.try_send(Ok(to_sse_event(frame))).map_err(|e| match e {
            TrySendError::Full(_) => Error::transport(TransportErrorKind::Full),
            TrySendError::Closed(_) => Error::transport(TransportErrorKind::Closed),
        })
    }

    fn close(&self) {
        let taken = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            trace!("Closed SSE transport channel");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records every frame it accepts and can be told to start failing.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        frames: Mutex<Vec<Frame>>,
        failing: AtomicBool,
        hanging: AtomicBool,
        closes: AtomicUsize,
    }

    impl RecordingTransport {
        pub(crate) fn failing() -> Self {
            let transport = Self::default();
            transport.fail();
            transport
        }

        pub(crate) fn hanging() -> Self {
            let transport = Self::default();
            transport.hanging.store(true, Ordering::SeqCst);
            transport
        }

        pub(crate) fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub(crate) fn frames(&self) -> Vec<Frame> {
            self.frames.lock().unwrap().clone()
        }

        pub(crate) fn events(&self) -> Vec<Frame> {
            self.frames()
                .into_iter()
                .filter(|f| matches!(f, Frame::Event { .. }))
                .collect()
        }

        pub(crate) fn heartbeats(&self) -> usize {
            self.frames().iter().filter(|f| f.is_heartbeat()).count()
        }

        pub(crate) fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, frame: &Frame) -> Result<(), Error> {
            if self.hanging.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::transport(TransportErrorKind::Closed));
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
