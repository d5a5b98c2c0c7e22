use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Received {
    Event(Event),
    Heartbeat { at: Instant },
}

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
}

pub struct Connection {
    pub label: String,
    rx: mpsc::UnboundedReceiver<Received>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, label: String) -> Result<Self> {
        let url = format!("{}/events", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?.build();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                let received = match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => match serde_json::from_str(&event.data) {
                        Ok(data) => Received::Event(Event {
                            event_type: event.event_type,
                            data,
                        }),
                        Err(e) => {
                            warn!("Unparseable event data for {}: {}", task_label, e);
                            continue;
                        }
                    },
                    Some(Ok(es::SSE::Comment(_))) => Received::Heartbeat { at: Instant::now() },
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", task_label, e);
                        continue;
                    }
                    None => {
                        debug!("SSE stream ended for {}", task_label);
                        break;
                    }
                };

                if tx.send(received).is_err() {
                    debug!("SSE receiver dropped for {}", task_label);
                    break;
                }
            }
        });

        Ok(Self {
            label,
            rx,
            _handle: handle,
        })
    }

    /// Next event of any type, skipping heartbeats. `None` means nothing
    /// arrived before the timeout.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some(Received::Event(event))) => return Ok(Some(event)),
                Ok(Some(Received::Heartbeat { .. })) => continue,
                Ok(None) => anyhow::bail!("SSE connection closed"),
                Err(_) => return Ok(None),
            }
        }
    }

    pub async fn wait_for_heartbeat(&mut self, timeout: Duration) -> Result<Instant> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some(Received::Heartbeat { at })) => return Ok(at),
                Ok(Some(Received::Event(event))) => {
                    debug!("{} saw {} while waiting for heartbeat", self.label, event.event_type);
                    continue;
                }
                Ok(None) => anyhow::bail!("SSE connection closed"),
                Err(_) => anyhow::bail!("Timeout waiting for heartbeat"),
            }
        }
    }
}
