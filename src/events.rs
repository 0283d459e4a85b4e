//! Push notifications from the backend (new transactions, budget prompts,
//! surplus alerts) as a typed, re-subscribable stream.
//!
//! The orchestrators never read this feed. It exists for the transcript,
//! and it is the reason splits refetch the surplus before acting.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::notifier::{Level, Notification, NotificationSink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAlert {
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Registered { wallet_address: String },
    TransactionReceived(TransactionAlert),
    BudgetEnded { reply: String },
    SurplusDetected { reply: String },
}

#[derive(Deserialize)]
struct Reply {
    reply: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registered {
    wallet_address: String,
}

/// Raw `{"event": .., "data": ..}` frame as delivered by the socket.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushEvent {
    /// `Ok(None)` for event names we do not handle.
    pub fn from_frame(name: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        let ev = match name {
            "registered" => {
                let r: Registered = serde_json::from_value(data)?;
                PushEvent::Registered { wallet_address: r.wallet_address }
            }
            "new_tx" => PushEvent::TransactionReceived(serde_json::from_value(data)?),
            "budget_ended_prompt" => {
                PushEvent::BudgetEnded { reply: serde_json::from_value::<Reply>(data)?.reply }
            }
            "surplus_detected" => {
                PushEvent::SurplusDetected { reply: serde_json::from_value::<Reply>(data)?.reply }
            }
            _ => return Ok(None),
        };
        Ok(Some(ev))
    }

    /// Transcript line, if the event is user-visible.
    pub fn to_notification(&self) -> Option<Notification> {
        match self {
            PushEvent::Registered { .. } => None,
            PushEvent::TransactionReceived(tx) => Some(Notification::ai(
                Level::Info,
                format!("Transaction Alert: {} {} - {} ({})", tx.amount, tx.currency, tx.kind, tx.category),
            )),
            PushEvent::BudgetEnded { reply } | PushEvent::SurplusDetected { reply } => {
                Some(Notification::ai(Level::Info, reply.clone()))
            }
        }
    }
}

/// Fan-out point for push events. Subscribing again after a stream ends
/// starts a fresh stream from the next published event.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<PushEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn publish_frame(&self, frame: Frame) -> usize {
        match PushEvent::from_frame(&frame.event, frame.data) {
            Ok(Some(ev)) => self.publish(ev),
            Ok(None) => {
                debug!(event = %frame.event, "events.ignored");
                0
            }
            Err(e) => {
                warn!(event = %frame.event, error = %e, "events.bad_payload");
                0
            }
        }
    }

    /// Lazy stream of events published from now on. Lagging readers skip ahead.
    pub fn subscribe(&self) -> impl Stream<Item = PushEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|r| async move {
            match r {
                Ok(ev) => Some(ev),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(missed = n, "events.lagged");
                    None
                }
            }
        })
    }
}

/// Appends every user-visible event to `sink` until the stream ends.
pub async fn forward<S>(events: S, sink: Arc<dyn NotificationSink>) -> usize
where
    S: Stream<Item = PushEvent>,
{
    let mut events = Box::pin(events);
    let mut n = 0;
    while let Some(ev) = events.next().await {
        if let Some(note) = ev.to_notification() {
            sink.post(note).await;
            n += 1;
        }
    }
    n
}
