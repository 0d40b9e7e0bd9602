//! One [`Topic`] per build: a sequence counter, a bounded history for late
//! subscribers, and a `tokio::sync::broadcast` channel for live delivery. A
//! subscriber that falls too far behind the broadcast channel's capacity
//! gets `Lagged` from `recv` rather than stalling the publisher; we treat
//! that as the subscription being closed, matching the backpressure policy.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use forgepipe_core::event::{Event, EventKind};
use forgepipe_core::ids::BuildId;

use crate::error::BusError;

struct Topic {
    seq: AtomicU64,
    history: std::sync::Mutex<VecDeque<Event>>,
    history_length: usize,
    sender: broadcast::Sender<Event>,
}

impl Topic {
    fn new(history_length: usize, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            seq: AtomicU64::new(0),
            history: std::sync::Mutex::new(VecDeque::with_capacity(history_length)),
            history_length,
            sender,
        }
    }

    fn publish(&self, build_id: BuildId, kind: EventKind) -> Event {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            build_id,
            seq,
            ts: Utc::now(),
            kind,
        };

        let mut history = self.history.lock().expect("progress topic history mutex poisoned");
        if history.len() == self.history_length {
            history.pop_front();
        }
        history.push_back(event.clone());
        drop(history);

        // No receivers is not an error: a build with nobody watching still
        // runs to completion.
        let _ = self.sender.send(event.clone());
        event
    }

    fn backlog(&self) -> Vec<Event> {
        self.history
            .lock()
            .expect("progress topic history mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

/// A live subscription: the backlog replays first, then events delivered
/// after the subscriber attached.
pub struct Subscription {
    backlog: VecDeque<Event>,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Returns `None` once the topic is closed or this subscriber has fallen
    /// behind far enough to be dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_) | broadcast::error::RecvError::Closed) => None,
        }
    }
}

pub struct ProgressBus {
    history_length: usize,
    channel_capacity: usize,
    topics: RwLock<HashMap<BuildId, Arc<Topic>>>,
}

impl ProgressBus {
    #[must_use]
    pub fn new(history_length: usize, slow_subscriber_drop_threshold: usize) -> Self {
        Self {
            history_length,
            channel_capacity: slow_subscriber_drop_threshold,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event, creating the build's topic on first use.
    pub async fn publish(&self, build_id: BuildId, kind: EventKind) -> Event {
        let topic = self.topic_for(build_id).await;
        topic.publish(build_id, kind)
    }

    /// Open a subscription, creating the build's topic on first use. The
    /// caller receives the retained history immediately, then live events.
    pub async fn subscribe(&self, build_id: BuildId) -> Subscription {
        let topic = self.topic_for(build_id).await;
        Subscription {
            backlog: topic.backlog().into(),
            receiver: topic.sender.subscribe(),
        }
    }

    /// Drop a build's topic. Any subscriber mid-`recv` sees the channel
    /// close and its `recv` returns `None` on its next poll.
    pub async fn close(&self, build_id: BuildId) -> Result<(), BusError> {
        let mut topics = self.topics.write().await;
        topics
            .remove(&build_id)
            .map(|_| ())
            .ok_or_else(|| BusError::NoSuchTopic(build_id.to_string()))
    }

    async fn topic_for(&self, build_id: BuildId) -> Arc<Topic> {
        if let Some(topic) = self.topics.read().await.get(&build_id) {
            return Arc::clone(topic);
        }
        let mut topics = self.topics.write().await;
        Arc::clone(
            topics
                .entry(build_id)
                .or_insert_with(|| Arc::new(Topic::new(self.history_length, self.channel_capacity))),
        )
    }
}
