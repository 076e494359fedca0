// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::platform::events::ContainerEvent;
use crate::platform::messages::WorkerMessage;

/// Fans container events out to every live subscriber.
///
/// Subscriber queues are unbounded, so a slow listener never loses an
/// install or controller change. Subscribers whose receiver was dropped are
/// pruned on the next publish.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<UnboundedSender<ContainerEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ContainerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: ContainerEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn post_to_clients(&self, message: &WorkerMessage) {
        self.publish(ContainerEvent::Message(message.to_value()));
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<ContainerEvent>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
