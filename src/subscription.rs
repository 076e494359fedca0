// SPDX-License-Identifier: GPL-3.0-only
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a spawned listener task. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: Some(tokio::spawn(future)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(subscription = self.name, "Unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
