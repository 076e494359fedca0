// SPDX-License-Identifier: GPL-3.0-only
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};
use url::Url;

use crate::platform::events::ConnectivityState;
use crate::platform::traits::ConnectivitySource;
use crate::subscription::Subscription;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reachability derived from periodically probing a health URL.
///
/// Any HTTP response counts as online; only transport failures count as
/// offline. Subscribers see transitions only.
pub struct ReachabilityProbe {
    client: Client,
    url: Url,
    online: AtomicBool,
    subscribers: Mutex<Vec<Sender<ConnectivityState>>>,
}

impl ReachabilityProbe {
    /// Build the probe and take an initial reading.
    pub async fn new(client: Client, url: Url) -> Arc<Self> {
        let probe = Arc::new(Self {
            client,
            url,
            online: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        });
        let online = probe.probe_once().await;
        probe.online.store(online, Ordering::SeqCst);
        info!(url = %probe.url, online, "Initial reachability");
        probe
    }

    async fn probe_once(&self) -> bool {
        match self
            .client
            .head(self.url.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(url = %self.url, error = %e, "Reachability probe failed");
                false
            }
        }
    }

    /// Probe once and report a transition, if there was one.
    pub async fn poll(&self) -> Option<ConnectivityState> {
        let online = self.probe_once().await;
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }

        let state = ConnectivityState::from_online(online);
        info!(state = ?state, "Reachability changed");
        self.publish(state);
        Some(state)
    }

    pub fn spawn_polling(self: &Arc<Self>, every: Duration) -> Subscription {
        let probe = Arc::clone(self);
        Subscription::spawn("reachability-probe", async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                probe.poll().await;
            }
        })
    }

    fn publish(&self, state: ConnectivityState) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            if let Err(e) = tx.try_send(state) {
                warn!(error = %e, "Failed to deliver reachability change");
            }
        }
    }
}

impl ConnectivitySource for ReachabilityProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Receiver<ConnectivityState> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }
}
