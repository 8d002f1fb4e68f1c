//! One poller per URL, shared by every view that asks for it.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::{Error, Result};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::liveness::PollState;
use crate::poller::Poller;
use crate::ports::ProbeFactory;
use crate::probe::HttpProbeFactory;

#[derive(Clone)]
pub struct PollingService {
    inner: Arc<Inner>,
}

struct Inner {
    factory: Arc<dyn ProbeFactory>,
    polls: DashMap<String, SharedPoll>,
}

struct SharedPoll {
    poller: Poller,
    interval: Duration,
    subscribers: usize,
}

impl PollingService {
    pub fn new(factory: Arc<dyn ProbeFactory>) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                polls: DashMap::new(),
            }),
        }
    }

    /// Service whose probes GET health URLs through `client`
    pub fn http(client: &ApiClient) -> Self {
        Self::new(Arc::new(HttpProbeFactory::new(client.clone())))
    }

    /// Subscribe to the liveness of `target`, starting a poller if nobody watches it yet.
    ///
    /// The first subscriber fixes the interval for a URL; later ones share it.
    pub fn subscribe(&self, target: &str, interval: Duration) -> Result<StatusSubscription> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval(
                "poll interval must be positive".to_string(),
            ));
        }
        let url = self.inner.factory.resolve(target)?;

        let receiver = match self.inner.polls.entry(url.clone()) {
            Entry::Occupied(mut entry) => {
                let shared = entry.get_mut();
                shared.subscribers += 1;
                if shared.interval != interval {
                    debug!(
                        url = %url,
                        requested_ms = interval.as_millis() as u64,
                        active_ms = shared.interval.as_millis() as u64,
                        "Joining existing poll at its current interval"
                    );
                }
                shared.poller.subscribe()
            }
            Entry::Vacant(entry) => {
                let poller = Poller::start(self.inner.factory.probe_for(&url), interval)?;
                let receiver = poller.subscribe();
                info!(url = %url, "Shared poll started");
                entry.insert(SharedPoll {
                    poller,
                    interval,
                    subscribers: 1,
                });
                receiver
            }
        };

        Ok(StatusSubscription {
            url,
            receiver,
            inner: self.inner.clone(),
            released: false,
        })
    }

    /// Number of distinct URLs currently polled
    pub fn active_polls(&self) -> usize {
        self.inner.polls.len()
    }

    pub fn subscribers(&self, url: &str) -> usize {
        self.inner
            .polls
            .get(url)
            .map(|shared| shared.subscribers)
            .unwrap_or(0)
    }
}

impl Inner {
    /// Drop one subscriber for `url`; hands back the poller when it was the last one.
    fn release(&self, url: &str) -> Option<Poller> {
        match self.polls.entry(url.to_string()) {
            Entry::Occupied(mut entry) => {
                let shared = entry.get_mut();
                shared.subscribers = shared.subscribers.saturating_sub(1);
                if shared.subscribers == 0 {
                    info!(url = %url, "Last subscriber left, stopping shared poll");
                    Some(entry.remove().poller)
                } else {
                    None
                }
            }
            Entry::Vacant(_) => None,
        }
    }
}

impl std::fmt::Debug for PollingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingService")
            .field("active_polls", &self.inner.polls.len())
            .finish()
    }
}

/// A view's handle on a shared poll. Dropping it unsubscribes.
pub struct StatusSubscription {
    url: String,
    receiver: watch::Receiver<PollState>,
    inner: Arc<Inner>,
    released: bool,
}

impl StatusSubscription {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn current(&self) -> PollState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published state. `None` once the poll has stopped.
    pub async fn changed(&mut self) -> Option<PollState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Stream of states, starting with the current one
    pub fn into_stream(self) -> StatusStream {
        StatusStream {
            stream: WatchStream::new(self.receiver.clone()),
            _subscription: self,
        }
    }

    /// Unsubscribe, waiting for the poller to stop if this was its last subscriber.
    pub async fn unsubscribe(mut self) {
        self.released = true;
        if let Some(poller) = self.inner.release(&self.url) {
            poller.stop().await;
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            // dropping the poller cancels it
            drop(self.inner.release(&self.url));
        }
    }
}

impl std::fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("url", &self.url)
            .field("state", &*self.receiver.borrow())
            .finish()
    }
}

/// Stream over a subscription's states; keeps the subscription alive
pub struct StatusStream {
    stream: WatchStream<PollState>,
    _subscription: StatusSubscription,
}

impl Stream for StatusStream {
    type Item = PollState;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}
