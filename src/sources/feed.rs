//! Channel-backed live source

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use super::{LiveSource, SourceError, Subscription, Unsubscribe};
use crate::Fix;

type Event = Result<Fix, SourceError>;

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<Event>>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

/// Live source fed by a [`FixPublisher`].
///
/// Each `watch` registers an independent bounded queue; events published
/// while nobody watches are lost.
#[derive(Clone, Debug)]
pub struct FixFeed {
    registry: SharedRegistry,
    capacity: usize,
}

/// Producer side of a [`FixFeed`]
#[derive(Clone, Debug)]
pub struct FixPublisher {
    registry: SharedRegistry,
}

impl FixFeed {
    pub fn channel(capacity: usize) -> (FixFeed, FixPublisher) {
        let registry = SharedRegistry::default();

        (
            FixFeed {
                registry: Arc::clone(&registry),
                capacity: capacity.max(1),
            },
            FixPublisher { registry },
        )
    }
}

impl LiveSource for FixFeed {
    fn watch(&mut self) -> Result<Subscription, SourceError> {
        let (tx, rx) = mpsc::channel(self.capacity);

        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.insert(id, tx);
            id
        };

        let fixes = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        let registry = Arc::clone(&self.registry);
        let handle = Unsubscribe::new(move || {
            registry.lock().subscribers.remove(&id);
        });

        Ok(Subscription {
            fixes: Box::pin(fixes),
            handle,
        })
    }
}

impl FixPublisher {
    /// Publish a fix; returns how many subscriptions received it
    pub fn publish(&self, fix: Fix) -> usize {
        self.send(Ok(fix))
    }

    /// Publish a source failure
    pub fn fail(&self, error: SourceError) -> usize {
        self.send(Err(error))
    }

    /// Subscriptions currently open
    pub fn subscribers(&self) -> usize {
        self.registry
            .lock()
            .subscribers
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn send(&self, event: Event) -> usize {
        let mut delivered = 0;

        self.registry
            .lock()
            .subscribers
            .retain(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subscription = *id, "Fix feed subscriber lagging, event dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });

        delivered
    }
}
