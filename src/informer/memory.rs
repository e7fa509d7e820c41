//! In-process event source backed by unbounded channels.
//!
//! Events published before an informer starts are buffered and delivered,
//! in order, once its delivery loop begins polling.

use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::informer::source::{EventSource, WatchEvent, WatchStream};
use crate::informer::{InformerError, ResourceKind, ResourceObject};

pub struct ChannelSource {
    senders: DashMap<ResourceKind, mpsc::UnboundedSender<WatchEvent>>,
    receivers: DashMap<ResourceKind, mpsc::UnboundedReceiver<WatchEvent>>,
}

impl ChannelSource {
    /// Create a source serving every resource kind.
    pub fn new() -> Self {
        Self::with_kinds(&ResourceKind::ALL)
    }

    /// Create a source serving only `kinds`.
    pub fn with_kinds(kinds: &[ResourceKind]) -> Self {
        let senders = DashMap::new();
        let receivers = DashMap::new();
        for &kind in kinds {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(kind, tx);
            receivers.insert(kind, rx);
        }
        Self { senders, receivers }
    }

    pub fn apply(&self, object: ResourceObject) {
        self.publish(object.kind, WatchEvent::Apply(object));
    }

    pub fn delete(&self, object: ResourceObject) {
        self.publish(object.kind, WatchEvent::Delete(object));
    }

    pub fn mark_synced(&self, kind: ResourceKind) {
        self.publish(kind, WatchEvent::Synced);
    }

    /// Whether an informer has taken the stream for `kind`.
    pub fn is_watched(&self, kind: ResourceKind) -> bool {
        self.senders.contains_key(&kind) && !self.receivers.contains_key(&kind)
    }

    fn publish(&self, kind: ResourceKind, event: WatchEvent) {
        match self.senders.get(&kind) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    tracing::debug!(kind = %kind, "Informer gone, dropping event");
                }
            }
            None => tracing::warn!(kind = %kind, "Kind not served by channel source"),
        }
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for ChannelSource {
    fn supports(&self, kind: ResourceKind) -> bool {
        self.senders.contains_key(&kind)
    }

    fn watch(&self, kind: ResourceKind) -> WatchStream {
        match self.receivers.remove(&kind) {
            Some((_, rx)) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (Ok(event), rx))
            })
            .boxed(),
            None => stream::iter([Err(InformerError::Watch {
                kind,
                message: "channel already watched or not served".to_string(),
            })])
            .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_events_are_delivered_in_order() {
        let source = ChannelSource::new();
        source.apply(ResourceObject::new(ResourceKind::Endpoints, Some("default"), "a"));
        source.delete(ResourceObject::new(ResourceKind::Endpoints, Some("default"), "a"));
        source.mark_synced(ResourceKind::Endpoints);

        assert!(!source.is_watched(ResourceKind::Endpoints));
        let mut stream = source.watch(ResourceKind::Endpoints);
        assert!(source.is_watched(ResourceKind::Endpoints));

        assert!(matches!(stream.next().await, Some(Ok(WatchEvent::Apply(_)))));
        assert!(matches!(stream.next().await, Some(Ok(WatchEvent::Delete(_)))));
        assert!(matches!(stream.next().await, Some(Ok(WatchEvent::Synced))));
    }

    #[tokio::test]
    async fn test_second_watch_is_an_error() {
        let source = ChannelSource::with_kinds(&[ResourceKind::ApisixRoute]);
        assert!(!source.supports(ResourceKind::Endpoints));

        let _first = source.watch(ResourceKind::ApisixRoute);
        let mut second = source.watch(ResourceKind::ApisixRoute);
        assert!(matches!(
            second.next().await,
            Some(Err(InformerError::Watch { kind: ResourceKind::ApisixRoute, .. }))
        ));
        assert!(second.next().await.is_none());
    }
}
