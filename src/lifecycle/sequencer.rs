//! Ordered startup of watcher groups.
//!
//! # Responsibilities
//! - Register every handler of a group before any of its events can flow
//! - Start zero-delay groups in line
//! - Start delayed groups from a cancellable timer on a tracked task
//!
//! # Design Decisions
//! - Delays are measured from the sequencer's origin (process start)
//! - A group whose delay elapses after shutdown never starts

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::task::TaskTracker;

use crate::informer::{InformerError, ResourceHandler, ResourceKind, SharedInformerFactory};
use crate::lifecycle::ShutdownSignal;

/// Name of the endpoint watcher group.
pub const CORE_GROUP: &str = "core";
/// Name of the gateway custom resource watcher group.
pub const CUSTOM_RESOURCE_GROUP: &str = "custom-resources";

/// A named set of watchers that start together.
pub struct WatcherGroup {
    name: &'static str,
    delay: Duration,
    factory: Arc<SharedInformerFactory>,
    watchers: Vec<(ResourceKind, Arc<dyn ResourceHandler>)>,
}

impl WatcherGroup {
    pub fn new(name: &'static str, factory: Arc<SharedInformerFactory>) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            factory,
            watchers: Vec::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn watch(mut self, kind: ResourceKind, handler: Arc<dyn ResourceHandler>) -> Self {
        self.watchers.push((kind, handler));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.watchers.iter().map(|(kind, _)| *kind).collect()
    }
}

/// Starts watcher groups in order, honouring each group's delay.
pub struct WatcherStartSequencer {
    origin: Instant,
    shutdown: ShutdownSignal,
    tracker: TaskTracker,
}

impl WatcherStartSequencer {
    pub fn new(origin: Instant, shutdown: ShutdownSignal, tracker: TaskTracker) -> Self {
        Self {
            origin,
            shutdown,
            tracker,
        }
    }

    /// Register the group's handlers, then start or schedule its delivery.
    ///
    /// Registration is complete when this returns. A zero delay starts
    /// delivery in line, anything else goes through [`start_delayed`](Self::start_delayed).
    pub fn start(&self, group: WatcherGroup) -> Result<(), InformerError> {
        if group.delay.is_zero() {
            self.start_now(group)
        } else {
            self.start_delayed(group)
        }
    }

    /// Register the group's handlers and begin delivery immediately.
    pub fn start_now(&self, group: WatcherGroup) -> Result<(), InformerError> {
        register(&group)?;
        group.factory.start(self.shutdown.clone(), &self.tracker);
        Ok(())
    }

    /// Register the group's handlers and begin delivery once the group's
    /// delay has elapsed since the origin, unless shutdown fires first.
    pub fn start_delayed(&self, group: WatcherGroup) -> Result<(), InformerError> {
        register(&group)?;

        let deadline = self.origin + group.delay;
        let shutdown = self.shutdown.clone();
        let tracker = self.tracker.clone();
        let WatcherGroup { name, delay, factory, .. } = group;

        tracing::info!(group = name, delay = ?delay, "Watcher group start scheduled");
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(group = name, "Shutdown before warm-up delay elapsed, group not started");
                    return;
                }
                _ = time::sleep_until(deadline) => {}
            }

            if shutdown.is_fired() {
                tracing::info!(group = name, "Shutdown already signalled, group not started");
                return;
            }
            factory.start(shutdown, &tracker);
        });

        Ok(())
    }
}

fn register(group: &WatcherGroup) -> Result<(), InformerError> {
    for (kind, handler) in &group.watchers {
        group.factory.register_handler(*kind, handler.clone())?;
    }
    tracing::info!(
        group = group.name,
        kinds = ?group.kinds(),
        "Watcher group registered"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::informer::{ChannelSource, ResourceEvent, ResourceObject};
    use crate::lifecycle::Shutdown;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Timestamps {
        seen: Mutex<Vec<(Instant, ResourceEvent)>>,
    }

    impl Timestamps {
        fn first(&self) -> Option<Instant> {
            self.seen.lock().unwrap().first().map(|(at, _)| *at)
        }

        fn len(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl ResourceHandler for Timestamps {
        fn on_event(&self, event: &ResourceEvent) {
            self.seen.lock().unwrap().push((Instant::now(), event.clone()));
        }
    }

    fn factory(name: &'static str, source: &Arc<ChannelSource>) -> Arc<SharedInformerFactory> {
        Arc::new(SharedInformerFactory::new(name, source.clone(), Duration::ZERO))
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_group_starts_in_line() {
        let source = Arc::new(ChannelSource::new());
        let core = factory(CORE_GROUP, &source);
        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        let sequencer = WatcherStartSequencer::new(Instant::now(), shutdown.subscribe(), tracker.clone());

        let handler = Arc::new(Timestamps::default());
        sequencer
            .start(WatcherGroup::new(CORE_GROUP, core.clone()).watch(ResourceKind::Endpoints, handler.clone()))
            .unwrap();

        assert!(core.is_started());
        assert!(source.is_watched(ResourceKind::Endpoints));

        source.apply(ResourceObject::new(ResourceKind::Endpoints, Some("default"), "web"));
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(handler.len(), 1);

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_before_registration_returns_are_not_delivered() {
        let source = Arc::new(ChannelSource::new());
        let custom = factory(CUSTOM_RESOURCE_GROUP, &source);
        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        let origin = Instant::now();
        let sequencer = WatcherStartSequencer::new(origin, shutdown.subscribe(), tracker.clone());

        let handler = Arc::new(Timestamps::default());
        sequencer
            .start(
                WatcherGroup::new(CUSTOM_RESOURCE_GROUP, custom.clone())
                    .with_delay(Duration::from_secs(10))
                    .watch(ResourceKind::ApisixRoute, handler.clone()),
            )
            .unwrap();
        let registered_at = Instant::now();

        // Synthetic event right after registration: buffered, not delivered.
        source.apply(ResourceObject::new(ResourceKind::ApisixRoute, Some("default"), "r1"));
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handler.len(), 0);
        assert_eq!(custom.snapshot()[0].handlers, 1);

        time::sleep(Duration::from_secs(6)).await;
        let delivered_at = handler.first().expect("event not delivered after delay");
        assert!(delivered_at >= registered_at);
        assert!(delivered_at - origin >= Duration::from_secs(10));
        assert!(delivered_at - origin < Duration::from_secs(11));

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_group_starts_inside_window() {
        let source = Arc::new(ChannelSource::new());
        let custom = factory(CUSTOM_RESOURCE_GROUP, &source);
        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        let origin = Instant::now();
        let sequencer = WatcherStartSequencer::new(origin, shutdown.subscribe(), tracker.clone());

        let mut group = WatcherGroup::new(CUSTOM_RESOURCE_GROUP, custom.clone()).with_delay(Duration::from_secs(10));
        for kind in ResourceKind::CUSTOM {
            group = group.watch(kind, Arc::new(Timestamps::default()));
        }
        sequencer.start(group).unwrap();

        time::sleep(Duration::from_millis(9_999)).await;
        assert!(!custom.is_started());

        time::sleep(Duration::from_millis(500)).await;
        let started_at = custom.started_at().expect("group did not start");
        assert!(started_at - origin >= Duration::from_secs(10));
        assert!(started_at - origin < Duration::from_secs(11));
        assert!(custom.snapshot().iter().all(|s| s.started));

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_group_never_starts_after_shutdown() {
        let source = Arc::new(ChannelSource::new());
        let custom = factory(CUSTOM_RESOURCE_GROUP, &source);
        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        let sequencer = WatcherStartSequencer::new(Instant::now(), shutdown.subscribe(), tracker.clone());

        sequencer
            .start(
                WatcherGroup::new(CUSTOM_RESOURCE_GROUP, custom.clone())
                    .with_delay(Duration::from_secs(10))
                    .watch(ResourceKind::ApisixUpstream, Arc::new(Timestamps::default())),
            )
            .unwrap();

        time::sleep(Duration::from_secs(2)).await;
        shutdown.trigger();
        tracker.close();
        tracker.wait().await;

        time::sleep(Duration::from_secs(20)).await;
        assert!(!custom.is_started());
        assert!(!source.is_watched(ResourceKind::ApisixUpstream));
    }

    #[test]
    fn test_registration_failure_is_returned() {
        let source = Arc::new(ChannelSource::with_kinds(&[ResourceKind::Endpoints]));
        let custom = factory(CUSTOM_RESOURCE_GROUP, &source);
        let sequencer = WatcherStartSequencer::new(Instant::now(), Shutdown::new().subscribe(), TaskTracker::new());

        let err = sequencer
            .start(
                WatcherGroup::new(CUSTOM_RESOURCE_GROUP, custom)
                    .with_delay(Duration::from_secs(10))
                    .watch(ResourceKind::ApisixTls, Arc::new(Timestamps::default())),
            )
            .unwrap_err();
        assert!(matches!(err, InformerError::Unsupported(ResourceKind::ApisixTls)));
    }
}
