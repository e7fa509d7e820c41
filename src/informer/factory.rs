//! Shared informer factory: handler registration and event delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;

use crate::informer::source::{EventSource, WatchEvent, WatchStream};
use crate::informer::{InformerError, ResourceEvent, ResourceHandler, ResourceKind, ResourceObject};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Owns the informers of one watcher group.
///
/// Handlers are registered per kind with [`register_handler`](Self::register_handler);
/// [`start`](Self::start) then spawns one delivery loop per registered kind.
pub struct SharedInformerFactory {
    name: &'static str,
    source: Arc<dyn EventSource>,
    resync_interval: Option<Duration>,
    informers: DashMap<ResourceKind, InformerEntry>,
    started_at: OnceLock<Instant>,
}

struct InformerEntry {
    handlers: Vec<Arc<dyn ResourceHandler>>,
    status: Arc<InformerStatus>,
}

#[derive(Default)]
struct InformerStatus {
    started: AtomicBool,
    synced: AtomicBool,
    delivered: AtomicU64,
    cached: AtomicUsize,
}

/// Point-in-time view of one informer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InformerSnapshot {
    pub kind: ResourceKind,
    pub handlers: usize,
    pub started: bool,
    pub synced: bool,
    pub events_delivered: u64,
    pub cached_objects: usize,
}

impl SharedInformerFactory {
    /// A zero `resync_interval` disables periodic resync.
    pub fn new(name: &'static str, source: Arc<dyn EventSource>, resync_interval: Duration) -> Self {
        Self {
            name,
            source,
            resync_interval: (!resync_interval.is_zero()).then_some(resync_interval),
            informers: DashMap::new(),
            started_at: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wire `handler` to `kind`. Must happen before the kind's informer starts.
    pub fn register_handler(
        &self,
        kind: ResourceKind,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<(), InformerError> {
        if !self.source.supports(kind) {
            return Err(InformerError::Unsupported(kind));
        }

        let mut entry = self.informers.entry(kind).or_insert_with(|| InformerEntry {
            handlers: Vec::new(),
            status: Arc::new(InformerStatus::default()),
        });
        if entry.status.started.load(Ordering::Acquire) {
            return Err(InformerError::AlreadyStarted(kind));
        }
        entry.handlers.push(handler);

        tracing::debug!(factory = self.name, kind = %kind, handlers = entry.handlers.len(), "Handler registered");
        Ok(())
    }

    /// Start delivery for every registered kind that is not running yet.
    ///
    /// Returns the number of informers started by this call. Nothing is
    /// started once `shutdown` has fired.
    pub fn start(&self, shutdown: ShutdownSignal, tracker: &TaskTracker) -> usize {
        if shutdown.is_fired() {
            tracing::info!(factory = self.name, "Shutdown already signalled, not starting informers");
            return 0;
        }

        let mut started = 0;
        for entry in self.informers.iter() {
            let kind = *entry.key();
            if entry.status.started.swap(true, Ordering::AcqRel) {
                continue;
            }

            let handlers: Arc<[Arc<dyn ResourceHandler>]> = entry.handlers.clone().into();
            let stream = self.source.watch(kind);
            tracker.spawn(run_informer(
                kind,
                handlers,
                stream,
                entry.status.clone(),
                self.resync_interval,
                shutdown.clone(),
            ));
            metrics::record_informer_started(kind);
            started += 1;
        }

        if started > 0 {
            let _ = self.started_at.set(Instant::now());
            tracing::info!(factory = self.name, informers = started, "Informer factory started");
        }
        started
    }

    /// When delivery first began, if it has.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at.get().copied()
    }

    pub fn is_started(&self) -> bool {
        self.started_at.get().is_some()
    }

    pub fn snapshot(&self) -> Vec<InformerSnapshot> {
        let mut snapshots: Vec<_> = self
            .informers
            .iter()
            .map(|entry| InformerSnapshot {
                kind: *entry.key(),
                handlers: entry.handlers.len(),
                started: entry.status.started.load(Ordering::Acquire),
                synced: entry.status.synced.load(Ordering::Acquire),
                events_delivered: entry.status.delivered.load(Ordering::Relaxed),
                cached_objects: entry.status.cached.load(Ordering::Relaxed),
            })
            .collect();
        snapshots.sort_by_key(|s| s.kind);
        snapshots
    }
}

async fn run_informer(
    kind: ResourceKind,
    handlers: Arc<[Arc<dyn ResourceHandler>]>,
    mut stream: WatchStream,
    status: Arc<InformerStatus>,
    resync_interval: Option<Duration>,
    shutdown: ShutdownSignal,
) {
    tracing::info!(kind = %kind, handlers = handlers.len(), "Informer delivery loop started");

    let mut cache: HashMap<String, ResourceObject> = HashMap::new();
    let mut resync = resync_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(kind = %kind, "Informer received shutdown signal, exiting loop");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(WatchEvent::Apply(object))) => {
                    cache.insert(object.key(), object.clone());
                    deliver(kind, &handlers, &status, ResourceEvent::Applied(object));
                }
                Some(Ok(WatchEvent::Delete(object))) => {
                    cache.remove(&object.key());
                    deliver(kind, &handlers, &status, ResourceEvent::Deleted(object));
                }
                Some(Ok(WatchEvent::Synced)) => {
                    if !status.synced.swap(true, Ordering::AcqRel) {
                        tracing::info!(kind = %kind, objects = cache.len(), "Informer cache synced");
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(kind = %kind, error = %e, "Watch error");
                    metrics::record_watch_error(kind);
                }
                None => {
                    tracing::warn!(kind = %kind, "Watch stream ended, informer stopping");
                    break;
                }
            },
            _ = next_tick(&mut resync) => {
                tracing::debug!(kind = %kind, objects = cache.len(), "Resyncing informer cache");
                for object in cache.values() {
                    deliver(kind, &handlers, &status, ResourceEvent::Resynced(object.clone()));
                }
            }
        }
        status.cached.store(cache.len(), Ordering::Relaxed);
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn deliver(
    kind: ResourceKind,
    handlers: &[Arc<dyn ResourceHandler>],
    status: &InformerStatus,
    event: ResourceEvent,
) {
    for handler in handlers {
        handler.on_event(&event);
    }
    status.delivered.fetch_add(1, Ordering::Relaxed);
    metrics::record_resource_event(kind, event.label());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::informer::ChannelSource;
    use crate::lifecycle::Shutdown;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ResourceEvent>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<ResourceEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ResourceHandler for Recorder {
        fn on_event(&self, event: &ResourceEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn endpoint(name: &str) -> ResourceObject {
        ResourceObject::new(ResourceKind::Endpoints, Some("default"), name)
    }

    #[tokio::test]
    async fn test_register_after_start_is_rejected() {
        let source = Arc::new(ChannelSource::new());
        let factory = SharedInformerFactory::new("core", source, Duration::ZERO);
        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();

        factory
            .register_handler(ResourceKind::Endpoints, Arc::new(Recorder::default()))
            .unwrap();
        assert_eq!(factory.start(shutdown.subscribe(), &tracker), 1);
        assert_eq!(factory.start(shutdown.subscribe(), &tracker), 0);

        let err = factory
            .register_handler(ResourceKind::Endpoints, Arc::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, InformerError::AlreadyStarted(ResourceKind::Endpoints)));

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[test]
    fn test_unsupported_kind_is_rejected() {
        let source = Arc::new(ChannelSource::with_kinds(&[ResourceKind::Endpoints]));
        let factory = SharedInformerFactory::new("custom", source, Duration::ZERO);
        let err = factory
            .register_handler(ResourceKind::ApisixRoute, Arc::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, InformerError::Unsupported(ResourceKind::ApisixRoute)));
    }

    #[tokio::test]
    async fn test_nothing_delivered_before_start() {
        let source = Arc::new(ChannelSource::new());
        let factory = SharedInformerFactory::new("core", source.clone(), Duration::ZERO);
        let recorder = Arc::new(Recorder::default());
        factory
            .register_handler(ResourceKind::Endpoints, recorder.clone())
            .unwrap();

        source.apply(endpoint("web"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorder.events().is_empty());
        assert!(!source.is_watched(ResourceKind::Endpoints));

        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        factory.start(shutdown.subscribe(), &tracker);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(recorder.events(), vec![ResourceEvent::Applied(endpoint("web"))]);
        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn test_fan_out_cache_and_sync() {
        let source = Arc::new(ChannelSource::new());
        let factory = SharedInformerFactory::new("core", source.clone(), Duration::ZERO);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        factory.register_handler(ResourceKind::Endpoints, first.clone()).unwrap();
        factory.register_handler(ResourceKind::Endpoints, second.clone()).unwrap();

        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        factory.start(shutdown.subscribe(), &tracker);

        source.apply(endpoint("a"));
        source.apply(endpoint("b"));
        source.delete(endpoint("a"));
        source.mark_synced(ResourceKind::Endpoints);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.events().len(), 3);
        assert_eq!(first.events(), second.events());

        let snapshot = &factory.snapshot()[0];
        assert_eq!(snapshot.handlers, 2);
        assert!(snapshot.started && snapshot.synced);
        assert_eq!(snapshot.events_delivered, 3);
        assert_eq!(snapshot.cached_objects, 1);

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_redelivers_cache() {
        let source = Arc::new(ChannelSource::new());
        let factory = SharedInformerFactory::new("core", source.clone(), Duration::from_secs(30));
        let recorder = Arc::new(Recorder::default());
        factory.register_handler(ResourceKind::Endpoints, recorder.clone()).unwrap();

        let shutdown = Shutdown::new();
        let tracker = TaskTracker::new();
        factory.start(shutdown.subscribe(), &tracker);
        source.apply(endpoint("web"));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(recorder.events().len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            recorder.events(),
            vec![
                ResourceEvent::Applied(endpoint("web")),
                ResourceEvent::Resynced(endpoint("web")),
            ]
        );

        shutdown.trigger();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_skipped() {
        let source = Arc::new(ChannelSource::new());
        let factory = SharedInformerFactory::new("custom", source.clone(), Duration::ZERO);
        factory
            .register_handler(ResourceKind::ApisixRoute, Arc::new(Recorder::default()))
            .unwrap();

        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert_eq!(factory.start(shutdown.subscribe(), &TaskTracker::new()), 0);
        assert!(!factory.is_started());
        assert!(!source.is_watched(ResourceKind::ApisixRoute));
    }
}
