//! Per-kind resource controllers.
//!
//! Each controller keeps the latest copy of every object of its kind, keyed
//! by `namespace/name`. Translation into gateway admin API calls is out of
//! scope; the controllers are the handler endpoint the informers deliver to.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::informer::{ResourceEvent, ResourceHandler, ResourceKind, ResourceObject};

/// Cache-backed handler for one resource kind.
pub struct ResourceController {
    kind: ResourceKind,
    cache: DashMap<String, ResourceObject>,
}

impl ResourceController {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            cache: DashMap::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<ResourceObject> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl ResourceHandler for ResourceController {
    fn on_event(&self, event: &ResourceEvent) {
        let object = event.object();
        if object.kind != self.kind {
            tracing::warn!(
                controller = %self.kind,
                kind = %object.kind,
                key = %object.key(),
                "Event for a different kind ignored"
            );
            return;
        }

        match event {
            ResourceEvent::Applied(object) | ResourceEvent::Resynced(object) => {
                tracing::debug!(kind = %self.kind, key = %object.key(), event = event.label(), "Object cached");
                self.cache.insert(object.key(), object.clone());
            }
            ResourceEvent::Deleted(object) => {
                tracing::debug!(kind = %self.kind, key = %object.key(), "Object evicted");
                self.cache.remove(&object.key());
            }
        }
    }
}

/// One controller per watched kind.
pub struct ControllerSet {
    controllers: BTreeMap<ResourceKind, Arc<ResourceController>>,
}

impl ControllerSet {
    pub fn new() -> Self {
        let controllers = ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(ResourceController::new(kind))))
            .collect();
        Self { controllers }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Arc<ResourceController>> {
        self.controllers.get(&kind)
    }

    /// The controller for `kind` as a handler the informers can call.
    pub fn handler(&self, kind: ResourceKind) -> Option<Arc<dyn ResourceHandler>> {
        self.controllers
            .get(&kind)
            .map(|controller| controller.clone() as Arc<dyn ResourceHandler>)
    }

    pub fn cache_sizes(&self) -> BTreeMap<ResourceKind, usize> {
        self.controllers
            .iter()
            .map(|(kind, controller)| (*kind, controller.len()))
            .collect()
    }
}

impl Default for ControllerSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str) -> ResourceObject {
        ResourceObject::new(ResourceKind::ApisixRoute, Some("default"), name)
    }

    #[test]
    fn test_apply_and_delete() {
        let controller = ResourceController::new(ResourceKind::ApisixRoute);
        controller.on_event(&ResourceEvent::Applied(route("a")));
        controller.on_event(&ResourceEvent::Applied(route("b")));
        assert_eq!(controller.len(), 2);

        controller.on_event(&ResourceEvent::Deleted(route("a")));
        assert!(controller.get("default/a").is_none());
        assert_eq!(controller.get("default/b"), Some(route("b")));
    }

    #[test]
    fn test_resync_overwrites_entry() {
        let controller = ResourceController::new(ResourceKind::ApisixRoute);
        controller.on_event(&ResourceEvent::Applied(route("a")));

        let mut updated = route("a");
        updated.resource_version = Some("42".to_string());
        controller.on_event(&ResourceEvent::Resynced(updated.clone()));

        assert_eq!(controller.len(), 1);
        assert_eq!(controller.get("default/a"), Some(updated));
    }

    #[test]
    fn test_other_kind_is_ignored() {
        let controller = ResourceController::new(ResourceKind::ApisixRoute);
        controller.on_event(&ResourceEvent::Applied(ResourceObject::new(
            ResourceKind::Endpoints,
            Some("default"),
            "web",
        )));
        assert!(controller.is_empty());
    }

    #[test]
    fn test_set_covers_every_kind() {
        let set = ControllerSet::new();
        for kind in ResourceKind::ALL {
            assert_eq!(set.get(kind).map(|c| c.kind()), Some(kind));
            assert!(set.handler(kind).is_some());
        }

        set.handler(ResourceKind::ApisixRoute)
            .unwrap()
            .on_event(&ResourceEvent::Applied(route("a")));
        let sizes = set.cache_sizes();
        assert_eq!(sizes[&ResourceKind::ApisixRoute], 1);
        assert_eq!(sizes[&ResourceKind::Endpoints], 0);
    }
}
