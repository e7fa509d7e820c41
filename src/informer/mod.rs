//! Resource watching subsystem.
//!
//! # Data Flow
//! ```text
//! EventSource (source.rs)
//!     kubernetes.rs → API server watch per kind (production)
//!     memory.rs     → in-process channels (test support)
//!         │
//!         ▼
//! SharedInformerFactory (factory.rs)
//!     one delivery loop per registered kind
//!     → local cache of the kind's objects
//!     → ResourceHandler::on_event for every registered handler
//!     → periodic resync re-delivers the cache
//! ```
//!
//! # Design Decisions
//! - Handlers are registered before delivery starts; registering after is an error
//! - Delivery loops are spawned onto a shared task tracker so shutdown can join them
//! - Watch errors are logged and counted, the loop keeps going

pub mod factory;
pub mod kubernetes;
pub mod memory;
pub mod source;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use factory::{InformerSnapshot, SharedInformerFactory};
pub use kubernetes::KubeEventSource;
pub use memory::ChannelSource;
pub use source::{EventSource, WatchEvent, WatchStream};

/// A category of tracked cluster object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Endpoints,
    ApisixRoute,
    ApisixUpstream,
    ApisixService,
    ApisixTls,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Endpoints,
        ResourceKind::ApisixRoute,
        ResourceKind::ApisixUpstream,
        ResourceKind::ApisixService,
        ResourceKind::ApisixTls,
    ];

    /// Custom resource kinds served by the gateway's CRDs.
    pub const CUSTOM: [ResourceKind; 4] = [
        ResourceKind::ApisixRoute,
        ResourceKind::ApisixUpstream,
        ResourceKind::ApisixService,
        ResourceKind::ApisixTls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Endpoints => "Endpoints",
            ResourceKind::ApisixRoute => "ApisixRoute",
            ResourceKind::ApisixUpstream => "ApisixUpstream",
            ResourceKind::ApisixService => "ApisixService",
            ResourceKind::ApisixTls => "ApisixTls",
        }
    }

    /// API group; empty for the core group.
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::Endpoints => "",
            _ => "apisix.apache.org",
        }
    }

    pub fn version(&self) -> &'static str {
        "v1"
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Endpoints => "endpoints",
            ResourceKind::ApisixRoute => "apisixroutes",
            ResourceKind::ApisixUpstream => "apisixupstreams",
            ResourceKind::ApisixService => "apisixservices",
            ResourceKind::ApisixTls => "apisixtlses",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watched object, reduced to what handlers need.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObject {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
    pub resource_version: Option<String>,
    /// Full object as returned by the API server.
    pub data: serde_json::Value,
}

impl ResourceObject {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            resource_version: None,
            data: serde_json::Value::Null,
        }
    }

    /// Cache key, `namespace/name` or `name` for cluster scoped objects.
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Change notification delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// Object was created or updated.
    Applied(ResourceObject),
    /// Object was removed.
    Deleted(ResourceObject),
    /// Periodic re-delivery of a cached object.
    Resynced(ResourceObject),
}

impl ResourceEvent {
    pub fn object(&self) -> &ResourceObject {
        match self {
            ResourceEvent::Applied(obj)
            | ResourceEvent::Deleted(obj)
            | ResourceEvent::Resynced(obj) => obj,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceEvent::Applied(_) => "applied",
            ResourceEvent::Deleted(_) => "deleted",
            ResourceEvent::Resynced(_) => "resynced",
        }
    }
}

/// Receives events for one resource kind.
///
/// Handlers are called from the kind's delivery loop, one event at a time and
/// in the order the watch produced them.
pub trait ResourceHandler: Send + Sync + 'static {
    fn on_event(&self, event: &ResourceEvent);
}

/// Error type for informer construction and operation.
#[derive(Debug, Error)]
pub enum InformerError {
    #[error("failed to load kubernetes configuration: {0}")]
    Config(String),

    #[error("failed to build kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("{0} informer already started; handlers must be registered before delivery begins")]
    AlreadyStarted(ResourceKind),

    #[error("{0} is not served by this event source")]
    Unsupported(ResourceKind),

    #[error("watch {kind} failed: {message}")]
    Watch { kind: ResourceKind, message: String },
}
