//! Event source abstraction behind the informers.

use futures_util::stream::BoxStream;

use crate::informer::{InformerError, ResourceKind, ResourceObject};

/// Raw watch output for one kind, before caching and fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Apply(ResourceObject),
    Delete(ResourceObject),
    /// The initial listing has been fully delivered.
    Synced,
}

pub type WatchStream = BoxStream<'static, Result<WatchEvent, InformerError>>;

/// Produces watch streams for resource kinds.
///
/// `watch` only builds the stream; nothing is read from the cluster until the
/// stream is polled by an informer's delivery loop.
pub trait EventSource: Send + Sync + 'static {
    fn supports(&self, _kind: ResourceKind) -> bool {
        true
    }

    fn watch(&self, kind: ResourceKind) -> WatchStream;
}
