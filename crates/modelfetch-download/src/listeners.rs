//! Listener fan-out.
//!
//! Events go to every registered listener. A listener that panics is
//! logged and skipped; it never reaches the download pipeline.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use modelfetch_core::{DownloadEvent, DownloadListener, ListenerId};

/// The set of listeners attached to a manager.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn DownloadListener>)>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn DownloadListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener.
    pub fn emit(&self, event: &DownloadEvent) {
        // Snapshot so listeners may add/remove listeners re-entrantly.
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                tracing::warn!(
                    target: "modelfetch.download",
                    id = %event.id(),
                    "Download listener panicked; event dropped for that listener"
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Forwards events into a broadcast channel for async consumers.
///
/// Slow receivers lag and lose the oldest events rather than blocking
/// the worker.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: broadcast::Sender<DownloadEvent>,
}

impl ChannelListener {
    /// Create a listener and its first receiver.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<DownloadEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }
}

impl DownloadListener for ChannelListener {
    fn on_event(&self, event: &DownloadEvent) {
        // No receivers is not an error.
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelfetch_core::DownloadId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockListener {
        events: Mutex<Vec<DownloadEvent>>,
    }

    impl DownloadListener for MockListener {
        fn on_event(&self, event: &DownloadEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct PanickingListener;

    impl DownloadListener for PanickingListener {
        fn on_event(&self, _event: &DownloadEvent) {
            panic!("listener bug");
        }
    }

    fn paused() -> DownloadEvent {
        DownloadEvent::Paused {
            id: DownloadId::new("d1"),
        }
    }

    #[test]
    fn test_emit_reaches_all_listeners() {
        let set = ListenerSet::new();
        let a = Arc::new(MockListener::default());
        let b = Arc::new(MockListener::default());
        set.add(a.clone());
        set.add(b.clone());

        set.emit(&paused());

        assert_eq!(a.events.lock().unwrap().len(), 1);
        assert_eq!(b.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let set = ListenerSet::new();
        let after = Arc::new(MockListener::default());
        set.add(Arc::new(PanickingListener));
        set.add(after.clone());

        set.emit(&paused());
        set.emit(&paused());

        assert_eq!(after.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_listener() {
        let set = ListenerSet::new();
        let listener = Arc::new(MockListener::default());
        let id = set.add(listener.clone());
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());

        set.emit(&paused());
        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_listener_forwards() {
        let (listener, mut rx) = ChannelListener::new(8);
        let mut second = listener.subscribe();
        listener.on_event(&paused());

        assert_eq!(rx.recv().await.unwrap(), paused());
        assert_eq!(second.recv().await.unwrap(), paused());
    }

    #[test]
    fn test_channel_listener_without_receivers() {
        let (listener, rx) = ChannelListener::new(1);
        drop(rx);
        listener.on_event(&paused());
    }
}
