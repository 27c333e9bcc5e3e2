//! Fire-and-forget event channels.

use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can be fired. The payload-free half of an event channel.
pub trait EventOutput: Send + Sync {
    /// Deliver one occurrence of the event.
    fn fire(&self);
}

/// A source of event occurrences that listeners can attach to.
pub trait EventInput: Send + Sync {
    /// Attach a listener that is fired on every occurrence from now on.
    fn listen(&self, listener: Arc<dyn EventOutput>);
}

impl<F: Fn() + Send + Sync> EventOutput for F {
    fn fire(&self) {
        self()
    }
}

/// An event with a listener list. Usable as both input and output: firing the
/// cell fires every attached listener.
#[derive(Default)]
pub struct EventCell {
    listeners: Mutex<Vec<Arc<dyn EventOutput>>>,
}

impl EventCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every listener attached so far.
    pub fn fire_all(&self) {
        // Snapshot under the lock; listeners may attach more listeners.
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            listener.fire();
        }
    }
}

impl EventInput for EventCell {
    fn listen(&self, listener: Arc<dyn EventOutput>) {
        self.listeners.lock().push(listener);
    }
}

impl EventOutput for EventCell {
    fn fire(&self) {
        self.fire_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cell_fires_all_listeners() {
        let cell = EventCell::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        cell.listen(Arc::new(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = count.clone();
        cell.listen(Arc::new(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        cell.fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cell_without_listeners_is_quiet() {
        let cell = EventCell::new();
        cell.fire_all();
    }
}
