//! Boolean signal channels.

use parking_lot::Mutex;
use std::sync::Arc;

/// A writable boolean signal.
pub trait BooleanOutput: Send + Sync {
    /// Set the signal to the given value.
    fn set(&self, value: bool);
}

/// A boolean signal that pushes changes to watchers but cannot be polled.
pub trait BooleanSource: Send + Sync {
    /// Attach a watcher that receives every change from now on. The current
    /// value is not pushed on attach; push-on-subscribe is a property of the
    /// network bridge, not of local channels.
    fn watch(&self, target: Arc<dyn BooleanOutput>);
}

/// A boolean signal that can additionally be polled for its current value.
pub trait BooleanInput: BooleanSource {
    /// Read the current value.
    fn get(&self) -> bool;
}

impl<F: Fn(bool) + Send + Sync> BooleanOutput for F {
    fn set(&self, value: bool) {
        self(value)
    }
}

/// A boolean signal holding a current value and a watcher list.
pub struct BooleanCell {
    value: Mutex<bool>,
    watchers: Mutex<Vec<Arc<dyn BooleanOutput>>>,
}

impl BooleanCell {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Mutex::new(initial),
            watchers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for BooleanCell {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BooleanOutput for BooleanCell {
    fn set(&self, value: bool) {
        {
            let mut current = self.value.lock();
            if *current == value {
                return;
            }
            *current = value;
        }
        // Never hold the value lock while notifying; watchers may read back.
        let watchers: Vec<_> = self.watchers.lock().clone();
        for watcher in watchers {
            watcher.set(value);
        }
    }
}

impl BooleanSource for BooleanCell {
    fn watch(&self, target: Arc<dyn BooleanOutput>) {
        self.watchers.lock().push(target);
    }
}

impl BooleanInput for BooleanCell {
    fn get(&self) -> bool {
        *self.value.lock()
    }
}
