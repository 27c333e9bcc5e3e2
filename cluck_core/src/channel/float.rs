//! Float signal channels. Values are `f32` to match the 4-byte wire format.

use parking_lot::Mutex;
use std::sync::Arc;

/// A writable float signal.
pub trait FloatOutput: Send + Sync {
    /// Set the signal to the given value.
    fn set(&self, value: f32);
}

/// A float signal that pushes changes to watchers but cannot be polled.
pub trait FloatSource: Send + Sync {
    /// Attach a watcher that receives every change from now on.
    fn watch(&self, target: Arc<dyn FloatOutput>);
}

/// A float signal that can additionally be polled for its current value.
pub trait FloatInput: FloatSource {
    /// Read the current value.
    fn get(&self) -> f32;
}

impl<F: Fn(f32) + Send + Sync> FloatOutput for F {
    fn set(&self, value: f32) {
        self(value)
    }
}

/// A float signal holding a current value and a watcher list.
pub struct FloatCell {
    value: Mutex<f32>,
    watchers: Mutex<Vec<Arc<dyn FloatOutput>>>,
}

impl FloatCell {
    pub fn new(initial: f32) -> Self {
        Self {
            value: Mutex::new(initial),
            watchers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for FloatCell {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl FloatOutput for FloatCell {
    fn set(&self, value: f32) {
        {
            let mut current = self.value.lock();
            // Bit comparison so NaN writes settle instead of renotifying.
            if current.to_bits() == value.to_bits() {
                return;
            }
            *current = value;
        }
        let watchers: Vec<_> = self.watchers.lock().clone();
        for watcher in watchers {
            watcher.set(value);
        }
    }
}

impl FloatSource for FloatCell {
    fn watch(&self, target: Arc<dyn FloatOutput>) {
        self.watchers.lock().push(target);
    }
}

impl FloatInput for FloatCell {
    fn get(&self) -> f32 {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_and_get() {
        let cell = FloatCell::new(0.5);
        assert_relative_eq!(cell.get(), 0.5);
        cell.set(2.25);
        assert_relative_eq!(cell.get(), 2.25);
    }

    #[test]
    fn test_unchanged_value_is_not_renotified() {
        let cell = FloatCell::new(1.0);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        cell.watch(Arc::new(move |_: f32| {
            s.fetch_add(1, Ordering::SeqCst);
        }));
        cell.set(1.0);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        cell.set(-1.0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
