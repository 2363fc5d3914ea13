//! Single-slot, replay-on-subscribe signals
//!
//! The basic communication primitive of the tree: at most one current value
//! and at most one subscriber. A push overwrites the slot and delivers the
//! value synchronously on the pusher's thread; a subscriber registered
//! after a push gets the stored value replayed exactly once.

use parking_lot::Mutex;

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Single-slot value broadcaster.
///
/// Push/subscribe pairs are serialized per instance by the delivery lock,
/// so no push is lost and no replay is duplicated under concurrent
/// callers. The value slot has its own lock: `poll` never contends with a
/// delivery in progress, and a delivery callback may poll the very signal
/// that is mid-push.
pub struct Signal<T> {
    value: Mutex<Option<T>>,
    delivery: Mutex<Option<Callback<T>>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            delivery: Mutex::new(None),
        }
    }
}

impl<T: Clone> Signal<T> {
    /// Store `value` and synchronously invoke the subscriber, if any.
    pub fn push(&self, value: T) {
        let mut delivery = self.delivery.lock();
        *self.value.lock() = Some(value.clone());
        if let Some(callback) = delivery.as_mut() {
            callback(&value);
        }
    }

    /// Compute the value inside the delivery critical section, then push it.
    ///
    /// Concurrent producers serialize here, so the slot always ends up
    /// holding the most recently computed value. Used for aggregate pushes
    /// whose inputs must be read under the same exclusion as the push.
    pub fn push_with(&self, produce: impl FnOnce() -> T) {
        let mut delivery = self.delivery.lock();
        let value = produce();
        *self.value.lock() = Some(value.clone());
        if let Some(callback) = delivery.as_mut() {
            callback(&value);
        }
    }

    /// Current value, or `None` if nothing has been pushed yet.
    pub fn poll(&self) -> Option<T> {
        self.value.lock().clone()
    }

    /// Register `callback`, replacing any prior subscriber.
    ///
    /// A stored value is replayed to the new subscriber before this
    /// returns.
    pub fn subscribe(&self, callback: impl FnMut(&T) + Send + 'static) {
        let mut delivery = self.delivery.lock();
        let mut callback: Callback<T> = Box::new(callback);
        let current = self.value.lock().clone();
        if let Some(value) = current {
            callback(&value);
        }
        *delivery = Some(callback);
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a signal: poll or subscribe, never push.
#[derive(Clone, Copy)]
pub struct Receiver<'a, T>(&'a Signal<T>);

impl<'a, T: Clone> Receiver<'a, T> {
    pub(crate) fn new(signal: &'a Signal<T>) -> Self {
        Self(signal)
    }

    pub fn poll(&self) -> Option<T> {
        self.0.poll()
    }

    pub fn subscribe(&self, callback: impl FnMut(&T) + Send + 'static) {
        self.0.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn poll_is_none_before_first_push() {
        let signal: Signal<u32> = Signal::new();
        assert_eq!(signal.poll(), None);
    }

    #[test]
    fn push_overwrites_the_slot() {
        let signal = Signal::new();
        signal.push(1);
        signal.push(2);
        assert_eq!(signal.poll(), Some(2));
    }

    #[test]
    fn stored_value_is_replayed_to_a_late_subscriber_once() {
        let signal = Signal::new();
        signal.push(5);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        signal.subscribe(move |v: &u32| sink.lock().push(*v));
        assert_eq!(*seen.lock(), vec![5]);
        signal.push(7);
        assert_eq!(*seen.lock(), vec![5, 7]);
    }

    #[test]
    fn a_new_subscriber_replaces_the_old_one() {
        let signal = Signal::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = first.clone();
        signal.subscribe(move |v: &u32| sink.lock().push(*v));
        signal.push(1);
        let sink = second.clone();
        signal.subscribe(move |v: &u32| sink.lock().push(*v));
        signal.push(2);
        assert_eq!(*first.lock(), vec![1]);
        assert_eq!(*second.lock(), vec![1, 2]); // replay of 1, then 2
    }

    #[test]
    fn push_with_computes_inside_the_critical_section() {
        let signal = Signal::new();
        signal.push_with(|| 21 * 2);
        assert_eq!(signal.poll(), Some(42));
    }

    #[test]
    fn a_callback_may_poll_its_own_signal() {
        let signal = Arc::new(Signal::new());
        let inner = signal.clone();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        signal.subscribe(move |_: &u32| {
            *sink.lock() = inner.poll();
        });
        signal.push(9);
        assert_eq!(*seen.lock(), Some(9));
    }

    #[test]
    fn no_push_is_lost_across_threads() {
        let signal = Arc::new(Signal::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        signal.subscribe(move |v: &u32| sink.lock().push(*v));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        signal.push(t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let seen = seen.lock();
        assert_eq!(seen.len(), 1000);
        // The slot holds whatever was delivered last.
        assert_eq!(signal.poll(), seen.last().copied());
    }
}
