//! # Waymark Reactive
//!
//! A minimal observable-value primitive: a boxed value exposing
//! `get`/`set`/`subscribe`, used as the change-notification backbone for
//! collections and rendering layers.
//!
//! There is no dependency tracking and no ambient global state. Code that
//! wants to react to a value subscribes to it explicitly, and code that
//! wants to skip notification calls [`Observable::set_silent`].
//!
//! ## Example
//!
//! ```
//! use waymark_reactive::Observable;
//!
//! let count = Observable::new(0);
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! let _sub = count.subscribe(move |value| sink.lock().unwrap().push(*value));
//!
//! count.set(1);
//! count.set(2);
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

struct Subscriber<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

struct Cell<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<Subscriber<T>>>,
    next_id: AtomicU64,
}

/// A shared, observable value.
///
/// Cloning an `Observable` clones the *handle*: both handles read and write
/// the same underlying cell and share one subscriber list.
///
/// Notification is synchronous and runs in subscription order. Subscribers
/// are invoked outside the value lock, so a callback may freely call
/// [`Observable::get`] or even [`Observable::subscribe`]; a subscription
/// dropped during dispatch stops receiving values no later than the next
/// notification.
pub struct Observable<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Guard for an active subscription.
///
/// The subscription is detached when this guard is dropped or when
/// [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Detaches the subscription.
    pub fn unsubscribe(self) {
        // Drop impl does the work.
    }

    /// Keeps the subscription alive for the lifetime of the observable by
    /// leaking the guard.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    /// Creates a new observable holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Cell {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.cell.value.lock().expect("observable poisoned").clone()
    }

    /// Runs `f` with a reference to the current value, without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.lock().expect("observable poisoned"))
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        let snapshot = {
            let mut guard = self.cell.value.lock().expect("observable poisoned");
            *guard = value;
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Replaces the value without notifying subscribers.
    ///
    /// This is the explicit opt-out for writes that must not trigger
    /// reactions, e.g. hydrating state that observers already know about.
    pub fn set_silent(&self, value: T) {
        let mut guard = self.cell.value.lock().expect("observable poisoned");
        *guard = value;
    }

    /// Mutates the value in place and notifies subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut guard = self.cell.value.lock().expect("observable poisoned");
            f(&mut guard);
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Registers `callback` to run after every notifying write.
    ///
    /// The callback does not run for the current value; only for subsequent
    /// changes.
    pub fn subscribe(&self, callback: impl FnMut(&T) + Send + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let subscriber = Subscriber {
            id: self.cell.next_id.fetch_add(1, Ordering::Relaxed),
            active: Arc::clone(&active),
            callback: Box::new(callback),
        };
        self.cell
            .subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(subscriber);
        Subscription { active }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.cell
            .subscribers
            .lock()
            .expect("subscriber list poisoned")
            .iter()
            .filter(|s| s.active.load(Ordering::SeqCst))
            .count()
    }

    fn notify(&self, value: &T) {
        // Take the subscriber list so callbacks run without the lock held.
        // Subscriptions created by a callback land in the (now empty) list
        // and are merged back afterwards, preserving registration order.
        let mut current: Vec<Subscriber<T>> = {
            let mut subs = self
                .cell
                .subscribers
                .lock()
                .expect("subscriber list poisoned");
            std::mem::take(&mut *subs)
        };

        for subscriber in current.iter_mut() {
            if subscriber.active.load(Ordering::SeqCst) {
                (subscriber.callback)(value);
            }
        }

        let mut subs = self
            .cell
            .subscribers
            .lock()
            .expect("subscriber list poisoned");
        let newcomers = std::mem::take(&mut *subs);
        current.retain(|s| s.active.load(Ordering::SeqCst));
        current.extend(newcomers);
        current.sort_by_key(|s| s.id);
        *subs = current;
    }
}

impl<T: Clone + Send + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_set() {
        let value = Observable::new(7);
        assert_eq!(value.get(), 7);
        value.set(11);
        assert_eq!(value.get(), 11);
    }

    #[test]
    fn test_subscribe_receives_changes() {
        let value = Observable::new(String::from("a"));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _sub = value.subscribe(move |v: &String| sink.lock().unwrap().push(v.clone()));

        value.set("b".to_string());
        value.update(|v| v.push('c'));

        assert_eq!(*seen.lock().unwrap(), vec!["b".to_string(), "bc".to_string()]);
    }

    #[test]
    fn test_set_silent_skips_subscribers() {
        let value = Observable::new(0);
        let seen = Arc::new(Mutex::new(0usize));

        let sink = seen.clone();
        let _sub = value.subscribe(move |_| *sink.lock().unwrap() += 1);

        value.set_silent(5);
        assert_eq!(value.get(), 5);
        assert_eq!(*seen.lock().unwrap(), 0);

        value.set(6);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_dropping_subscription_detaches() {
        let value = Observable::new(0);
        let seen = Arc::new(Mutex::new(0usize));

        let sink = seen.clone();
        let sub = value.subscribe(move |_| *sink.lock().unwrap() += 1);

        value.set(1);
        sub.unsubscribe();
        value.set(2);

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(value.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_does_not_panic() {
        let value = Observable::new(0);
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = slot.clone();
        let sub = value.subscribe(move |_| {
            // Detach ourselves from inside the callback.
            if let Some(sub) = inner.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        value.set(1);
        value.set(2);
        assert_eq!(value.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_during_dispatch() {
        let value = Observable::new(0);
        let seen = Arc::new(Mutex::new(0usize));

        let observable = value.clone();
        let sink = seen.clone();
        let late = Arc::new(Mutex::new(None));
        let late_slot = late.clone();
        let _sub = value.subscribe(move |v| {
            if *v == 1 {
                let sink = sink.clone();
                let sub = observable.subscribe(move |_| *sink.lock().unwrap() += 1);
                *late_slot.lock().unwrap() = Some(sub);
            }
        });

        value.set(1);
        // The late subscriber sees the next write.
        value.set(2);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_clone_shares_cell() {
        let a = Observable::new(1);
        let b = a.clone();
        b.set(9);
        assert_eq!(a.get(), 9);
    }
}
