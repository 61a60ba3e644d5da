#![forbid(unsafe_code)]

//! Listener registry with set semantics and RAII unsubscription.

use std::fmt;
use std::rc::Rc;

/// A change listener. Identity is the `Rc` allocation.
pub type Listener<T> = Rc<dyn Fn(&T)>;

/// Registered listeners in registration order.
pub(crate) struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    /// Register `listener`, or return the existing id if it is already
    /// registered.
    pub(crate) fn add(&mut self, listener: Listener<T>) -> u64 {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| Rc::ptr_eq(existing, &listener))
        {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove by id. Removing an unknown id is a no-op.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(eid, _)| *eid != id);
        self.entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries.iter().map(|(_, l)| Rc::clone(l)).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Guard for a registered listener.
///
/// Dropping the guard unregisters the listener. Registering the same
/// listener twice shares one registration, so either guard removes it.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription that owns nothing.
    pub(crate) fn inert() -> Self {
        Self { unsubscribe: None }
    }

    /// Unregister now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }

    /// Whether this guard still owns a registration.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    fn run(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn add_is_idempotent_per_listener() {
        let mut subs: Subscribers<i32> = Subscribers::new();
        let l: Listener<i32> = Rc::new(|_| {});
        let a = subs.add(Rc::clone(&l));
        let b = subs.add(Rc::clone(&l));
        assert_eq!(a, b);
        assert_eq!(subs.len(), 1);
        let other: Listener<i32> = Rc::new(|_| {});
        assert_ne!(subs.add(other), a);
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut subs: Subscribers<i32> = Subscribers::new();
        let id = subs.add(Rc::new(|_| {}));
        assert!(subs.remove(id));
        assert!(!subs.remove(id));
        assert_eq!(subs.len(), 0);
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut subs: Subscribers<i32> = Subscribers::new();
        for tag in 0..3 {
            let order = Rc::clone(&order);
            subs.add(Rc::new(move |_| order.borrow_mut().push(tag)));
        }
        for l in subs.snapshot() {
            l(&0);
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn guard_runs_once() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = Subscription::new(move || c.set(c.get() + 1));
        assert!(sub.is_active());
        sub.unsubscribe();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn drop_unsubscribes_but_detach_does_not() {
        let count = Rc::new(Cell::new(0));
        {
            let c = Rc::clone(&count);
            let _sub = Subscription::new(move || c.set(c.get() + 1));
        }
        assert_eq!(count.get(), 1);
        let c = Rc::clone(&count);
        Subscription::new(move || c.set(c.get() + 1)).detach();
        assert_eq!(count.get(), 1);
        assert!(!Subscription::inert().is_active());
    }
}
