use std::{collections::BTreeMap, fmt};

/// Handle returned by [`EventHub::subscribe`]. Pass it back to
/// [`EventHub::unsubscribe`] to stop receiving events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

type Callback<T> = Box<dyn FnMut(&T)>;

/// A list of callbacks notified of events of type `T`, in subscription
/// order.
pub struct EventHub<T> {
    next: u64,
    subscribers: BTreeMap<Subscription, Callback<T>>,
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            subscribers: BTreeMap::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let handle = Subscription(self.next);
        self.next += 1;
        self.subscribers.insert(handle, Box::new(callback));
        handle
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&mut self, handle: Subscription) -> bool {
        self.subscribers.remove(&handle).is_some()
    }

    pub fn emit(&mut self, event: &T) {
        for callback in self.subscribers.values_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn unsubscribed_callbacks_are_not_called() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        let a = {
            let seen = Rc::clone(&seen);
            hub.subscribe(move |x: &i32| seen.borrow_mut().push(("a", *x)))
        };
        {
            let seen = Rc::clone(&seen);
            hub.subscribe(move |x: &i32| seen.borrow_mut().push(("b", *x)));
        }
        hub.emit(&1);
        assert!(hub.unsubscribe(a));
        assert!(!hub.unsubscribe(a));
        hub.emit(&2);
        assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1), ("b", 2)]);
        assert_eq!(hub.len(), 1);
    }
}
