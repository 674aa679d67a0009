use crate::listeners::{ListenerId, Listeners};

/// Order used for settings without a connection and for connections that
/// never call `set_order`.
pub const DEFAULT_CONNECTION_ORDER: i32 = 0;

/// State shared by every connection: scheduling order and change listeners.
#[derive(Debug)]
pub struct ConnectionBase<T> {
    order: i32,
    listeners: Listeners<T>,
    last_notified: Option<T>,
}

impl<T: Clone + PartialEq> ConnectionBase<T> {
    pub fn new() -> Self {
        Self::with_order(DEFAULT_CONNECTION_ORDER)
    }

    pub fn with_order(order: i32) -> Self {
        Self {
            order,
            listeners: Listeners::new(),
            last_notified: None,
        }
    }

    #[inline]
    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn set_order(&mut self, order: i32) {
        self.order = order;
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Record `value` as already known to listeners without notifying them.
    /// Only the first observation counts.
    pub fn observe(&mut self, value: &T) {
        if self.last_notified.is_none() {
            self.last_notified = Some(value.clone());
        }
    }

    /// Notify listeners if `value` differs from the last value they saw.
    pub fn notify_listeners_if_changed(&mut self, value: T) -> bool {
        if self.last_notified.as_ref() == Some(&value) {
            return false;
        }
        self.listeners.emit(&value);
        self.last_notified = Some(value);
        true
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }
}

impl<T: Clone + PartialEq> Default for ConnectionBase<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Live two-way binding to an external quantity of type `T`.
///
/// Implementations embed a `ConnectionBase<T>` and must call
/// `ConnectionBase::notify_listeners_if_changed` at the end of `set`.
/// When the backing source is unavailable `get` returns a neutral value and
/// `set` does nothing; neither may panic.
pub trait Connection<T: Clone + PartialEq + 'static> {
    fn base(&self) -> &ConnectionBase<T>;
    fn base_mut(&mut self) -> &mut ConnectionBase<T>;

    /// Current live value, mapped into the setting's logical range.
    fn get(&mut self) -> T;

    /// Write to live state. Idempotent writes must not notify.
    fn set(&mut self, value: T);

    /// Value treated as "no user configuration yet". Requested once per
    /// connection, before any other read.
    fn get_default(&mut self) -> T {
        self.get()
    }

    fn order(&self) -> i32 {
        self.base().order()
    }

    fn set_order(&mut self, order: i32) {
        self.base_mut().set_order(order);
    }

    fn add_change_listener(&mut self, listener: Box<dyn FnMut(&T)>) -> ListenerId {
        self.base_mut().add_listener(listener)
    }

    fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.base_mut().remove_listener(id)
    }

    /// Called when the engine's quality level changed.
    fn on_quality_changed(&mut self, _level: i32) {}

    /// Release external resources. Called by `ConnectionTable::destroy`.
    fn destroy(&mut self) {
        self.base_mut().clear_listeners();
    }
}

/// A connection whose value is an index into an enumerated label list.
///
/// The label list may change behind the connection's back (a monitor switch
/// changes the available resolutions); implementations must detect that in
/// `option_labels` instead of serving a stale cache forever.
pub trait ConnectionWithOptions<L>: Connection<i32> {
    fn has_options(&mut self) -> bool {
        !self.option_labels().is_empty()
    }

    fn option_labels(&mut self) -> Vec<L>;

    fn set_option_labels(&mut self, labels: Vec<L>);

    /// Force the label list to be recomputed.
    fn refresh_option_labels(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notifies_only_on_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut base = ConnectionBase::<i32>::new();
        {
            let seen = seen.clone();
            base.add_listener(move |v| seen.borrow_mut().push(*v));
        }

        base.observe(&3);
        assert!(!base.notify_listeners_if_changed(3));
        assert!(base.notify_listeners_if_changed(4));
        assert!(!base.notify_listeners_if_changed(4));
        assert!(base.notify_listeners_if_changed(3));

        assert_eq!(*seen.borrow(), vec![4, 3]);
    }

    #[test]
    fn observe_keeps_first_value() {
        let mut base = ConnectionBase::<i32>::new();
        base.observe(&1);
        base.observe(&2);
        assert!(!base.notify_listeners_if_changed(1));
    }
}
