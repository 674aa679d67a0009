use super::base::{Connection, ConnectionBase, ConnectionWithOptions};

type Getter<T> = Box<dyn FnMut() -> T>;
type Setter<T> = Box<dyn FnMut(T)>;

/// Connection built from a getter and a setter closure.
///
/// After every `set` the live value is read back through the getter, so a
/// setter that clamps or snaps its input notifies with the snapped value.
pub struct CallbackConnection<T: Clone + PartialEq + 'static> {
    base: ConnectionBase<T>,
    getter: Getter<T>,
    setter: Setter<T>,
    default: Option<T>,
}

impl<T: Clone + PartialEq + 'static> CallbackConnection<T> {
    pub fn new(getter: impl FnMut() -> T + 'static, setter: impl FnMut(T) + 'static) -> Self {
        Self {
            base: ConnectionBase::new(),
            getter: Box::new(getter),
            setter: Box::new(setter),
            default: None,
        }
    }

    /// Report `default` from `get_default` instead of the first live read.
    pub fn with_default(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.base.set_order(order);
        self
    }
}

impl<T: Clone + PartialEq + 'static> Connection<T> for CallbackConnection<T> {
    fn base(&self) -> &ConnectionBase<T> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<T> {
        &mut self.base
    }

    fn get(&mut self) -> T {
        (self.getter)()
    }

    fn set(&mut self, value: T) {
        (self.setter)(value);
        let current = (self.getter)();
        self.base.notify_listeners_if_changed(current);
    }

    fn get_default(&mut self) -> T {
        match &self.default {
            Some(default) => default.clone(),
            None => (self.getter)(),
        }
    }
}

/// Index connection over a label list produced by a closure.
///
/// Labels are cached; the cache is rebuilt on `refresh_option_labels` or
/// whenever the optional `fingerprint` closure reports a different value
/// than it did when the cache was built.
pub struct OptionsConnection<L: Clone + 'static> {
    inner: CallbackConnection<i32>,
    labels_source: Box<dyn FnMut() -> Vec<L>>,
    fingerprint: Option<Box<dyn FnMut() -> u64>>,
    last_fingerprint: Option<u64>,
    labels: Option<Vec<L>>,
}

impl<L: Clone + 'static> OptionsConnection<L> {
    pub fn new(
        labels: impl FnMut() -> Vec<L> + 'static,
        getter: impl FnMut() -> i32 + 'static,
        setter: impl FnMut(i32) + 'static,
    ) -> Self {
        Self {
            inner: CallbackConnection::new(getter, setter),
            labels_source: Box::new(labels),
            fingerprint: None,
            last_fingerprint: None,
            labels: None,
        }
    }

    /// Invalidate the label cache whenever `fingerprint` changes.
    pub fn with_fingerprint(mut self, fingerprint: impl FnMut() -> u64 + 'static) -> Self {
        self.fingerprint = Some(Box::new(fingerprint));
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.inner.base.set_order(order);
        self
    }

    fn max_index(&mut self) -> i32 {
        (self.option_labels().len() as i32 - 1).max(0)
    }
}

impl<L: Clone + 'static> Connection<i32> for OptionsConnection<L> {
    fn base(&self) -> &ConnectionBase<i32> {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut ConnectionBase<i32> {
        self.inner.base_mut()
    }

    fn get(&mut self) -> i32 {
        let max = self.max_index();
        self.inner.get().clamp(0, max)
    }

    fn set(&mut self, index: i32) {
        let max = self.max_index();
        self.inner.set(index.clamp(0, max));
    }
}

impl<L: Clone + 'static> ConnectionWithOptions<L> for OptionsConnection<L> {
    fn option_labels(&mut self) -> Vec<L> {
        if let Some(fingerprint) = self.fingerprint.as_mut() {
            let current = fingerprint();
            if self.last_fingerprint != Some(current) {
                self.last_fingerprint = Some(current);
                self.labels = None;
            }
        }

        if self.labels.is_none() {
            self.labels = Some((self.labels_source)());
        }
        self.labels.clone().unwrap_or_default()
    }

    fn set_option_labels(&mut self, labels: Vec<L>) {
        self.labels = Some(labels);
    }

    fn refresh_option_labels(&mut self) {
        self.labels = None;
        self.option_labels();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn set_notifies_with_snapped_value() {
        let live = Rc::new(Cell::new(0.0f32));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut connection = {
            let (get, set) = (live.clone(), live.clone());
            CallbackConnection::new(move || get.get(), move |v: f32| set.set((v / 10.0).round() * 10.0))
        };
        {
            let seen = seen.clone();
            connection.add_change_listener(Box::new(move |v: &f32| seen.borrow_mut().push(*v)));
        }

        connection.set(47.0);
        connection.set(52.0); // snaps to 50 again
        connection.set(61.0);

        assert_eq!(*seen.borrow(), vec![50.0, 60.0]);
    }

    #[test]
    fn options_cache_follows_fingerprint() {
        let modes = Rc::new(RefCell::new(vec!["a".to_string(), "b".to_string()]));
        let monitor = Rc::new(Cell::new(1u64));
        let index = Rc::new(Cell::new(0));

        let mut connection = {
            let (modes, monitor) = (modes.clone(), monitor.clone());
            let (get, set) = (index.clone(), index.clone());
            OptionsConnection::new(move || modes.borrow().clone(), move || get.get(), move |i| set.set(i))
                .with_fingerprint(move || monitor.get())
        };

        assert_eq!(connection.option_labels().len(), 2);
        modes.borrow_mut().push("c".to_string());
        assert_eq!(connection.option_labels().len(), 2, "cached until the fingerprint moves");
        monitor.set(2);
        assert_eq!(connection.option_labels().len(), 3);

        connection.set(10);
        assert_eq!(connection.get(), 2);
    }
}
