use super::base::{Connection, ConnectionWithOptions};
use crate::input::KeyCombination;
use crate::listeners::ListenerId;
use crate::value::{Color, DataType, OptionLabels, SettingValue};
use std::fmt;

/// A connection of any supported value kind.
pub enum AnyConnection {
    Bool(Box<dyn Connection<bool>>),
    Int(Box<dyn Connection<i32>>),
    Float(Box<dyn Connection<f32>>),
    String(Box<dyn Connection<String>>),
    Color(Box<dyn Connection<Color>>),
    Option(Box<dyn ConnectionWithOptions<String>>),
    ColorOption(Box<dyn ConnectionWithOptions<Color>>),
    KeyCombination(Box<dyn Connection<KeyCombination>>),
}

/// Run `$body` against the typed connection inside any variant.
macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            AnyConnection::Bool($c) => $body,
            AnyConnection::Int($c) => $body,
            AnyConnection::Float($c) => $body,
            AnyConnection::String($c) => $body,
            AnyConnection::Color($c) => $body,
            AnyConnection::Option($c) => $body,
            AnyConnection::ColorOption($c) => $body,
            AnyConnection::KeyCombination($c) => $body,
        }
    };
}

impl AnyConnection {
    pub fn bool(connection: impl Connection<bool> + 'static) -> Self {
        AnyConnection::Bool(Box::new(connection))
    }

    pub fn int(connection: impl Connection<i32> + 'static) -> Self {
        AnyConnection::Int(Box::new(connection))
    }

    pub fn float(connection: impl Connection<f32> + 'static) -> Self {
        AnyConnection::Float(Box::new(connection))
    }

    pub fn string(connection: impl Connection<String> + 'static) -> Self {
        AnyConnection::String(Box::new(connection))
    }

    pub fn color(connection: impl Connection<Color> + 'static) -> Self {
        AnyConnection::Color(Box::new(connection))
    }

    pub fn option(connection: impl ConnectionWithOptions<String> + 'static) -> Self {
        AnyConnection::Option(Box::new(connection))
    }

    pub fn color_option(connection: impl ConnectionWithOptions<Color> + 'static) -> Self {
        AnyConnection::ColorOption(Box::new(connection))
    }

    pub fn key_combination(connection: impl Connection<KeyCombination> + 'static) -> Self {
        AnyConnection::KeyCombination(Box::new(connection))
    }

    /// Data type of the settings this connection can serve.
    pub fn data_type(&self) -> DataType {
        match self {
            AnyConnection::Bool(_) => DataType::Bool,
            AnyConnection::Int(_) => DataType::Int,
            AnyConnection::Float(_) => DataType::Float,
            AnyConnection::String(_) => DataType::String,
            AnyConnection::Color(_) => DataType::Color,
            AnyConnection::Option(_) => DataType::Option,
            AnyConnection::ColorOption(_) => DataType::ColorOption,
            AnyConnection::KeyCombination(_) => DataType::KeyCombination,
        }
    }

    pub fn order(&self) -> i32 {
        dispatch!(self, c => c.order())
    }

    pub fn set_order(&mut self, order: i32) {
        dispatch!(self, c => c.set_order(order))
    }

    pub fn get(&mut self) -> SettingValue {
        match self {
            AnyConnection::Bool(c) => SettingValue::Bool(c.get()),
            AnyConnection::Int(c) => SettingValue::Int(c.get()),
            AnyConnection::Float(c) => SettingValue::Float(c.get()),
            AnyConnection::String(c) => SettingValue::String(c.get()),
            AnyConnection::Color(c) => SettingValue::Color(c.get()),
            AnyConnection::Option(c) => SettingValue::Option(c.get()),
            AnyConnection::ColorOption(c) => SettingValue::ColorOption(c.get()),
            AnyConnection::KeyCombination(c) => SettingValue::KeyCombination(c.get()),
        }
    }

    pub fn get_default(&mut self) -> SettingValue {
        match self {
            AnyConnection::Bool(c) => SettingValue::Bool(c.get_default()),
            AnyConnection::Int(c) => SettingValue::Int(c.get_default()),
            AnyConnection::Float(c) => SettingValue::Float(c.get_default()),
            AnyConnection::String(c) => SettingValue::String(c.get_default()),
            AnyConnection::Color(c) => SettingValue::Color(c.get_default()),
            AnyConnection::Option(c) => SettingValue::Option(c.get_default()),
            AnyConnection::ColorOption(c) => SettingValue::ColorOption(c.get_default()),
            AnyConnection::KeyCombination(c) => SettingValue::KeyCombination(c.get_default()),
        }
    }

    /// Write `value` to live state. Returns false (and writes nothing) when
    /// the value kind does not match the connection.
    pub fn set(&mut self, value: &SettingValue) -> bool {
        match (self, value) {
            (AnyConnection::Bool(c), SettingValue::Bool(v)) => c.set(*v),
            (AnyConnection::Int(c), SettingValue::Int(v)) => c.set(*v),
            (AnyConnection::Float(c), SettingValue::Float(v)) => c.set(*v),
            (AnyConnection::String(c), SettingValue::String(v)) => c.set(v.clone()),
            (AnyConnection::Color(c), SettingValue::Color(v)) => c.set(*v),
            (AnyConnection::Option(c), SettingValue::Option(v)) => c.set(*v),
            (AnyConnection::ColorOption(c), SettingValue::ColorOption(v)) => c.set(*v),
            (AnyConnection::KeyCombination(c), SettingValue::KeyCombination(v)) => c.set(*v),
            _ => return false,
        }
        true
    }

    /// Seed the last-notified value so an idempotent first `set` stays quiet.
    fn observe(&mut self, value: &SettingValue) {
        match (self, value) {
            (AnyConnection::Bool(c), SettingValue::Bool(v)) => c.base_mut().observe(v),
            (AnyConnection::Int(c), SettingValue::Int(v)) => c.base_mut().observe(v),
            (AnyConnection::Float(c), SettingValue::Float(v)) => c.base_mut().observe(v),
            (AnyConnection::String(c), SettingValue::String(v)) => c.base_mut().observe(v),
            (AnyConnection::Color(c), SettingValue::Color(v)) => c.base_mut().observe(v),
            (AnyConnection::Option(c), SettingValue::Option(v)) => c.base_mut().observe(v),
            (AnyConnection::ColorOption(c), SettingValue::ColorOption(v)) => c.base_mut().observe(v),
            (AnyConnection::KeyCombination(c), SettingValue::KeyCombination(v)) => {
                c.base_mut().observe(v)
            }
            _ => {}
        }
    }

    pub fn add_change_listener(
        &mut self,
        mut listener: impl FnMut(&SettingValue) + 'static,
    ) -> ListenerId {
        match self {
            AnyConnection::Bool(c) => {
                c.add_change_listener(Box::new(move |v: &bool| listener(&SettingValue::Bool(*v))))
            }
            AnyConnection::Int(c) => {
                c.add_change_listener(Box::new(move |v: &i32| listener(&SettingValue::Int(*v))))
            }
            AnyConnection::Float(c) => {
                c.add_change_listener(Box::new(move |v: &f32| listener(&SettingValue::Float(*v))))
            }
            AnyConnection::String(c) => c.add_change_listener(Box::new(move |v: &String| {
                listener(&SettingValue::String(v.clone()))
            })),
            AnyConnection::Color(c) => {
                c.add_change_listener(Box::new(move |v: &Color| listener(&SettingValue::Color(*v))))
            }
            AnyConnection::Option(c) => {
                c.add_change_listener(Box::new(move |v: &i32| listener(&SettingValue::Option(*v))))
            }
            AnyConnection::ColorOption(c) => {
                c.add_change_listener(Box::new(move |v: &i32| listener(&SettingValue::ColorOption(*v))))
            }
            AnyConnection::KeyCombination(c) => c.add_change_listener(Box::new(move |v: &KeyCombination| {
                listener(&SettingValue::KeyCombination(*v))
            })),
        }
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        dispatch!(self, c => c.remove_change_listener(id))
    }

    pub fn on_quality_changed(&mut self, level: i32) {
        dispatch!(self, c => c.on_quality_changed(level))
    }

    /// Labels of an options connection, `None` for every other kind.
    pub fn option_labels(&mut self) -> Option<OptionLabels> {
        match self {
            AnyConnection::Option(c) => Some(OptionLabels::Strings(c.option_labels())),
            AnyConnection::ColorOption(c) => Some(OptionLabels::Colors(c.option_labels())),
            _ => None,
        }
    }

    pub fn set_option_labels(&mut self, labels: OptionLabels) -> bool {
        match (self, labels) {
            (AnyConnection::Option(c), OptionLabels::Strings(labels)) => c.set_option_labels(labels),
            (AnyConnection::ColorOption(c), OptionLabels::Colors(labels)) => {
                c.set_option_labels(labels)
            }
            _ => return false,
        }
        true
    }

    pub fn refresh_option_labels(&mut self) {
        match self {
            AnyConnection::Option(c) => c.refresh_option_labels(),
            AnyConnection::ColorOption(c) => c.refresh_option_labels(),
            _ => {}
        }
    }

    fn destroy(&mut self) {
        dispatch!(self, c => c.destroy())
    }
}

impl fmt::Debug for AnyConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyConnection")
            .field("data_type", &self.data_type())
            .field("order", &self.order())
            .finish()
    }
}

/// Generational handle to a connection in a `ConnectionTable`.
///
/// A handle outlives the connection it names: once the connection is
/// destroyed the generation no longer matches and every lookup misses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    index: u32,
    generation: u32,
}

impl ConnectionHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct Entry {
    connection: AnyConnection,
    default: Option<SettingValue>,
}

/// Owner of all live connections. Slots are reused after `destroy`.
#[derive(Default)]
pub struct ConnectionTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, connection: AnyConnection) -> ConnectionHandle {
        let entry = Entry {
            connection,
            default: None,
        };
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return ConnectionHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        ConnectionHandle {
            index,
            generation: 0,
        }
    }

    /// Destroy the connection behind `handle`. Returns false for stale handles.
    pub fn destroy(&mut self, handle: ConnectionHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        if let Some(mut entry) = slot.entry.take() {
            entry.connection.destroy();
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        true
    }

    /// Destroy every live connection. Outstanding handles go stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(mut entry) = slot.entry.take() {
                entry.connection.destroy();
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
    }

    pub fn is_alive(&self, handle: ConnectionHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&AnyConnection> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref().map(|entry| &entry.connection)
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut AnyConnection> {
        self.slot_mut(handle)?
            .entry
            .as_mut()
            .map(|entry| &mut entry.connection)
    }

    /// The connection's default value, requested from the connection on the
    /// first call only.
    pub fn default_of(&mut self, handle: ConnectionHandle) -> Option<SettingValue> {
        let entry = self.slot_mut(handle)?.entry.as_mut()?;
        if entry.default.is_none() {
            let default = entry.connection.get_default();
            entry.connection.observe(&default);
            entry.default = Some(default);
        }
        entry.default.clone()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn slot_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.entry.is_none() {
            return None;
        }
        Some(slot)
    }
}

impl fmt::Debug for ConnectionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTable")
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .finish()
    }
}
