//! Resolvers bind one setting to one UI control
//!
//! The registry keeps registered resolvers weakly and calls `refresh` when
//! values change underneath them (load, reset, new option labels). The UI
//! toolkit itself stays outside: a control is anything implementing
//! `Widget`.

use crate::settings::Settings;
use crate::value::{DataType, OptionLabels, SettingValue};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{error, warn};

/// Registration token for a resolver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResolverId(u32);

impl ResolverId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resolver#{}", self.0)
    }
}

pub trait Resolver {
    /// Id of the setting this resolver drives.
    fn setting_id(&self) -> &str;

    /// Data types this resolver can display. Empty means any.
    fn supported_data_types(&self) -> &[DataType];

    /// Pull the current value into the control without writing it back.
    fn refresh(&mut self, settings: &mut Settings);
}

/// The part of a UI control a resolver needs.
pub trait Widget {
    fn set_display_value(&mut self, value: &SettingValue);

    /// The value the user picked since the last call, if any.
    fn take_user_change(&mut self) -> Option<SettingValue>;

    fn set_option_labels(&mut self, _labels: &OptionLabels) {}
}

/// Resolver over any `Widget`.
pub struct WidgetResolver<W: Widget> {
    id: String,
    supported: Vec<DataType>,
    widget: W,
    registration: Option<ResolverId>,
    /// User edit raised before a refresh, kept for the next `handle_user_input`.
    held_change: Option<SettingValue>,
}

impl<W: Widget> WidgetResolver<W> {
    pub fn new(id: impl Into<String>, supported: &[DataType], widget: W) -> Self {
        Self {
            id: id.into().trim().to_owned(),
            supported: supported.to_vec(),
            widget,
            registration: None,
            held_change: None,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn registration(&self) -> Option<ResolverId> {
        self.registration
    }

    /// Data type of the bound setting, `Unknown` if it does not exist.
    pub fn data_type(&self, settings: &Settings) -> DataType {
        settings
            .get_setting(&self.id)
            .map_or(DataType::Unknown, |s| s.data_type())
    }

    /// Whether the id names an existing setting of a supported type.
    /// Misconfiguration is logged.
    pub fn has_valid_setting_for_id(&self, settings: &Settings) -> bool {
        if self.id.is_empty() {
            warn!("Resolver has no setting id");
            return false;
        }

        let Some(setting) = settings.get_setting(&self.id) else {
            warn!(id = %self.id, "No setting with this id; the control will not be saved");
            return false;
        };

        if !self.supported.is_empty() && !setting.matches_any_data_type(&self.supported) {
            error!(
                id = %self.id,
                found = %setting.data_type(),
                supported = ?self.supported,
                "Resolver cannot handle this setting type"
            );
            return false;
        }
        true
    }

    /// Forward a pending user edit from the control to the setting.
    pub fn handle_user_input(&mut self, settings: &mut Settings) -> bool {
        let held = self.held_change.take();
        let Some(value) = self.widget.take_user_change().or(held) else {
            return false;
        };
        if !self.has_valid_setting_for_id(settings) {
            return false;
        }
        match settings.set_value(&self.id, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %self.id, "User input rejected: {}", e);
                false
            }
        }
    }

    fn refresh_widget(&mut self, settings: &mut Settings) {
        if !self.has_valid_setting_for_id(settings) {
            return;
        }
        let Some(value) = settings.value(&self.id).cloned() else {
            return;
        };

        if let Some(edit) = self.widget.take_user_change() {
            self.held_change = Some(edit);
        }

        if let Some(labels) = settings.option_labels(&self.id) {
            self.widget.set_option_labels(&labels);
        }
        self.widget.set_display_value(&value);

        // Writing the display value may raise the control's change event.
        // Drop that echo so it never flows back into the setting.
        let _ = self.widget.take_user_change();
    }
}

impl<W: Widget + 'static> WidgetResolver<W> {
    /// Register with the registry and show the current value.
    pub fn register_as_activated(this: &Rc<RefCell<Self>>, settings: &mut Settings) -> ResolverId {
        let id = settings.register_resolver(this);
        let mut resolver = this.borrow_mut();
        resolver.registration = Some(id);
        resolver.refresh_widget(settings);
        id
    }

    pub fn unregister(this: &Rc<RefCell<Self>>, settings: &mut Settings) -> bool {
        match this.borrow_mut().registration.take() {
            Some(id) => settings.unregister_resolver(id),
            None => false,
        }
    }
}

impl<W: Widget> Resolver for WidgetResolver<W> {
    fn setting_id(&self) -> &str {
        &self.id
    }

    fn supported_data_types(&self) -> &[DataType] {
        &self.supported
    }

    fn refresh(&mut self, settings: &mut Settings) {
        self.refresh_widget(settings);
    }
}

impl<W: Widget + fmt::Debug> fmt::Debug for WidgetResolver<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetResolver")
            .field("id", &self.id)
            .field("supported", &self.supported)
            .field("widget", &self.widget)
            .field("registration", &self.registration)
            .field("held_change", &self.held_change)
            .finish()
    }
}
