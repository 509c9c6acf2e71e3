//! Deck host boundary
//!
//! The deck application owns the physical buttons. It tells us when a button
//! appears, is pressed or disappears ([`HostEvent`]) and we push back icon
//! state, titles, transient alerts and property-inspector payloads through
//! [`DeckHost`].

use serde_json::Value;

/// Outbound surface towards the deck
pub trait DeckHost: Send + Sync {
    /// Select one of the action's predefined icons, optionally with a label
    fn set_state(&self, context: &str, state: u8, label: Option<&str>);

    /// Replace the title drawn over the icon
    fn set_title(&self, context: &str, title: &str);

    /// Short alert overlay on the button
    fn toast(&self, context: &str, message: &str);

    /// Message for the button's property inspector
    fn send_params(&self, context: &str, params: Value);
}

/// Inbound lifecycle and input events
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Host connection established
    Connected,
    /// A button with this action was placed on the deck
    Add {
        context: String,
        uuid: String,
        params: Value,
    },
    /// The button's page became visible or hidden
    SetActive { context: String, active: bool },
    /// Button pressed
    Run { context: String, uuid: String },
    /// Buttons removed
    Clear { contexts: Vec<String> },
    /// Parameters saved by the property inspector
    ParamFromApp { context: String, params: Value },
    /// Custom message sent by the property inspector
    ParamFromPlugin { context: String, params: Value },
    /// Host connection closed
    Close,
}

impl HostEvent {
    pub fn context(&self) -> Option<&str> {
        match self {
            HostEvent::Add { context, .. }
            | HostEvent::SetActive { context, .. }
            | HostEvent::Run { context, .. }
            | HostEvent::ParamFromApp { context, .. }
            | HostEvent::ParamFromPlugin { context, .. } => Some(context),
            HostEvent::Connected | HostEvent::Clear { .. } | HostEvent::Close => None,
        }
    }
}

/// True for `null`, `{}` and `[]`
pub fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
