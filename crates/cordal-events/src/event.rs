//! The payload published through the [`super::bus::EventBus`].

use serde_json::Value;
use std::collections::HashMap;

/// One published occurrence, keyed by `event_type` for subscriber and rule matching.
///
/// Narrower than the teacher's `fraiseql_observers::event::EntityEvent`
/// (no change-tracking, no user/entity identity fields) since the
/// invalidation engine only needs a type and a flat data map to evaluate
/// conditions and substitute `{var}` placeholders.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type used to look up subscribers and invalidation rules.
    pub event_type: String,
    /// Flat key/value payload, read by condition evaluation and pattern substitution.
    pub data: HashMap<String, Value>,
}

impl Event {
    /// Build an event with no payload fields.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: HashMap::new(),
        }
    }

    /// Attach a field to this event's payload.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Look up a payload field as a display string, used for `{var}` pattern substitution.
    #[must_use]
    pub fn field_as_string(&self, key: &str) -> Option<String> {
        self.data.get(key).map(value_to_display)
    }
}

pub(crate) fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_as_string_unwraps_string_values() {
        let event = Event::new("user_update").with_field("user_id", "123");
        assert_eq!(event.field_as_string("user_id"), Some("123".to_string()));
    }

    #[test]
    fn field_as_string_stringifies_non_string_values() {
        let event = Event::new("user_update").with_field("user_id", 123);
        assert_eq!(event.field_as_string("user_id"), Some("123".to_string()));
    }
}
