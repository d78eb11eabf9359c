//! `InvalidationRule`: reacts to one event type by removing matching cache keys.

use super::event::Event;
use std::time::Duration;

/// A registered reaction from an event type to one or more cache-key glob patterns.
#[derive(Debug, Clone)]
pub struct InvalidationRule {
    /// The event type this rule reacts to.
    pub event_type: String,
    /// Glob patterns over cache keys, each with `{var}` substitution from event data.
    pub patterns: Vec<String>,
    /// Gate expression in the grammar of [`super::condition`]; absent/blank always matches.
    pub condition: Option<String>,
    /// Delay before the removal runs; `None`/zero runs immediately.
    pub delay: Option<Duration>,
    /// `true` to run the removal on the async worker pool instead of the publishing caller.
    pub is_async: bool,
    /// Specific caches to target; empty means broadcast to every cache.
    pub caches: Vec<String>,
}

impl InvalidationRule {
    /// Substitute every `{var}` placeholder in `pattern` with the matching
    /// field from `event`'s payload, leaving unmatched placeholders as-is
    /// (a rule referencing a field an event did not set is a configuration
    /// mistake this function does not try to paper over).
    #[must_use]
    pub fn substitute_patterns(&self, event: &Event) -> Vec<String> {
        self.patterns.iter().map(|p| substitute(p, event)).collect()
    }
}

fn substitute(pattern: &str, event: &Event) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut var = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                var.push(next);
            }
            if closed {
                match event.field_as_string(&var) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(&var);
                        out.push('}');
                    }
                }
            } else {
                out.push('{');
                out.push_str(&var);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_event_fields_into_pattern() {
        let event = Event::new("user_update").with_field("user_id", "123");
        let rule = InvalidationRule {
            event_type: "user_update".into(),
            patterns:   vec!["user:{user_id}:*".into()],
            condition:  None,
            delay:      None,
            is_async:   false,
            caches:     Vec::new(),
        };
        assert_eq!(rule.substitute_patterns(&event), vec!["user:123:*".to_string()]);
    }

    #[test]
    fn leaves_unmatched_placeholder_untouched() {
        let event = Event::new("x");
        let rule = InvalidationRule {
            event_type: "x".into(),
            patterns:   vec!["user:{missing}:*".into()],
            condition:  None,
            delay:      None,
            is_async:   false,
            caches:     Vec::new(),
        };
        assert_eq!(rule.substitute_patterns(&event), vec!["user:{missing}:*".to_string()]);
    }
}
