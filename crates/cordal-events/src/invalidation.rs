//! Invalidation Engine: the bus subscriber that turns events into cache removals.

use super::bus::{EventBus, Subscriber};
use super::condition;
use super::event::Event;
use super::rule::InvalidationRule;
use cordal_core::cache::CacheRegistry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Registers itself against an [`EventBus`] and, for each incoming event,
/// matches registered [`InvalidationRule`]s and removes cache keys per
/// spec §4.6.
pub struct InvalidationEngine {
    rules: DashMap<String, Vec<InvalidationRule>>,
    caches: Arc<CacheRegistry>,
    scheduled: Mutex<Vec<JoinHandle<()>>>,
}

impl InvalidationEngine {
    /// Build an engine that removes keys from `caches`.
    #[must_use]
    pub fn new(caches: Arc<CacheRegistry>) -> Self {
        Self {
            rules: DashMap::new(),
            caches,
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Register `rule` for its declared event type.
    pub fn add_rule(&self, rule: InvalidationRule) {
        self.rules.entry(rule.event_type.clone()).or_default().push(rule);
    }

    /// Register this engine against `bus` for its own processing.
    pub fn register(self: &Arc<Self>, bus: &EventBus) {
        for entry in &self.rules {
            bus.subscribe(entry.key().clone(), self.clone() as Arc<dyn Subscriber>);
        }
    }

    fn apply_rule(&self, rule: &InvalidationRule, event: &Event) {
        if !condition::evaluate_optional(rule.condition.as_deref(), event) {
            return;
        }
        let patterns = rule.substitute_patterns(event);
        for pattern in &patterns {
            self.caches.remove_pattern(pattern, &rule.caches);
        }
    }

    fn dispatch(self: &Arc<Self>, event: &Event) {
        let Some(matching) = self.rules.get(&event.event_type) else {
            return;
        };
        for rule in matching.value() {
            match rule.delay {
                Some(delay) if !delay.is_zero() => {
                    let engine = self.clone();
                    let rule = rule.clone();
                    let event = event.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        engine.apply_rule(&rule, &event);
                    });
                    self.scheduled.lock().push(handle);
                }
                _ if rule.is_async => {
                    let engine = self.clone();
                    let rule = rule.clone();
                    let event = event.clone();
                    let handle = tokio::spawn(async move {
                        engine.apply_rule(&rule, &event);
                    });
                    self.scheduled.lock().push(handle);
                }
                _ => self.apply_rule(rule, event),
            }
        }
    }

    /// Cancel every outstanding delayed invalidation. Called on graceful shutdown.
    pub fn cancel_pending(&self) {
        for handle in self.scheduled.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Subscriber for Arc<InvalidationEngine> {
    fn handle(&self, event: &Event) {
        self.dispatch(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    #[tokio::test]
    async fn pattern_invalidation_removes_matching_keys_only() {
        let caches = Arc::new(CacheRegistry::new());
        let users = caches.get_or_create_default("users");
        users.put("user:123:profile", Value::from("p"), None);
        users.put("user:123:settings", Value::from("s"), None);
        users.put("user:456:profile", Value::from("p2"), None);

        let engine = Arc::new(InvalidationEngine::new(caches));
        engine.add_rule(InvalidationRule {
            event_type: "user_update".into(),
            patterns:   vec!["user:{user_id}:*".into()],
            condition:  None,
            delay:      None,
            is_async:   false,
            caches:     Vec::new(),
        });

        let event = Event::new("user_update").with_field("user_id", "123");
        engine.dispatch(&event);

        assert!(users.get("user:123:profile").is_none());
        assert!(users.get("user:123:settings").is_none());
        assert!(users.get("user:456:profile").is_some());
    }

    #[tokio::test]
    async fn condition_gates_rule_application() {
        let caches = Arc::new(CacheRegistry::new());
        let c = caches.get_or_create_default("c");
        c.put("k", Value::from("v"), None);

        let engine = Arc::new(InvalidationEngine::new(caches));
        engine.add_rule(InvalidationRule {
            event_type: "evt".into(),
            patterns:   vec!["k".into()],
            condition:  Some("status = active".into()),
            delay:      None,
            is_async:   false,
            caches:     Vec::new(),
        });

        let non_matching = Event::new("evt").with_field("status", "inactive");
        engine.dispatch(&non_matching);
        assert!(c.get("k").is_some());

        let matching = Event::new("evt").with_field("status", "active");
        engine.dispatch(&matching);
        assert!(c.get("k").is_none());
    }

    #[tokio::test]
    async fn async_rule_runs_off_the_caller_task() {
        let caches = Arc::new(CacheRegistry::new());
        let c = caches.get_or_create_default("c");
        c.put("k", Value::from("v"), None);

        let engine = Arc::new(InvalidationEngine::new(caches));
        engine.add_rule(InvalidationRule {
            event_type: "evt".into(),
            patterns:   vec!["k".into()],
            condition:  None,
            delay:      None,
            is_async:   true,
            caches:     Vec::new(),
        });

        engine.dispatch(&Event::new("evt"));
        // is_async dispatches via tokio::spawn rather than inline, so the
        // key may still be present immediately after dispatch returns.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(c.get("k").is_none());
    }

    #[tokio::test]
    async fn delayed_invalidation_runs_after_delay() {
        let caches = Arc::new(CacheRegistry::new());
        let c = caches.get_or_create_default("c");
        c.put("k", Value::from("v"), None);

        let engine = Arc::new(InvalidationEngine::new(caches));
        engine.add_rule(InvalidationRule {
            event_type: "evt".into(),
            patterns:   vec!["k".into()],
            condition:  None,
            delay:      Some(Duration::from_millis(20)),
            is_async:   false,
            caches:     Vec::new(),
        });

        engine.dispatch(&Event::new("evt"));
        assert!(c.get("k").is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(c.get("k").is_none());
    }
}
