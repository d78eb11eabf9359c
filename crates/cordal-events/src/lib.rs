//! Event Bus & Invalidation Engine (C6): in-process pub/sub and cache invalidation rules.

#![warn(missing_docs)]

pub mod bus;
pub mod condition;
pub mod event;
pub mod invalidation;
pub mod rule;

pub use bus::{EventBus, Subscriber};
pub use event::Event;
pub use invalidation::InvalidationEngine;
pub use rule::InvalidationRule;
