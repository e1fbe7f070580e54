//! Registration table mapping event names to listeners.

use crate::bus::EventBus;
use crate::error::{EventError, EventResult};
use crate::event::names;
use crate::listener::EventListener;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Built once at startup, validated, then frozen into an [`EventBus`].
#[derive(Default, Clone)]
pub struct EventRegistry {
    listeners: HashMap<&'static str, Vec<Arc<dyn EventListener>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `event`. Listeners run in registration order.
    pub fn on(&mut self, event: &str, listener: Arc<dyn EventListener>) -> EventResult<()> {
        let Some(event) = names::ALL.iter().copied().find(|n| *n == event) else {
            return Err(EventError::UnknownEvent(event.to_string()));
        };

        let slot = self.listeners.entry(event).or_default();
        if slot.iter().any(|l| l.name() == listener.name()) {
            return Err(EventError::DuplicateListener {
                event: event.to_string(),
                listener: listener.name().to_string(),
            });
        }

        info!(event, listener = listener.name(), "Registered event listener");
        slot.push(listener);
        Ok(())
    }

    /// Registers one listener for several events.
    pub fn on_each(
        &mut self,
        events: &[&str],
        listener: &Arc<dyn EventListener>,
    ) -> EventResult<()> {
        for event in events {
            self.on(event, Arc::clone(listener))?;
        }
        Ok(())
    }

    /// Fails if any of `required` has no listener.
    pub fn validate(&self, required: &[&str]) -> EventResult<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|e| self.listeners.get(**e).map_or(true, Vec::is_empty))
            .map(|e| (*e).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EventError::MissingListeners(missing))
        }
    }

    pub fn listener_names(&self, event: &str) -> Vec<&str> {
        self.listeners
            .get(event)
            .map(|ls| ls.iter().map(|l| l.name()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn listeners(&self, event: &str) -> &[Arc<dyn EventListener>] {
        self.listeners.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn build(self) -> EventBus {
        EventBus::new(self)
    }
}
