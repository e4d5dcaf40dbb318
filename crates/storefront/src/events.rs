//! Events emitted by the cart store.
//!
//! The store never renders anything itself. Presentation layers (badge
//! counters, toasts, icon animations) subscribe to these events instead.

use rust_decimal::Decimal;

use minicart_core::{ProductId, Severity};

/// User-facing message produced by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Something observers may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// Cart contents changed; refresh any bound counters and totals.
    Changed { item_count: u64, total: Decimal },
    /// Show a toast.
    Notification(Notification),
    /// A product was just added; cue for the cart-icon animation.
    ItemAdded { id: ProductId },
    /// Cart was replaced by a write from another session.
    Reloaded,
}

type Listener = Box<dyn Fn(&CartEvent)>;

/// Ordered list of event listeners.
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    /// Register a listener. Listeners are called in registration order.
    pub fn add(&mut self, listener: impl Fn(&CartEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Deliver `event` to every listener.
    pub fn emit(&self, event: &CartEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_listeners_called_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();

        let first = Rc::clone(&seen);
        listeners.add(move |_| first.borrow_mut().push(1));
        let second = Rc::clone(&seen);
        listeners.add(move |_| second.borrow_mut().push(2));

        listeners.emit(&CartEvent::Reloaded);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_notification_constructors() {
        assert_eq!(Notification::success("ok").severity, Severity::Success);
        assert_eq!(Notification::info("hi").severity, Severity::Info);
        assert_eq!(Notification::error("bad").severity, Severity::Error);
    }
}
