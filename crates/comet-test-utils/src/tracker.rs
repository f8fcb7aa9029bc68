//! Lifecycle tracking for test components.

use std::sync::Arc;

use parking_lot::Mutex;

/// A lifecycle event recorded by a [`Tracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Constructed { label: &'static str },
    Destroyed { label: &'static str },
}

/// Records construction and destruction of the components carrying its probes.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// Probes record through `&self` from whichever thread drops the component,
/// so the event log lives behind a `Mutex`.
#[derive(Debug, Default)]
pub struct Tracker {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl Tracker {
    /// Create a new shared tracker.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a probe to embed in a component. Records construction now and
    /// destruction when the probe is dropped.
    pub fn probe(self: &Arc<Self>, label: &'static str) -> DropProbe {
        self.events.lock().push(LifecycleEvent::Constructed { label });
        DropProbe {
            tracker: Arc::clone(self),
            label,
        }
    }

    /// Get a copy of all recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Count constructed components.
    pub fn constructed(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::Constructed { .. }))
            .count()
    }

    /// Count destroyed components.
    pub fn destroyed(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::Destroyed { .. }))
            .count()
    }

    /// Count destructions of components probed with `label`.
    pub fn destroyed_of(&self, label: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::Destroyed { label: l } if *l == label))
            .count()
    }

    /// Components constructed but not yet destroyed, counting from the last
    /// [`clear`](Self::clear).
    pub fn live(&self) -> usize {
        self.constructed().saturating_sub(self.destroyed())
    }

    /// Clear recorded events (useful between test steps).
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Embedded in a test component; reports the component's destruction.
#[derive(Debug)]
pub struct DropProbe {
    tracker: Arc<Tracker>,
    label: &'static str,
}

impl DropProbe {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.tracker.events.lock().push(LifecycleEvent::Destroyed { label: self.label });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_records_lifecycle() {
        let tracker = Tracker::new();
        let probe = tracker.probe("a");
        assert_eq!(tracker.live(), 1);
        assert_eq!(probe.label(), "a");

        drop(probe);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.destroyed_of("a"), 1);
        assert_eq!(
            tracker.events(),
            vec![
                LifecycleEvent::Constructed { label: "a" },
                LifecycleEvent::Destroyed { label: "a" },
            ]
        );
    }

    #[test]
    fn test_live_after_clear_with_probe_outstanding() {
        let tracker = Tracker::new();
        let probe = tracker.probe("c");
        tracker.clear();

        drop(probe);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.destroyed_of("c"), 1);
    }

    #[test]
    fn test_clear() {
        let tracker = Tracker::new();
        drop(tracker.probe("b"));
        tracker.clear();
        assert!(tracker.events().is_empty());
        assert_eq!(tracker.constructed(), 0);
    }
}
