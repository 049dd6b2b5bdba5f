//! Batched property-change notification.
//!
//! Mutations mark properties dirty during a tick cycle; at the end of the
//! cycle one combined [`ChangeSet`] is emitted for everything that
//! changed, then the dirty set is cleared. Callers mark only on actual
//! value transitions, so observers see every change at least once and
//! never see a notification for an unchanged value.

use std::collections::HashSet;

use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Externally observable node properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    /// The autosave gate (also driven by stream state events).
    Enabled,
    /// The autosave period.
    SaveInterval,
    /// The masked password.
    Password,
    /// Whether the OBS session is identified.
    Connected,
}

/// One batch of property changes, emitted at the end of a tick cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Changed properties, sorted, each at most once.
    pub properties: Vec<Property>,
}

impl ChangeSet {
    pub fn contains(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }
}

/// Collects dirty flags and emits them as combined notifications.
#[derive(Debug)]
pub struct ChangeBroadcaster {
    dirty: HashSet<Property>,
    tx: broadcast::Sender<ChangeSet>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            dirty: HashSet::new(),
            tx,
        }
    }

    /// Observe future change sets. Slow receivers see
    /// [`broadcast::error::RecvError::Lagged`], never a blocked emitter.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.tx.subscribe()
    }

    /// Mark a property as changed since the last flush.
    pub fn mark(&mut self, property: Property) {
        self.dirty.insert(property);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Emit one combined notification if anything changed, then clear.
    /// Returns the emitted set (also when nobody is subscribed).
    pub fn flush(&mut self) -> Option<ChangeSet> {
        if self.dirty.is_empty() {
            return None;
        }
        let mut properties: Vec<Property> = self.dirty.drain().collect();
        properties.sort_unstable();

        let set = ChangeSet { properties };
        // no subscribers is fine
        let _ = self.tx.send(set.clone());
        Some(set)
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn marks_batch_into_one_set() {
        let mut b = ChangeBroadcaster::new();
        b.mark(Property::Connected);
        b.mark(Property::Enabled);
        b.mark(Property::Enabled);

        let set = b.flush().unwrap();
        assert_eq!(set.properties, vec![Property::Enabled, Property::Connected]);
    }

    #[test]
    fn flush_clears_the_dirty_set() {
        let mut b = ChangeBroadcaster::new();
        b.mark(Property::Password);

        assert!(b.flush().is_some());
        assert!(!b.is_dirty());
        assert_eq!(b.flush(), None);
    }

    #[test]
    fn subscribers_receive_each_flush_once() {
        let mut b = ChangeBroadcaster::new();
        let mut rx = b.subscribe();

        b.mark(Property::SaveInterval);
        b.flush();
        b.mark(Property::Connected);
        b.flush();

        assert!(rx.try_recv().unwrap().contains(Property::SaveInterval));
        assert!(rx.try_recv().unwrap().contains(Property::Connected));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_flush_emits_nothing() {
        let mut b = ChangeBroadcaster::new();
        let mut rx = b.subscribe();

        assert_eq!(b.flush(), None);
        assert!(rx.try_recv().is_err());
    }
}
