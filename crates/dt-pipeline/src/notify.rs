//! Slot change notifications.

use chrono::{DateTime, Utc};
use dt_core::{CommitPlan, DayBounds, TimeSlot};
use tokio::sync::broadcast;

/// Default capacity of the notification channel.
const CHANNEL_CAPACITY: usize = 64;

/// A change to the persisted slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotNotification {
    /// A slot was appended.
    SlotCreated(TimeSlot),
    /// Every slot a commit created or rewrote.
    SlotsUpdated(Vec<TimeSlot>),
}

impl SlotNotification {
    /// Earliest start among the affected slots.
    pub fn earliest_start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::SlotCreated(slot) => Some(slot.start),
            Self::SlotsUpdated(slots) => slots.iter().map(|s| s.start).min(),
        }
    }

    /// Whether the change can alter the reconstructed slots of `day`.
    ///
    /// A new boundary also moves the end of the slot before it, which may have
    /// started days earlier, so every day ending after the earliest affected
    /// start is touched.
    pub fn intersects(&self, day: &DayBounds) -> bool {
        self.earliest_start().is_some_and(|start| start < day.end)
    }
}

/// Broadcasts [`SlotNotification`]s to any number of observers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<SlotNotification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotNotification> {
        self.tx.subscribe()
    }

    /// Emits one `SlotCreated` per appended slot, then one `SlotsUpdated`
    /// for the batch. Returns the number of notifications emitted.
    pub fn publish(&self, plan: &CommitPlan) -> usize {
        let changed = plan.changed_slots();
        if changed.is_empty() {
            return 0;
        }

        let mut sent = 0;
        for slot in &plan.appended {
            self.send(SlotNotification::SlotCreated(*slot));
            sent += 1;
        }
        self.send(SlotNotification::SlotsUpdated(changed));
        sent + 1
    }

    fn send(&self, notification: SlotNotification) {
        // No subscribers is not an error.
        if self.tx.send(notification).is_err() {
            tracing::trace!("no notification subscribers");
        }
    }
}
