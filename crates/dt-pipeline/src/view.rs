//! The read path: display-ready slots for one day.

use dt_core::{Clock, DayBounds, Slot, SlotStore, StoreError, TimeSlot, reconstruct_day};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ViewConfig;
use crate::notify::SlotNotification;

/// Fully bounded, categorized slots of `day`.
pub async fn get_slots<S, C>(store: &S, clock: &C, day: &DayBounds) -> Result<Vec<Slot>, StoreError>
where
    S: SlotStore,
    C: Clock,
{
    let (start, end) = day.fetch_range();
    let records = store.slots_in_range(start, end).await?;
    Ok(reconstruct_day(&records, day, clock.now()))
}

/// A live view of one day.
///
/// Keeps the last fetched records so the running slot's end can follow the
/// clock without querying storage again.
pub struct DayView<S, C> {
    store: S,
    clock: C,
    day: DayBounds,
    config: ViewConfig,
    records: Vec<TimeSlot>,
    slots: Vec<Slot>,
}

impl<S, C> DayView<S, C>
where
    S: SlotStore,
    C: Clock,
{
    pub fn new(store: S, clock: C, day: DayBounds, config: ViewConfig) -> Self {
        Self {
            store,
            clock,
            day,
            config,
            records: Vec::new(),
            slots: Vec::new(),
        }
    }

    pub const fn day(&self) -> &DayBounds {
        &self.day
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn is_today(&self) -> bool {
        self.day.contains(self.clock.now())
    }

    /// Fetches the day's records and rebuilds the slots.
    ///
    /// On failure the previous slots are kept.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        let (start, end) = self.day.fetch_range();
        self.records = self.store.slots_in_range(start, end).await?;
        self.recompute();
        Ok(())
    }

    /// Rebuilds the slots from the last fetched records at the current time.
    pub fn tick(&mut self) {
        self.recompute();
    }

    fn recompute(&mut self) {
        self.slots = reconstruct_day(&self.records, &self.day, self.clock.now());
    }

    /// Keeps `updates` current until cancelled.
    ///
    /// Intersecting notifications and foreground events schedule a refresh
    /// after the debounce window; later triggers in that window join it.
    /// While the day is today, a periodic tick moves the running slot's end.
    pub async fn watch(
        mut self,
        mut notifications: broadcast::Receiver<SlotNotification>,
        mut foreground: mpsc::Receiver<()>,
        updates: watch::Sender<Vec<Slot>>,
        cancel: CancellationToken,
    ) {
        let debounce = self.config.debounce();
        let period = self.config.tick();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut refresh_at: Option<Instant> = None;
        let mut notifications_open = true;
        let mut foreground_open = true;

        self.refresh_and_publish(&updates).await;

        loop {
            let today = self.is_today();
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(day = %self.day.date, "day view shutting down");
                    break;
                }
                () = tokio::time::sleep_until(refresh_at.unwrap_or_else(Instant::now)), if refresh_at.is_some() => {
                    refresh_at = None;
                    self.refresh_and_publish(&updates).await;
                }
                received = notifications.recv(), if notifications_open => match received {
                    Ok(notification) => {
                        if notification.intersects(&self.day) {
                            refresh_at.get_or_insert_with(|| Instant::now() + debounce);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "day view lagged behind notifications");
                        refresh_at.get_or_insert_with(|| Instant::now() + debounce);
                    }
                    Err(RecvError::Closed) => notifications_open = false,
                },
                received = foreground.recv(), if foreground_open => match received {
                    Some(()) => {
                        refresh_at.get_or_insert_with(|| Instant::now() + debounce);
                    }
                    None => foreground_open = false,
                },
                _ = ticker.tick(), if today => {
                    self.tick();
                    updates.send_replace(self.slots.clone());
                }
            }
        }
    }

    async fn refresh_and_publish(&mut self, updates: &watch::Sender<Vec<Slot>>) {
        if let Err(err) = self.refresh().await {
            tracing::warn!(%err, day = %self.day.date, "failed to refresh day view");
            return;
        }
        tracing::debug!(day = %self.day.date, slots = self.slots.len(), "refreshed day view");
        updates.send_replace(self.slots.clone());
    }
}
