//! Typed publish/subscribe bus connecting the hub, controller and orchestrator
//!
//! Every component that reacts to events gets its own receiver at
//! construction time; there is no global registration.

use crate::states::ChargeControllerStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events exchanged inside one hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubEvent {
    /// Touch the controller's latest-charger-start timestamp
    UpdateLatestChargerStart,
    /// The hub enable flag changed
    ChargerEnabledChanged,
    /// The hub finished its own initialization
    HubInitialized,
    /// Periodic tick or any stimulus that should trigger reclassification
    TimerActivated,
    /// The power guard went stale; charging must pause
    PowerCanaryDead,
    /// The controller status changed to the given value
    StatusChanged(ChargeControllerStatus),
    /// The cached "charger done" flag changed
    ChargerDoneChanged(bool),
}

impl HubEvent {
    /// Wire name of the event, as used in log messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::UpdateLatestChargerStart => "update latest charger start",
            Self::ChargerEnabledChanged => "update charger enabled",
            Self::HubInitialized => "hub initialized",
            Self::TimerActivated => "timer activated",
            Self::PowerCanaryDead => "power canary dead",
            Self::StatusChanged(_) => "chargecontroller status changed",
            Self::ChargerDoneChanged(_) => "update charger done",
        }
    }
}

/// Broadcast bus for `HubEvent`s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HubEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event; returns the number of subscribers that will see it
    pub fn publish(&self, event: HubEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// New receiver that observes every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The hub's cached "charger done" flag.
///
/// Writes go through here so that `ChargerDoneChanged` is published at most
/// once per actual change.
#[derive(Debug)]
pub struct DoneFlag {
    done: AtomicBool,
    bus: EventBus,
}

impl DoneFlag {
    pub fn new(bus: EventBus) -> Self {
        Self {
            done: AtomicBool::new(false),
            bus,
        }
    }

    pub fn get(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Store `value`; publishes and returns true only if the flag flipped
    pub fn set(&self, value: bool) -> bool {
        let previous = self.done.swap(value, Ordering::SeqCst);
        if previous != value {
            self.bus.publish(HubEvent::ChargerDoneChanged(value));
            true
        } else {
            false
        }
    }

    /// Mark done and publish regardless of the cached value
    pub fn announce_done(&self) {
        self.done.store(true, Ordering::SeqCst);
        self.bus.publish(HubEvent::ChargerDoneChanged(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_each_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let seen = bus.publish(HubEvent::StatusChanged(ChargeControllerStatus::Start));
        assert_eq!(seen, 2);
        assert_eq!(
            a.recv().await.unwrap(),
            HubEvent::StatusChanged(ChargeControllerStatus::Start)
        );
        assert_eq!(b.recv().await.unwrap().name(), "chargecontroller status changed");
    }

    #[test]
    fn done_flag_publishes_only_on_change() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let flag = DoneFlag::new(bus);

        assert!(flag.set(true));
        assert!(!flag.set(true));
        assert!(flag.set(false));
        assert_eq!(rx.try_recv().unwrap(), HubEvent::ChargerDoneChanged(true));
        assert_eq!(rx.try_recv().unwrap(), HubEvent::ChargerDoneChanged(false));
        assert!(rx.try_recv().is_err());

        flag.announce_done();
        flag.announce_done();
        assert!(flag.get());
        assert_eq!(rx.try_recv().unwrap(), HubEvent::ChargerDoneChanged(true));
        assert_eq!(rx.try_recv().unwrap(), HubEvent::ChargerDoneChanged(true));
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(HubEvent::TimerActivated), 0);
    }
}
