//! [`BusNotifier`] – driver notices published on the event bus.

use drivesafe_kernel::{Notifier, TracingNotifier};
use drivesafe_middleware::{EventBus, Topic};
use drivesafe_types::{Event, EventPayload, Notice};

/// Publishes every notice on [`Topic::Notices`] and logs it.
#[derive(Clone)]
pub struct BusNotifier {
    bus: EventBus,
    source: &'static str,
}

impl BusNotifier {
    pub fn new(bus: EventBus, source: &'static str) -> Self {
        Self { bus, source }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, notice: Notice) {
        TracingNotifier.notify(notice.clone());
        self.bus
            .publish_to(Topic::Notices, Event::new(self.source, EventPayload::Notice(notice)));
    }
}
