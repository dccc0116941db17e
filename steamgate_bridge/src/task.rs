// One queued unit of delivery.
//
// A task is created during the poll phase and sits in the bridge's FIFO
// queue until the drain phase materializes and publishes it. It carries the
// two pieces of cross-cutting correlation state once, flatly, instead of
// deriving them per event kind: the transport-failure flag from the
// correlator and the back-filled leaderboard name the platform's completion
// payloads omit.
//
// Tasks that are still queued when the bridge is torn down are simply
// dropped. The host may already be gone at that point.

use serde_json::Value;
use std::rc::Rc;

use steamgate_platform::Platform;

use crate::dispatcher::EventDispatcher;
use crate::event::EventData;

pub struct DispatchTask {
    pub dispatcher: Rc<EventDispatcher>,
    /// The correlator's transport flag. OR-composed into the delivered
    /// `isError`; never set for standing notifications.
    pub io_failed: bool,
    /// Name back-fill for the leaderboard topics. `None` degrades to `""`.
    pub leaderboard_name: Option<String>,
    pub data: EventData,
}

/// What happened to one drained task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Materialized and delivered to at least one listener.
    Delivered,
    /// Materialized, but nobody was listening (or the host stopped).
    Undeliverable,
    /// A referenced ephemeral resource expired; the event was dropped.
    Expired,
}

impl DispatchTask {
    /// A task carrying a standing notification, addressed at the bridge's
    /// shared dispatcher.
    pub fn notification(dispatcher: Rc<EventDispatcher>, data: EventData) -> DispatchTask {
        DispatchTask {
            dispatcher,
            io_failed: false,
            leaderboard_name: None,
            data,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.data.topic()
    }

    /// Build the wire payload. `None` means a referenced ephemeral handle
    /// expired and this event must be dropped.
    pub fn materialize(&self, platform: &dyn Platform) -> Option<Value> {
        self.data
            .materialize(self.io_failed, self.leaderboard_name.as_deref(), platform)
    }

    /// Materialize and publish in one step, consuming the task.
    pub fn dispatch(self, platform: &dyn Platform) -> DispatchOutcome {
        let Some(payload) = self.materialize(platform) else {
            log::debug!("dropping expired {} event", self.topic());
            return DispatchOutcome::Expired;
        };
        if self.dispatcher.publish(self.topic(), &payload) {
            DispatchOutcome::Delivered
        } else {
            DispatchOutcome::Undeliverable
        }
    }
}
