// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Notifications emitted by the engine.
//!
//! Observers subscribe to an [`EventBus`] and receive every event published after they
//! subscribed, in publish order. Dropping the receiver unsubscribes.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::trace;

use crate::sequencer::{BlockIndex, Pattern};
use crate::transport::RunMode;

/// Something observable happened inside the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The current block pointer moved. Also emitted with 0 on a hard stop.
    BlockChanged(BlockIndex),
    /// The transport switched between playing and stopped.
    ModeChanged(RunMode),
    /// Recording was toggled. Carries the resulting state.
    RecordingStateChanged(bool),
    /// The programmed notes changed. Carries a full snapshot.
    StateChanged(Pattern),
}

/// Fan-out of engine events to any number of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends the event to every live subscriber, forgetting the ones that hung up.
    pub fn publish(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock();
        trace!(event = ?event, subscribers = subscribers.len(), "Publishing event");
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_events() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(EngineEvent::BlockChanged(3));
        bus.publish(EngineEvent::ModeChanged(RunMode::Playing));

        for rx in [first, second] {
            let events: Vec<EngineEvent> = rx.try_iter().collect();
            assert_eq!(
                events,
                vec![
                    EngineEvent::BlockChanged(3),
                    EngineEvent::ModeChanged(RunMode::Playing)
                ]
            );
        }
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(EngineEvent::RecordingStateChanged(true));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(EngineEvent::RecordingStateChanged(true)));
    }
}
