//! Crossbeam-backed event channel between a sort run and its observers.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Handed to the orchestrator and classifier; clones share one channel.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Events sent after the receiver is gone are dropped, so a run never
    /// fails because nobody is listening.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Observer side of a run's events
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Blocks for each event and ends once every sender has been dropped,
    /// which for a run means after `RunEvent::Finished`.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Unbounded, so a slow observer never stalls file processing
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender for runs nobody observes
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FileEvent, RunEvent};
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn worker_events_arrive_in_order() {
        let (sender, receiver) = EventChannel::new();

        let worker = thread::spawn(move || {
            sender.send(Event::Run(RunEvent::Started { total: 1 }));
            sender.send(Event::File(FileEvent::Skipped {
                source: PathBuf::from("/inbox/a.txt"),
                existing: PathBuf::from("/sorted/Documents/a.txt"),
            }));
        });
        worker.join().unwrap();

        let events: Vec<_> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Run(RunEvent::Started { total: 1 })));
        assert!(matches!(events[1], Event::File(FileEvent::Skipped { .. })));
    }

    #[test]
    fn unobserved_sends_are_dropped() {
        let sender = null_sender();
        sender.send(Event::Run(RunEvent::Started { total: 0 }));
        sender.clone().send(Event::Run(RunEvent::Started { total: 1 }));
    }

    #[test]
    fn iteration_ends_with_last_sender() {
        let (sender, receiver) = EventChannel::new();
        let second = sender.clone();
        sender.send(Event::Run(RunEvent::Started { total: 1 }));
        drop(sender);
        second.send(Event::Run(RunEvent::Started { total: 2 }));
        drop(second);

        assert_eq!(receiver.iter().count(), 2);
        assert_eq!(receiver.iter().count(), 0);
    }
}
