//! Broadcast bus for runtime notifications.
//!
//! [`Bus`] is a thin generic wrapper around [`tokio::sync::broadcast`] that
//! lets pool and buffer internals exchange typed [`Event`]s with any number
//! of subscribers.
//!
//! - [`Bus::publish`] sends an event to all subscribers (non-blocking).
//! - [`Bus::subscribe`] creates a new receiver for consuming events.
//!
//! Delivery is fire-and-forget: publishing to a bus with no subscribers
//! succeeds silently, and slow subscribers observe `Lagged` rather than
//! exerting backpressure on the publisher.

use tokio::sync::broadcast;

use crate::events::event::Event;

/// Broadcast channel for typed runtime events.
///
/// Wrapper over [`tokio::sync::broadcast`] providing `publish`/`subscribe`
/// for a single event-kind type `K`.
pub struct Bus<K: Clone> {
    tx: broadcast::Sender<Event<K>>,
}

impl<K: Clone> Clone for Bus<K> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K: Clone> Bus<K> {
    /// Creates a new bus with the given channel capacity (clamped to 1 minimum).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event kind, stamping it with the next sequence number.
    ///
    /// Errors are ignored if there are no active subscribers.
    pub fn publish(&self, kind: K) {
        let _ = self.tx.send(Event::now(kind));
    }

    /// Subscribes to the bus and returns a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event<K>> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Ping {
        One,
        Two,
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus: Bus<Ping> = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Ping::One);
        bus.publish(Ping::Two);

        assert_eq!(rx.recv().await.unwrap().kind, Ping::One);
        assert_eq!(rx.recv().await.unwrap().kind, Ping::Two);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus: Bus<Ping> = Bus::new(8);
        bus.publish(Ping::One);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn sequence_numbers_increase() {
        let bus: Bus<Ping> = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Ping::One);
        bus.publish(Ping::One);

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert!(b.seq > a.seq);
    }
}
