//! Event Bus (spec §4.1): one outbound stream per request, with cooperative
//! cancellation and an idempotent close.
//!
//! Grounded on the teacher's `handle_run_stream`/`process_run_stream_event`
//! pair (`serve/src/run/delivery.rs`, `serve/src/run/stream.rs`): a
//! `try_send` into a bounded `mpsc` channel, a drop counter incremented (and
//! logged) on backpressure, and closed/interrupted flags read via atomics
//! rather than a mutex so `is_active` never blocks a hot phase loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use stream_event::{PhaseName, ProtocolEvent, Usage};
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 256;

/// Typed, append-only stream of [`ProtocolEvent`]s to one client.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<ProtocolEvent>,
    closed: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
}

pub struct EventBusReceiver {
    pub rx: mpsc::Receiver<ProtocolEvent>,
}

impl EventBus {
    pub fn new() -> (Self, EventBusReceiver) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
                interrupted: Arc::new(AtomicBool::new(false)),
                dropped: Arc::new(AtomicUsize::new(0)),
            },
            EventBusReceiver { rx },
        )
    }

    /// `true` while the bus can still accept events: not closed, not
    /// interrupted, and the receiver hasn't been dropped.
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
            && !self.interrupted.load(Ordering::Relaxed)
            && !self.tx.is_closed()
    }

    /// Serializes and enqueues `event`. A no-op once the bus is closed or
    /// interrupted; a full queue or a dropped receiver increments the drop
    /// counter and logs a warning rather than blocking the caller.
    pub fn emit(&self, event: ProtocolEvent) {
        if !self.is_active() {
            return;
        }
        if self.tx.try_send(event).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped_total = total, "event queue full, dropping event");
        }
    }

    pub fn phase(&self, phase: PhaseName) {
        self.emit(ProtocolEvent::phase(phase));
    }

    pub fn delta(&self, text: impl Into<String>) {
        self.emit(ProtocolEvent::delta(text));
    }

    /// Interrupt sequence (spec §4.1): a human-readable delta, a
    /// `phase ready`, then `done`, then close. Idempotent.
    pub fn interrupt(&self, session_id: &str) {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.delta("Request interrupted.");
        self.phase(PhaseName::Ready);
        self.emit(ProtocolEvent::Done {
            usage: Usage::default(),
            session_id: session_id.to_string(),
        });
        self.close();
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_are_received_in_order() {
        let (bus, mut recv) = EventBus::new();
        bus.delta("first");
        bus.delta("second");
        drop(bus);
        let a = recv.rx.recv().await.unwrap();
        let b = recv.rx.recv().await.unwrap();
        assert!(matches!(a, ProtocolEvent::Delta { text, .. } if text == "first"));
        assert!(matches!(b, ProtocolEvent::Delta { text, .. } if text == "second"));
    }

    #[tokio::test]
    async fn close_makes_bus_inactive_and_emit_a_no_op() {
        let (bus, mut recv) = EventBus::new();
        bus.close();
        assert!(!bus.is_active());
        bus.delta("dropped silently");
        drop(bus);
        assert!(recv.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn interrupt_emits_delta_then_ready_then_done_and_closes() {
        let (bus, mut recv) = EventBus::new();
        bus.interrupt("sess-1");
        assert!(!bus.is_active());
        let first = recv.rx.recv().await.unwrap();
        assert!(matches!(first, ProtocolEvent::Delta { .. }));
        let second = recv.rx.recv().await.unwrap();
        assert!(matches!(second, ProtocolEvent::Phase { phase: PhaseName::Ready, .. }));
        let third = recv.rx.recv().await.unwrap();
        assert!(matches!(third, ProtocolEvent::Done { .. }));
    }

    #[tokio::test]
    async fn interrupt_is_idempotent() {
        let (bus, mut recv) = EventBus::new();
        bus.interrupt("sess-1");
        bus.interrupt("sess-1");
        drop(bus);
        let mut count = 0;
        while recv.rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn full_queue_increments_drop_counter_instead_of_blocking() {
        let (bus, mut recv) = EventBus::new();
        for i in 0..(QUEUE_CAPACITY + 5) {
            bus.delta(format!("msg-{i}"));
        }
        assert!(bus.dropped_count() > 0);
        // Draining still yields only what made it into the channel.
        let mut drained = 0;
        while recv.rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, QUEUE_CAPACITY);
    }
}
