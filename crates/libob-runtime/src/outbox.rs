//! Ordered event delivery to one connection.
//!
//! Each connection of a [`OneBot`](crate::OneBot) owns one [`Outbox`].
//! `emit` only appends to it. A single delivery task per outbox hands the
//! queued events to the connection one at a time, so a connection sees its
//! events in the order they were emitted. The task is tracked by the
//! implementation's [`TaskManager`]; it is spawned by the first push into an
//! idle outbox and exits once the queue is empty.

use std::collections::VecDeque;
use std::sync::Arc;

use libob_core::{TaskManager, Value};
use libob_transport::BoxedConnection;
use parking_lot::Mutex;
use tracing::trace;

#[derive(Default)]
struct Queue {
    events: VecDeque<Value>,
    draining: bool,
}

pub(crate) struct Outbox {
    connection: BoxedConnection,
    queue: Mutex<Queue>,
}

/// Clears `draining` when a delivery task is dropped mid-queue, so the next
/// push starts a fresh one.
struct DrainGuard {
    outbox: Arc<Outbox>,
    armed: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.armed {
            self.outbox.queue.lock().draining = false;
        }
    }
}

impl Outbox {
    pub(crate) fn new(connection: BoxedConnection) -> Arc<Self> {
        Arc::new(Self {
            connection,
            queue: Mutex::new(Queue::default()),
        })
    }

    pub(crate) fn connection(&self) -> &BoxedConnection {
        &self.connection
    }

    /// Events queued and not yet handed to the connection.
    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().events.len()
    }

    pub(crate) fn push(self: &Arc<Self>, event: Value, tasks: &TaskManager) {
        let idle = {
            let mut queue = self.queue.lock();
            queue.events.push_back(event);
            !std::mem::replace(&mut queue.draining, true)
        };
        if idle {
            trace!(kind = %self.connection.kind(), "Starting event delivery");
            let outbox = self.clone();
            tasks.spawn_detached(outbox.deliver());
        }
    }

    async fn deliver(self: Arc<Self>) {
        let mut guard = DrainGuard {
            outbox: self.clone(),
            armed: true,
        };
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let next = queue.events.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            let Some(event) = next else {
                break;
            };
            self.connection.emit_event(event).await;
        }
        guard.armed = false;
    }
}
