//! Admission gate for resolves on a scope.
//!
//! Every resolve holds a [`GateGuard`] while it runs. Disposal closes the
//! gate (new entries fail at once) and then waits until the in-flight
//! count drops to zero before any teardown runs.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    closed: bool,
    in_flight: usize,
}

#[derive(Default)]
pub(crate) struct ResolveGate {
    state: Mutex<GateState>,
    drained: Condvar,
    #[cfg(feature = "async")]
    drained_async: tokio::sync::Notify,
}

impl ResolveGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits one operation, or `None` once the gate is closed.
    pub fn enter(&self) -> Option<GateGuard<'_>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.in_flight += 1;
        Some(GateGuard { gate: self })
    }

    /// Closes the gate. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.closed, true)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Blocks until no admitted operation is left.
    pub fn wait_drained(&self) {
        let mut state = self.state.lock();
        while state.in_flight > 0 {
            self.drained.wait(&mut state);
        }
    }

    #[cfg(feature = "async")]
    pub async fn wait_drained_async(&self) {
        loop {
            let notified = self.drained_async.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state.lock().in_flight == 0 {
                return;
            }
            notified.await;
        }
    }

    fn leave(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 && state.closed {
            self.drained.notify_all();
            #[cfg(feature = "async")]
            self.drained_async.notify_waiters();
        }
    }
}

/// Marks one in-flight operation; leaving happens on drop.
#[must_use]
pub(crate) struct GateGuard<'a> {
    gate: &'a ResolveGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn closed_gate_admits_nothing() {
        let gate = ResolveGate::new();
        assert!(gate.enter().is_some());
        assert!(gate.close());
        assert!(!gate.close());
        assert!(gate.is_closed());
        assert!(gate.enter().is_none());
    }

    #[test]
    fn drain_on_idle_gate_returns_immediately() {
        let gate = ResolveGate::new();
        gate.close();
        gate.wait_drained();
    }

    #[test]
    fn drain_waits_for_in_flight_guard() {
        let gate = Arc::new(ResolveGate::new());
        let released = Arc::new(AtomicBool::new(false));

        let holder = {
            let gate = gate.clone();
            let released = released.clone();
            let (tx, rx) = std::sync::mpsc::channel();
            let handle = thread::spawn(move || {
                let _guard = gate.enter().unwrap();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                released.store(true, Ordering::SeqCst);
            });
            rx.recv().unwrap();
            handle
        };

        gate.close();
        gate.wait_drained();
        assert!(released.load(Ordering::SeqCst));
        holder.join().unwrap();
    }

    #[cfg(feature = "async")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_drain_waits_for_in_flight_guard() {
        let gate = Arc::new(ResolveGate::new());
        let released = Arc::new(AtomicBool::new(false));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let holder = {
            let gate = gate.clone();
            let released = released.clone();
            tokio::spawn(async move {
                let _guard = gate.enter().unwrap();
                tx.send(()).unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                released.store(true, Ordering::SeqCst);
            })
        };

        rx.await.unwrap();
        gate.close();
        gate.wait_drained_async().await;
        assert!(released.load(Ordering::SeqCst));
        holder.await.unwrap();
    }
}
