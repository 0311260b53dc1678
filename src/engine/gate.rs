use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Wakeup gate for the manual-step wait. Waits are bounded and callers
/// re-check their predicate after every wakeup, so a notification that
/// races the wait costs at most one interval.
#[derive(Debug, Default)]
pub struct ManualGate {
    generation: Mutex<u64>,
    cvar: Condvar,
}

impl ManualGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.cvar.notify_all();
    }

    pub fn wait_for(&self, interval: Duration) {
        let guard = self.lock();
        let _ = self
            .cvar
            .wait_timeout(guard, interval)
            .unwrap_or_else(|err| err.into_inner());
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(|err| err.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_returns_after_the_interval_without_notification() {
        let gate = ManualGate::new();
        let start = Instant::now();
        gate.wait_for(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn notify_wakes_a_waiter_early() {
        let gate = Arc::new(ManualGate::new());
        let done = Arc::new(AtomicBool::new(false));
        let notifier = gate.clone();
        let notifier_done = done.clone();
        let handle = thread::spawn(move || {
            while !notifier_done.load(Ordering::Relaxed) {
                notifier.notify();
                thread::sleep(Duration::from_millis(5));
            }
        });

        let start = Instant::now();
        gate.wait_for(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(5));

        done.store(true, Ordering::Relaxed);
        handle.join().expect("join");
    }
}
