use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SLEEP_SLICE_MS: u64 = 100;

/// Shared stop signal for an in-progress run. Clones share the
/// underlying flag, so a request through any handle is visible to the
/// run loop regardless of how many suspension points away it is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Sleep for `total`, waking early when the token is set. Returns false
/// when the sleep ended because of cancellation.
pub fn sleep_with_cancel(token: &CancelToken, total: Duration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if token.is_requested() {
            return false;
        }
        let slice = remaining.min(Duration::from_millis(SLEEP_SLICE_MS));
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    !token.is_requested()
}
