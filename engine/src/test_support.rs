//! Helpers shared by the inline tests

use std::thread;
use std::time::{Duration, Instant};

/// Poll `cond` until it holds or `timeout` elapses
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
