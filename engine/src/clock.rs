//! Clock Runner - background thread that drives the tick driver at a fixed cadence

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::driver::{TickDriver, TickReport};
use crate::error::panic_message;

/// Clears the running flag however the tick thread exits
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Clock runner that owns the background tick thread
pub struct ClockRunner {
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ClockRunner {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start ticking `driver` every `interval_ms`
    ///
    /// # Arguments
    /// * `driver` - Shared tick driver
    /// * `interval_ms` - Milliseconds between ticks (50 for 20 ticks per second)
    /// * `callback` - Receives the report of every tick
    pub fn start<F>(&mut self, driver: Arc<TickDriver>, interval_ms: u64, callback: F)
    where
        F: Fn(TickReport) + Send + 'static,
    {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("clock runner already running");
            return;
        }

        info!(interval_ms, "starting clock runner");
        self.is_running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.is_running);
        let interval = Duration::from_millis(interval_ms);

        let handle = thread::Builder::new()
            .name("tick-clock".to_string())
            .spawn(move || {
                let _guard = RunningGuard(Arc::clone(&running));
                let mut next = Instant::now();
                while running.load(Ordering::Relaxed) {
                    let ticked = panic::catch_unwind(AssertUnwindSafe(|| callback(driver.on_tick())));
                    if let Err(payload) = ticked {
                        warn!(
                            tick = driver.current_tick(),
                            panic = %panic_message(payload.as_ref()),
                            "tick callback panicked"
                        );
                    }

                    // Fixed rate: a slow tick shortens the following sleep
                    next += interval;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
                info!("clock runner thread stopped");
            });

        match handle {
            Ok(handle) => self.thread_handle = Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn clock thread");
                self.is_running.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Stop ticking and wait for the thread to finish its current tick
    pub fn stop(&mut self) {
        if self.is_running.swap(false, Ordering::Relaxed) {
            info!("stopping clock runner");
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join(); // a panicked tick thread has nothing left to clean up
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Default for ClockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClockRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
