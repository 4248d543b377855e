// core/worker.rs

// Named background loop with a fixed period and a cooperative shutdown flag.
// The correction loop and the obstacle poller both run on one of these.

use crate::GridflagError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle to a periodic background thread; stopping is idempotent and happens on drop
pub struct Worker {
    name: String,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns `tick` on a named thread, calling it once per `period` until stopped
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> Result<Worker, GridflagError>
    where
        F: FnMut() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("{} started (period {:?})", thread_name, period);
                while !flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    tick();
                    // keep a steady rate regardless of how long the tick took
                    if let Some(remaining) = period.checked_sub(started.elapsed()) {
                        thread::sleep(remaining);
                    }
                }
                log::debug!("{} stopped", thread_name);
            })
            .map_err(|e| GridflagError::Worker(format!("failed to spawn {}: {}", name, e)))?;

        Ok(Worker {
            name: name.to_string(),
            shutdown,
            handle: Some(handle),
        })
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until `stop` has been called or the thread has exited
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Signals the loop to exit and joins it
    pub fn stop(&mut self) -> Result<(), GridflagError> {
        self.shutdown.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GridflagError::Worker(format!("{} panicked", self.name))),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("{}", e);
        }
    }
}
