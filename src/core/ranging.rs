// core/ranging.rs

// Forward obstacle detection. A background loop polls both range sensors and
// latches a single "wall ahead" flag once either reads inside the obstacle
// threshold for enough consecutive samples. The flag stays latched until the
// consumer re-arms it with `reset`, which it does after every direction change.

use super::worker::Worker;
use crate::GridflagError;
use crate::config::RangingConfig;
use crate::devices::{RangeSensors, Side};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Latched obstacle flag consumed by the pathfinder
#[cfg_attr(test, mockall::automock)]
pub trait ObstacleSensor {
    /// True once an obstacle has been seen since the last reset
    fn is_wall_ahead(&self) -> bool;

    /// Clears the flag and the debounce history
    fn reset(&self);

    /// Begins polling
    fn start(&mut self) -> Result<(), GridflagError>;

    /// Stops polling; the flag keeps its last value
    fn stop(&mut self) -> Result<(), GridflagError>;
}

#[derive(Default)]
struct FlagState {
    wall: AtomicBool,
    streak: AtomicU32,
}

/// Polls the forward range sensors on a background thread
pub struct RangeSensingService {
    config: RangingConfig,
    sensors: Arc<dyn RangeSensors>,
    state: Arc<FlagState>,
    worker: Option<Worker>,
}

impl RangeSensingService {
    /// Creates a stopped service
    pub fn new(config: RangingConfig, sensors: Arc<dyn RangeSensors>) -> Self {
        RangeSensingService {
            config,
            sensors,
            state: Arc::new(FlagState::default()),
            worker: None,
        }
    }

    /// Samples both sensors once and updates the flag
    pub fn poll_once(&self) -> bool {
        poll(&self.config, self.sensors.as_ref(), &self.state)
    }

    /// True while the polling thread is alive
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_running)
    }
}

fn poll(config: &RangingConfig, sensors: &dyn RangeSensors, state: &FlagState) -> bool {
    let close = Side::BOTH.iter().any(|&side| {
        let reading = sensors.distance(side);
        // zero and max readings mean no echo
        reading > 0.0
            && reading < config.max_detection_distance
            && reading <= config.obstacle_threshold
    });

    if close {
        let streak = state.streak.fetch_add(1, Ordering::AcqRel) + 1;
        if streak >= config.debounce_samples.max(1) && !state.wall.swap(true, Ordering::AcqRel) {
            log::debug!("Obstacle ahead after {} close samples", streak);
        }
    } else {
        state.streak.store(0, Ordering::Release);
    }
    state.wall.load(Ordering::Acquire)
}

impl ObstacleSensor for RangeSensingService {
    fn is_wall_ahead(&self) -> bool {
        self.state.wall.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.state.streak.store(0, Ordering::Release);
        self.state.wall.store(false, Ordering::Release);
    }

    fn start(&mut self) -> Result<(), GridflagError> {
        if self.is_running() {
            return Ok(());
        }
        self.sensors.set_continuous();
        self.reset();

        let config = self.config.clone();
        let sensors = Arc::clone(&self.sensors);
        let state = Arc::clone(&self.state);
        let period = Duration::from_millis(self.config.period_ms);
        self.worker = Some(Worker::spawn("range-sensing", period, move || {
            poll(&config, sensors.as_ref(), &state);
        })?);
        log::info!("Range sensing started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GridflagError> {
        if let Some(mut worker) = self.worker.take() {
            worker.stop()?;
            log::info!("Range sensing stopped");
        }
        Ok(())
    }
}
