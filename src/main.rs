// src/main.rs
// Demo entry point: runs one retrieval mission in the simulated arena described
// by a YAML file (first argument, or config/arena.yaml).

use gridflag::devices::sim::SimArena;
use gridflag::{
    Devices, GridflagConfig, GridflagError, MissionOrchestrator, RangeSensingService,
};
use log::{error, info};
use std::error::Error;

const DEFAULT_CONFIG: &str = "config/arena.yaml";

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging; RUST_LOG picks the level
    env_logger::init();
    info!("Starting Gridflag...");

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = GridflagConfig::load(&path)?;
    let params = config
        .mission
        .clone()
        .ok_or_else(|| GridflagError::Config(format!("{} has no mission section", path)))?;

    // Simulated robot: one sensor object backs every capability, ranging polls
    // it from its own thread
    let arena = SimArena::new(&config);
    let sensors = arena.sensors();
    let ranging = RangeSensingService::new(config.ranging.clone(), sensors.clone());
    let start = config.sim.start;
    let mut mission = MissionOrchestrator::new(
        config,
        params,
        arena.drive(),
        Devices::shared(sensors),
        ranging,
        start,
    );

    mission.initialize()?;
    let result = mission.run();
    mission.shutdown()?;

    match result {
        Ok(report) => {
            info!(
                "Mission complete: {} scans, {} rejected, {} + {} legs, {} backtracks",
                report.scans,
                report.rejected,
                report.to_zone.legs,
                report.to_drop.legs,
                report.to_zone.backtracks.len() + report.to_drop.backtracks.len()
            );
            info!(
                "Released at ({:.1}, {:.1}) heading {:.0}",
                report.final_pose.x, report.final_pose.y, report.final_pose.heading
            );
        }
        Err(err) => {
            error!("Mission failed: {}", err);
            return Err(err.into());
        }
    }

    info!(
        "Simulated {:.1}s with {} collisions",
        arena.clock().as_secs_f64(),
        arena.collisions()
    );
    Ok(())
}
