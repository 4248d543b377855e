// src/mission.rs
// Runs one retrieval mission end to end: route to the search zone, find and grab
// the target, re-base the frame so the drop tile lies ahead, route there and
// release. The background correction loop runs for the whole mission; obstacle
// sensing runs only while the pathfinder is routing.

use crate::config::{ArenaConfig, SearchConfig};
use crate::core::geometry::{GridSpacing, Point, TileIndex, Zone};
use crate::core::localization::{Pose, PoseEstimator, TurnSignal};
use crate::core::state::{MissionPhase, MissionState, MissionStatus};
use crate::core::{LineCrossingCorrector, ObstacleSensor, Worker};
use crate::devices::{ColorClassifier, ColorId, Drive, Gripper, LightSensors, RangeSensors, Side};
use crate::navigation::{
    Completion, CoordinateReframer, MotionController, NavigationError, PathReport, Pathfinder,
    Quadrant, TravelOutcome,
};
use crate::search::{SearchAndAcquire, SearchOutcome};
use crate::{GridflagConfig, GridflagError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Heading the object is released at, in the canonical frame
const DROP_HEADING: f64 = 225.0;

/// Mission input, all in tile coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionParams {
    /// Lower-left tile of the search zone
    pub search_lower: TileIndex,
    /// Upper-right tile of the search zone
    pub search_upper: TileIndex,
    /// Tile the object is delivered to
    pub drop: TileIndex,
    /// Tile the robot must not enter
    pub exclusion: TileIndex,
    /// Color of the object to retrieve
    pub target: ColorId,
}

/// Mission rectangles and points in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionGeometry {
    /// Search zone
    pub search_zone: Zone,
    /// Exclusion tile grown by the footprint margin
    pub exclusion: Zone,
    /// Center of the drop tile
    pub drop: Point,
    /// Where the route to the search zone ends
    pub entry: Point,
    /// Middle of the search zone in whole tiles, where the robot waits before reframing
    pub center: Point,
}

impl MissionGeometry {
    /// Converts tile indices to world coordinates
    pub fn new(params: &MissionParams, arena: &ArenaConfig, search: &SearchConfig) -> Self {
        let spacing = GridSpacing::new(arena.grid_spacing);
        let search_zone = Zone::from_tiles(params.search_lower, params.search_upper, spacing);
        MissionGeometry {
            search_zone,
            exclusion: Zone::tile(params.exclusion, spacing).padded(arena.exclusion_margin),
            drop: Zone::tile_center(params.drop, spacing),
            entry: Point::new(
                search_zone.x_min + search.zone_margin,
                search_zone.y_min + search.zone_margin,
            ),
            center: search_zone.grid_mid(spacing),
        }
    }
}

/// Sensor and actuator handles used by a mission
#[derive(Clone)]
pub struct Devices {
    /// Forward range sensors
    pub ranges: Arc<dyn RangeSensors>,
    /// Downward line sensors
    pub light: Arc<dyn LightSensors>,
    /// Color sensor
    pub classifier: Arc<dyn ColorClassifier>,
    /// Gripper jaws
    pub gripper: Arc<dyn Gripper>,
}

impl Devices {
    /// Every handle backed by one object implementing all capabilities
    pub fn shared<S>(sensors: Arc<S>) -> Self
    where
        S: RangeSensors + LightSensors + ColorClassifier + Gripper + 'static,
    {
        Devices {
            ranges: sensors.clone(),
            light: sensors.clone(),
            classifier: sensors.clone(),
            gripper: sensors,
        }
    }
}

/// Summary of a delivered mission
#[derive(Debug, Clone)]
pub struct MissionReport {
    /// Route to the search zone
    pub to_zone: PathReport,
    /// Scan cycles run
    pub scans: usize,
    /// Objects carried out of the zone
    pub rejected: usize,
    /// World pose right after the grab
    pub acquired_at: Pose,
    /// Quadrant the drop tile was in when the frame was re-based
    pub quadrant: Quadrant,
    /// Route to the drop tile, in the canonical frame
    pub to_drop: PathReport,
    /// World pose at release
    pub final_pose: Pose,
}

/// Sequences a full mission over one robot
pub struct MissionOrchestrator<D: Drive, O: ObstacleSensor> {
    config: GridflagConfig,
    params: MissionParams,
    geometry: MissionGeometry,
    motion: MotionController<D>,
    obstacles: O,
    devices: Devices,
    pathfinder: Pathfinder,
    search: SearchAndAcquire,
    reframer: CoordinateReframer,
    state: MissionState,
    corrector: Option<Worker>,
    is_initialized: bool,
}

impl<D: Drive, O: ObstacleSensor> MissionOrchestrator<D, O> {
    /// Wires the mission together with the robot placed at `start`
    pub fn new(
        config: GridflagConfig,
        params: MissionParams,
        drive: D,
        devices: Devices,
        obstacles: O,
        start: Pose,
    ) -> Self {
        let geometry = MissionGeometry::new(&params, &config.arena, &config.search);
        let estimator =
            PoseEstimator::new(start, config.robot.wheel_radius, config.robot.track_width);
        let motion = MotionController::new(drive, estimator, TurnSignal::new(), config.robot.clone());
        let pathfinder = Pathfinder::new(config.pathfinder.clone(), Some(geometry.exclusion));
        let reframer = CoordinateReframer::new(GridSpacing::new(config.arena.grid_spacing));
        let search = SearchAndAcquire::new(
            config.search.clone(),
            Arc::clone(&devices.ranges),
            Arc::clone(&devices.classifier),
            Arc::clone(&devices.gripper),
        );

        MissionOrchestrator {
            config,
            params,
            geometry,
            motion,
            obstacles,
            devices,
            pathfinder,
            search,
            reframer,
            state: MissionState::new(),
            corrector: None,
            is_initialized: false,
        }
    }

    /// Calibrates the line sensors, starts the correction loop and opens the gripper
    pub fn initialize(&mut self) -> Result<(), GridflagError> {
        info!("Initializing mission...");

        if self.config.correction.enabled {
            let mut corrector = LineCrossingCorrector::new(
                self.config.correction.clone(),
                GridSpacing::new(self.config.arena.grid_spacing),
                self.motion.estimator().clone(),
                self.motion.turn_signal(),
                Arc::clone(&self.devices.light),
            );
            let baseline = corrector.calibrate();
            info!(
                "Line baseline left {:.1}, right {:.1}",
                baseline.left, baseline.right
            );
            self.corrector = Some(corrector.spawn()?);
        } else {
            warn!("Grid-line correction disabled; running on odometry alone");
        }

        self.grip(self.config.search.gripper_open);
        self.is_initialized = true;
        info!("Mission initialized");
        Ok(())
    }

    /// Runs the mission to completion; any error leaves the state in Failed
    pub fn run(&mut self) -> Result<MissionReport, GridflagError> {
        if !self.is_initialized {
            return Err(GridflagError::NotInitialized);
        }

        match self.execute() {
            Ok(report) => Ok(report),
            Err(err) => {
                self.state.fail(err.to_string());
                if let Err(stop) = self.obstacles.stop() {
                    error!("Failed to stop obstacle sensing: {}", stop);
                }
                self.motion.stop();
                Err(err)
            }
        }
    }

    fn execute(&mut self) -> Result<MissionReport, GridflagError> {
        let geometry = self.geometry;
        let target = self.params.target;

        self.state.advance(MissionPhase::PathToZone);
        self.obstacles.start()?;
        let to_zone = self
            .pathfinder
            .path_to(&mut self.motion, &self.obstacles, geometry.entry)?;
        self.obstacles.stop()?;

        self.state.advance(MissionPhase::Searching);
        let (acquired_at, scans, rejected) =
            match self
                .search
                .search(&mut self.motion, &geometry.search_zone, target)
            {
                SearchOutcome::Acquired { at, scans, rejected } => (at, scans, rejected),
                SearchOutcome::ZoneExhausted { scans, rejected } => {
                    return Err(GridflagError::SearchExhausted { scans, rejected });
                }
            };
        let center = geometry.center;
        if let TravelOutcome::NotConverged { error } =
            self.motion.travel_to(center.x, center.y, Completion::Block)
        {
            warn!("Zone center missed by {:.1}", error);
        }

        self.state.advance(MissionPhase::Reframing);
        let reframing = self.reframer.reframe(
            &mut self.motion,
            &geometry.search_zone,
            geometry.drop,
            Some(geometry.exclusion),
        );
        self.pathfinder.set_exclusion(reframing.exclusion);

        self.state.advance(MissionPhase::PathToDrop);
        self.obstacles.start()?;
        self.obstacles.reset();
        let to_drop = self
            .pathfinder
            .path_to(&mut self.motion, &self.obstacles, reframing.drop)?;
        self.obstacles.stop()?;
        if let TravelOutcome::NotConverged { error } =
            self.motion
                .travel_to(reframing.drop.x, reframing.drop.y, Completion::Block)
        {
            return Err(NavigationError::NotConverged {
                target: reframing.drop,
                error,
            }
            .into());
        }

        self.state.advance(MissionPhase::Delivering);
        self.motion.turn_to(DROP_HEADING);
        self.grip(self.config.search.gripper_open);
        let final_pose = reframing.frame.pose_to_world(&self.motion.pose());

        self.state.advance(MissionPhase::Complete);
        info!(
            "Delivered color {} at ({:.1}, {:.1}) after {} scans and {} backtracks",
            target.0,
            final_pose.x,
            final_pose.y,
            scans,
            to_zone.backtracks.len() + to_drop.backtracks.len()
        );

        Ok(MissionReport {
            to_zone,
            scans,
            rejected,
            acquired_at,
            quadrant: reframing.quadrant,
            to_drop,
            final_pose,
        })
    }

    /// Stops the background loops and the wheels
    pub fn shutdown(&mut self) -> Result<(), GridflagError> {
        info!("Shutting down mission...");
        self.motion.stop();
        self.obstacles.stop()?;
        if let Some(mut worker) = self.corrector.take() {
            worker.stop()?;
        }
        self.is_initialized = false;
        info!("Mission shutdown complete");
        Ok(())
    }

    /// Current phase snapshot
    pub fn status(&self) -> MissionStatus {
        self.state.status()
    }

    /// World-coordinate mission layout
    pub fn geometry(&self) -> &MissionGeometry {
        &self.geometry
    }

    /// Shared pose estimate
    pub fn estimator(&self) -> &PoseEstimator {
        self.motion.estimator()
    }

    fn grip(&self, angle: f64) {
        self.devices.gripper.rotate_to(Side::Right, angle);
        self.devices.gripper.rotate_to(Side::Left, angle);
    }
}
