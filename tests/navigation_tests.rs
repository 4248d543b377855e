// tests/navigation_tests.rs
// Pathfinder runs against the simulated arena: an open route, a route that needs
// checkpoint retreats, a pocket with nowhere to retreat to, a route around the
// exclusion zone, and a route watched by the threaded obstacle poller.

#[cfg(test)]
mod tests {
    use gridflag::core::{ObstacleSensor, Point, Pose, PoseEstimator, TurnSignal, Zone};
    use gridflag::devices::sim::{SimArena, SimConfig, SimDrive};
    use gridflag::navigation::{MotionController, NavigationError, Pathfinder};
    use gridflag::{GridflagConfig, RangeSensingService};

    const THRESHOLD: f64 = 20.0;

    fn zone(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Zone {
        Zone {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    fn setup(obstacles: Vec<Zone>) -> (GridflagConfig, MotionController<SimDrive>, SimArena) {
        setup_paced(obstacles, 0.0)
    }

    // Narrow-beam sensors keep the obstacle flag tied to what is straight ahead
    fn setup_paced(
        obstacles: Vec<Zone>,
        time_scale: f64,
    ) -> (GridflagConfig, MotionController<SimDrive>, SimArena) {
        let mut config = GridflagConfig {
            sim: SimConfig {
                arena: zone(-50.0, -50.0, 300.0, 300.0),
                obstacles,
                start: Pose::origin(),
                cone_rays: 1,
                cone_half_angle: 0.0,
                time_scale,
                ..SimConfig::default()
            },
            ..GridflagConfig::default()
        };
        config.ranging.period_ms = 5;
        let arena = SimArena::new(&config);
        let estimator = PoseEstimator::new(
            Pose::origin(),
            config.robot.wheel_radius,
            config.robot.track_width,
        );
        let motion = MotionController::new(
            arena.drive(),
            estimator,
            TurnSignal::new(),
            config.robot.clone(),
        );
        (config, motion, arena)
    }

    #[test]
    fn open_route_needs_no_backtracking() {
        let (config, mut motion, arena) = setup(Vec::new());
        let probe = arena.obstacle_probe(THRESHOLD);
        let mut pathfinder = Pathfinder::new(config.pathfinder.clone(), None);

        let report = pathfinder
            .path_to(&mut motion, &probe, Point::new(60.0, 90.0))
            .unwrap();

        assert!(report.backtracks.is_empty());
        let truth = arena.true_pose();
        assert!(truth.x >= 57.0 && truth.y >= 87.0, "{:?}", truth);
        assert_eq!(arena.collisions(), 0);
    }

    #[test]
    fn dead_end_retreats_to_a_distant_checkpoint() {
        // a wall across the +X route with a shelf over it that blocks +Y too
        let (config, mut motion, arena) = setup(vec![
            zone(110.0, -40.0, 130.0, 30.0),
            zone(60.0, 12.0, 130.0, 30.0),
        ]);
        let probe = arena.obstacle_probe(THRESHOLD);
        let mut pathfinder = Pathfinder::new(config.pathfinder.clone(), None);

        let report = pathfinder
            .path_to(&mut motion, &probe, Point::new(200.0, 60.0))
            .unwrap();

        assert!(!report.backtracks.is_empty());
        for backtrack in &report.backtracks {
            let retreat = (backtrack.from - backtrack.to).norm();
            assert!(
                retreat >= config.pathfinder.min_recovery_distance,
                "{:?}",
                backtrack
            );
        }
        let truth = arena.true_pose();
        assert!(truth.x >= 197.0 && truth.y >= 57.0, "{:?}", truth);
    }

    #[test]
    fn pocket_without_checkpoints_fails_explicitly() {
        let (config, mut motion, arena) = setup(vec![
            zone(30.0, -40.0, 50.0, 60.0),
            zone(-40.0, 20.0, 50.0, 50.0),
        ]);
        let probe = arena.obstacle_probe(THRESHOLD);
        let mut pathfinder = Pathfinder::new(config.pathfinder.clone(), None);

        let result = pathfinder.path_to(&mut motion, &probe, Point::new(100.0, 100.0));

        assert!(
            matches!(result, Err(NavigationError::CheckpointsExhausted { .. })),
            "{:?}",
            result
        );
    }

    #[test]
    fn exclusion_zone_is_left_out_of_the_checkpoints() {
        let (config, mut motion, arena) = setup(Vec::new());
        let probe = arena.obstacle_probe(THRESHOLD);
        let exclusion = zone(80.0, -20.0, 110.0, 20.0);
        let mut pathfinder = Pathfinder::new(config.pathfinder.clone(), Some(exclusion));

        let report = pathfinder
            .path_to(&mut motion, &probe, Point::new(200.0, 60.0))
            .unwrap();

        assert!(report.legs >= 3, "{:?}", report);
        for checkpoint in pathfinder.checkpoints().points() {
            assert!(!exclusion.contains(checkpoint), "{:?}", checkpoint);
        }
        // after backing out it turned onto +Y, which never re-enters the zone
        let truth = arena.true_pose();
        assert!(!exclusion.contains(&truth.position()));
        assert!(truth.x >= 197.0 && truth.y >= 57.0, "{:?}", truth);
    }

    #[test]
    fn threaded_sensing_routes_around_a_wall() {
        let (config, mut motion, arena) = setup_paced(vec![zone(60.0, -40.0, 80.0, 30.0)], 0.1);
        let mut sensing = RangeSensingService::new(config.ranging.clone(), arena.sensors());
        let mut pathfinder = Pathfinder::new(config.pathfinder.clone(), None);

        sensing.start().unwrap();
        assert!(sensing.is_running());
        let report = pathfinder
            .path_to(&mut motion, &sensing, Point::new(150.0, 60.0))
            .unwrap();
        sensing.stop().unwrap();
        assert!(!sensing.is_running());

        // the wall forced at least one axis switch before the +Y leg
        assert!(report.legs >= 3, "{:?}", report);
        let truth = arena.true_pose();
        assert!(truth.x >= 147.0 && truth.y >= 57.0, "{:?}", truth);
        assert_eq!(arena.collisions(), 0);

        // restarting re-arms a clean flag
        sensing.start().unwrap();
        assert!(!sensing.is_wall_ahead());
        sensing.stop().unwrap();
    }
}
