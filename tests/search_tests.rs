// tests/search_tests.rs
// Search runs against the simulated arena with real ray-cast ranging and a
// block-aware classifier and gripper.

#[cfg(test)]
mod tests {
    use gridflag::core::geometry::TileIndex;
    use gridflag::core::{GridSpacing, Pose, PoseEstimator, TurnSignal, Zone};
    use gridflag::devices::sim::{BlockSpec, SimArena, SimConfig, SimDrive};
    use gridflag::navigation::MotionController;
    use gridflag::{ColorId, GridflagConfig, SearchAndAcquire, SearchOutcome};

    fn block(x: f64, y: f64, color: u8) -> BlockSpec {
        BlockSpec {
            x,
            y,
            color: ColorId(color),
            size: 6.0,
        }
    }

    fn setup(blocks: Vec<BlockSpec>) -> (SearchAndAcquire, MotionController<SimDrive>, SimArena) {
        let start = Pose::new(40.0, 90.9, 0.0);
        let config = GridflagConfig {
            sim: SimConfig {
                blocks,
                start,
                ..SimConfig::default()
            },
            ..GridflagConfig::default()
        };
        let arena = SimArena::new(&config);
        let sensors = arena.sensors();
        let search = SearchAndAcquire::new(
            config.search.clone(),
            sensors.clone(),
            sensors.clone(),
            sensors,
        );
        let estimator =
            PoseEstimator::new(start, config.robot.wheel_radius, config.robot.track_width);
        let motion = MotionController::new(
            arena.drive(),
            estimator,
            TurnSignal::new(),
            config.robot.clone(),
        );
        (search, motion, arena)
    }

    fn search_zone() -> Zone {
        Zone::from_tiles(
            TileIndex::new(2, 2),
            TileIndex::new(4, 4),
            GridSpacing::new(30.3),
        )
    }

    #[test]
    fn decoy_is_removed_and_target_acquired() {
        // decoy dead ahead of the first scan origin, target off to the left
        let (search, mut motion, arena) =
            setup(vec![block(100.0, 90.9, 2), block(83.2, 106.5, 3)]);

        let outcome = search.search(&mut motion, &search_zone(), ColorId(3));

        match outcome {
            SearchOutcome::Acquired { rejected, .. } => assert!(rejected >= 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(arena.carried(), Some(ColorId(3)));

        let zone = search_zone();
        let decoy = arena
            .blocks()
            .into_iter()
            .find(|(_, color)| *color == ColorId(2))
            .unwrap();
        assert!(!zone.contains(&decoy.0), "decoy left at {:?}", decoy.0);
    }

    #[test]
    fn zone_without_target_is_exhausted() {
        let (search, mut motion, arena) = setup(vec![block(100.0, 90.9, 2)]);

        let outcome = search.search(&mut motion, &search_zone(), ColorId(3));

        assert!(
            matches!(outcome, SearchOutcome::ZoneExhausted { scans: 3, rejected: 1 }),
            "{:?}",
            outcome
        );
        assert_eq!(arena.carried(), None);
        assert_eq!(arena.collisions(), 0);
    }
}
