mod common;

use common::init_logger;
use incremental_sfm::aggregate::MatchTable;
use incremental_sfm::diagnostics::StepOutcome;
use incremental_sfm::model::Viewpoint;
use incremental_sfm::source::{CorrespondenceProvider, KeyMatcher, VecSource};
use incremental_sfm::synthetic::Scene;
use incremental_sfm::{Error, ReconstructionParams, Reconstructor};
use std::fs;

/// Key matching, except for one viewpoint whose rows are all "no match".
struct BlindAt {
    viewpoint: usize,
}

impl CorrespondenceProvider for BlindAt {
    fn correspondences(&mut self, viewpoint: &Viewpoint, window: &[Viewpoint]) -> MatchTable {
        if viewpoint.index == self.viewpoint {
            MatchTable::new(viewpoint.features.len(), window.len())
        } else {
            KeyMatcher.correspondences(viewpoint, window)
        }
    }
}

#[test]
fn driver_defers_then_refines_and_exports() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::straight_line(4);
    let mut driver = Reconstructor::new(
        VecSource::new(scene.frames(true)),
        KeyMatcher,
        ReconstructionParams::default(),
    )
    .unwrap()
    .with_export_dir(dir.path());

    let summary = driver.run().unwrap();
    assert_eq!(summary.viewpoints, 4);
    assert_eq!(summary.deferred, 2);
    assert_eq!(summary.refined, 2);
    assert_eq!(summary.unconverged, 0);
    assert_eq!(summary.structures, 6);

    let structure = fs::read_to_string(dir.path().join("3_structure.xyz")).unwrap();
    assert_eq!(structure.lines().count(), 6);
    assert!(structure.lines().all(|l| l.ends_with(" 255 0 0")));
    let odometry = fs::read_to_string(dir.path().join("3_odometry.xyz")).unwrap();
    assert_eq!(odometry.lines().count(), 4);
    assert!(dir.path().join("2_structure.xyz").exists());
    assert!(!dir.path().join("1_structure.xyz").exists());

    assert!(matches!(driver.step().unwrap(), StepOutcome::Exhausted));
}

#[test]
fn export_failure_does_not_stop_the_pipeline() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    fs::write(&blocker, "occupied").unwrap();
    let scene = Scene::straight_line(3);
    let mut driver = Reconstructor::new(
        VecSource::new(scene.frames(true)),
        KeyMatcher,
        ReconstructionParams::default(),
    )
    .unwrap()
    .with_export_dir(&blocker);

    let summary = driver.run().unwrap();
    assert_eq!(summary.refined, 1);
    let last = summary.steps.last().unwrap();
    assert_eq!(last.export_failures, 2);
    assert!(last.refinement.as_ref().is_some_and(|r| r.converged));
}

#[test]
fn blind_viewpoint_creates_nothing_and_still_advances() {
    init_logger();
    let scene = Scene::straight_line(4);
    let mut driver = Reconstructor::new(
        VecSource::new(scene.frames(true)),
        BlindAt { viewpoint: 3 },
        ReconstructionParams::default(),
    )
    .unwrap();
    for _ in 0..3 {
        driver.step().unwrap();
    }
    let before = driver.database().structure_count();
    match driver.step().unwrap() {
        StepOutcome::Refined(report) => {
            assert_eq!(report.viewpoint, 3);
            assert_eq!(report.aggregation.unmatched, 6);
            assert_eq!(report.aggregation.created, 0);
            assert_eq!(report.aggregation.aggregated, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let db = driver.database();
    assert_eq!(db.structure_count(), before);
    assert_eq!(db.newest(), Some(3));
    assert!(db.viewpoints()[3].features.iter().all(|f| f.structure.is_none()));
    db.check_invariants().unwrap();
}

#[test]
fn empty_polls_are_dropped() {
    let frames = Scene::straight_line(3).frames(true);
    let mut entries = vec![None];
    for frame in frames {
        entries.push(Some(frame));
        entries.push(None);
    }
    let mut driver = Reconstructor::new(
        VecSource::with_gaps(entries),
        KeyMatcher,
        ReconstructionParams::default(),
    )
    .unwrap();
    let summary = driver.run().unwrap();
    assert_eq!(summary.dropped, 4);
    assert_eq!(summary.viewpoints, 3);
    assert_eq!(summary.refined, 1);
}

#[test]
fn out_of_order_source_is_fatal() {
    let mut frames = Scene::straight_line(3).frames(true);
    frames.swap(1, 2);
    let mut driver = Reconstructor::new(
        VecSource::new(frames),
        KeyMatcher,
        ReconstructionParams::default(),
    )
    .unwrap();
    let err = driver.run().unwrap_err();
    assert!(
        matches!(err, Error::OutOfOrder { expected: 1, found: 2 }),
        "{err}"
    );
}

#[test]
fn dedicated_pool_gives_the_same_result() {
    let scene = Scene::straight_line(5);
    let run = |threads: Option<usize>| {
        let params = ReconstructionParams {
            threads,
            ..ReconstructionParams::default()
        };
        let mut driver =
            Reconstructor::new(VecSource::new(scene.frames(true)), KeyMatcher, params).unwrap();
        driver.run().unwrap();
        driver.database().trajectory()
    };
    let pooled = run(Some(2));
    let global = run(None);
    for (a, b) in pooled.poses.iter().zip(&global.poses) {
        assert!((a.position - b.position).norm() < 1e-9);
    }
}
