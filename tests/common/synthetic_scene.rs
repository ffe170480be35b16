use incremental_sfm::diagnostics::RefinementReport;
use incremental_sfm::model::Viewpoint;
use incremental_sfm::source::{CorrespondenceProvider, KeyMatcher, ViewpointFrame};
use incremental_sfm::synthetic::Scene;
use incremental_sfm::{Aggregator, Database, ReconstructionParams, Refiner};

/// Feed `frames` through aggregation and refinement without the driver,
/// auditing invariants after every mutation.
pub fn drive(
    frames: Vec<ViewpointFrame>,
    params: &ReconstructionParams,
) -> (Database, Vec<RefinementReport>) {
    let mut db = Database::new();
    let aggregator = Aggregator::new(params.window);
    let refiner = Refiner::new(params);
    let mut matcher = KeyMatcher;
    let mut reports = Vec::new();
    for frame in frames {
        let viewpoint = Viewpoint::from_frame(frame);
        let table = matcher.correspondences(&viewpoint, db.recent(params.window));
        db.push_viewpoint(viewpoint).expect("viewpoints arrive in order");
        aggregator
            .aggregate(&mut db, &table)
            .expect("aggregation keeps invariants");
        db.check_invariants().expect("invariants after aggregation");
        if db.viewpoint_count() >= params.effective_min_viewpoints() {
            reports.push(refiner.refine(&mut db));
            db.check_invariants().expect("invariants after refinement");
        }
    }
    (db, reports)
}

/// Largest position error of viewpoints against the scene poses.
pub fn max_pose_error(db: &Database, scene: &Scene) -> f64 {
    db.viewpoints()
        .iter()
        .zip(&scene.poses)
        .map(|(vp, truth)| {
            (vp.position - truth.position).norm() + (vp.orientation - truth.orientation).norm()
        })
        .fold(0.0, f64::max)
}

/// Largest structure position error, matching structures to scene points by
/// the key of their first feature.
pub fn max_structure_error(db: &Database, scene: &Scene) -> f64 {
    db.structures()
        .map(|(_, s)| {
            let key = db
                .feature(s.features()[0])
                .and_then(|f| f.key)
                .expect("synthetic features are keyed") as usize;
            (s.position - scene.points[key]).norm()
        })
        .fold(0.0, f64::max)
}
