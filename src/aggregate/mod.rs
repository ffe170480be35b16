//! Aggregation of a new viewpoint's observations into the structure set.
//!
//! For every observation the matched prior features are grouped by the
//! structure that already owns them:
//!
//! - no raw match: nothing to do;
//! - matches, but no owning structure: seed a new structure with the
//!   observation and every matched prior feature;
//! - exactly one owning structure: require at least two window matches to
//!   agree on it, then attach the unowned matched features and the
//!   observation, one feature per viewpoint;
//! - two or more owning structures: a fusion candidate. Merging is not
//!   supported; the observation is dropped and counted.

mod matches;

pub use matches::MatchTable;

use crate::database::Database;
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::AggregationReport;
use crate::error::{Error, Result};
use crate::model::{FeatureId, StructureId};
use log::debug;
use std::time::Instant;

/// Window matches that must agree on a single existing structure.
const MIN_AGREEING_MATCHES: usize = 2;

#[derive(Clone, Debug)]
pub struct Aggregator {
    window: usize,
}

impl Aggregator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Merge the newest viewpoint of `db` using `table`.
    ///
    /// The table must hold one row per feature of the newest viewpoint and one
    /// slot per prior viewpoint of its window. Invariant violations abort the
    /// pass; weak, unmatched and ambiguous observations are only counted.
    pub fn aggregate(&self, db: &mut Database, table: &MatchTable) -> Result<AggregationReport> {
        let start = Instant::now();
        let Some(newest) = db.newest() else {
            return Ok(AggregationReport::default());
        };
        let window_start = newest.saturating_sub(self.window);
        let observations = db.viewpoints()[newest].features.len();
        let expected_width = newest - window_start;
        if table.rows() != observations || table.width() != expected_width {
            return Err(Error::MatchTableShape {
                rows: table.rows(),
                width: table.width(),
                expected_rows: observations,
                expected_width,
            });
        }

        let mut report = AggregationReport {
            viewpoint: newest,
            observations,
            ..AggregationReport::default()
        };
        for query in 0..observations {
            let matched = matched_features(db, table, query, window_start)?;
            if matched.is_empty() {
                report.unmatched += 1;
                continue;
            }
            let candidates = owning_structures(db, &matched);
            let current = FeatureId::new(newest, query);
            match candidates.as_slice() {
                [] => {
                    let mut members = matched;
                    members.push(current);
                    db.create_structure(&members)?;
                    report.created += 1;
                    report.attached_features += members.len();
                }
                [(structure, support)] => {
                    if *support < MIN_AGREEING_MATCHES {
                        report.weak_skipped += 1;
                        continue;
                    }
                    self.extend(db, *structure, &matched, current, &mut report)?;
                    report.aggregated += 1;
                }
                _ => report.fused_skipped += 1,
            }
        }
        report.elapsed_ms = elapsed_ms(start);
        debug!(
            "aggregate: viewpoint {} obs={} created={} aggregated={} weak={} fused={} unmatched={}",
            newest,
            report.observations,
            report.created,
            report.aggregated,
            report.weak_skipped,
            report.fused_skipped,
            report.unmatched
        );
        Ok(report)
    }

    fn extend(
        &self,
        db: &mut Database,
        structure: StructureId,
        matched: &[FeatureId],
        current: FeatureId,
        report: &mut AggregationReport,
    ) -> Result<()> {
        let mut members: Vec<FeatureId> = matched
            .iter()
            .copied()
            .filter(|&f| db.feature(f).is_some_and(|f| f.structure.is_none()))
            .collect();
        members.push(current);
        for feature in members {
            if db.attach(structure, feature)? {
                report.attached_features += 1;
            } else {
                report.rejected_duplicates += 1;
            }
        }
        db.refresh_type(structure);
        Ok(())
    }
}

/// Valid prior features referenced by row `query`, oldest window slot first.
fn matched_features(
    db: &Database,
    table: &MatchTable,
    query: usize,
    window_start: usize,
) -> Result<Vec<FeatureId>> {
    let mut matched = Vec::new();
    for (slot, entry) in table.row(query).iter().enumerate() {
        let Some(train) = *entry else { continue };
        let viewpoint = window_start + slot;
        let available = db.viewpoints()[viewpoint].features.len();
        if train >= available {
            return Err(Error::MatchOutOfRange {
                query,
                slot,
                train,
                viewpoint,
                available,
            });
        }
        matched.push(FeatureId::new(viewpoint, train));
    }
    Ok(matched)
}

/// Distinct owning structures of `matched` with how many matches point to
/// each, in first-seen order.
fn owning_structures(db: &Database, matched: &[FeatureId]) -> Vec<(StructureId, usize)> {
    let mut owners: Vec<(StructureId, usize)> = Vec::new();
    for owner in matched
        .iter()
        .filter_map(|&f| db.feature(f).and_then(|f| f.structure))
    {
        match owners.iter_mut().find(|(s, _)| *s == owner) {
            Some((_, count)) => *count += 1,
            None => owners.push((owner, 1)),
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{database, frame};
    use crate::database::StructureType;

    fn table(rows: Vec<Vec<Option<usize>>>, width: usize) -> MatchTable {
        MatchTable::from_rows(rows, width).unwrap()
    }

    #[test]
    fn unmatched_rows_create_nothing() {
        let mut db = database(2, 2);
        db.push_viewpoint(frame(2, 3)).unwrap();
        let report = Aggregator::new(5)
            .aggregate(&mut db, &MatchTable::new(3, 2))
            .unwrap();
        assert_eq!(report.unmatched, 3);
        assert_eq!(report.created, 0);
        assert_eq!(db.structure_count(), 0);
        assert_eq!(db.newest(), Some(2));
        db.check_invariants().unwrap();
    }

    #[test]
    fn first_pairing_seeds_a_type_a_structure() {
        let mut db = database(1, 2);
        db.push_viewpoint(frame(1, 2)).unwrap();
        let report = Aggregator::new(5)
            .aggregate(&mut db, &table(vec![vec![Some(1)], vec![None]], 1))
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.attached_features, 2);
        let (id, s) = db.structures().next().unwrap();
        assert_eq!(s.features(), &[FeatureId::new(0, 1), FeatureId::new(1, 0)]);
        assert_eq!(db.partition().range(StructureType::A), &[id]);
        db.check_invariants().unwrap();
    }

    #[test]
    fn agreeing_matches_extend_a_structure() {
        let mut db = database(2, 2);
        db.push_viewpoint(frame(2, 2)).unwrap();
        let agg = Aggregator::new(5);
        // Viewpoint 2 pairs feature 0 with viewpoint 1 only: new structure.
        agg.aggregate(&mut db, &table(vec![vec![None, Some(0)], vec![None, None]], 2))
            .unwrap();
        db.push_viewpoint(frame(3, 1)).unwrap();
        // Viewpoint 3 sees it in 1 and 2 (same structure) plus an orphan in 0.
        let report = agg
            .aggregate(&mut db, &table(vec![vec![Some(1), Some(0), Some(0)]], 3))
            .unwrap();
        assert_eq!(report.aggregated, 1);
        assert_eq!(report.attached_features, 2);
        let (_, s) = db.structures().next().unwrap();
        let viewpoints: Vec<usize> = s.features().iter().map(|f| f.viewpoint).collect();
        assert_eq!(viewpoints, vec![0, 1, 2, 3]);
        assert_eq!(db.partition().counts(), (0, 1, 0));
        db.check_invariants().unwrap();
    }

    #[test]
    fn single_weak_match_is_skipped() {
        let mut db = database(2, 1);
        db.create_structure(&[FeatureId::new(0, 0), FeatureId::new(1, 0)])
            .unwrap();
        db.push_viewpoint(frame(2, 1)).unwrap();
        let report = Aggregator::new(5)
            .aggregate(&mut db, &table(vec![vec![None, Some(0)]], 2))
            .unwrap();
        assert_eq!(report.weak_skipped, 1);
        assert_eq!(db.feature(FeatureId::new(2, 0)).unwrap().structure, None);
        db.check_invariants().unwrap();
    }

    #[test]
    fn ambiguous_fusion_is_counted_and_dropped() {
        let mut db = database(3, 2);
        let first = db
            .create_structure(&[FeatureId::new(0, 0), FeatureId::new(1, 0)])
            .unwrap();
        let second = db
            .create_structure(&[FeatureId::new(1, 1), FeatureId::new(2, 1)])
            .unwrap();
        db.push_viewpoint(frame(3, 1)).unwrap();
        let report = Aggregator::new(5)
            .aggregate(&mut db, &table(vec![vec![Some(0), None, Some(1)]], 3))
            .unwrap();
        assert_eq!(report.fused_skipped, 1);
        assert_eq!(report.created + report.aggregated, 0);
        assert_eq!(db.structure(first).unwrap().len(), 2);
        assert_eq!(db.structure(second).unwrap().len(), 2);
        assert_eq!(db.feature(FeatureId::new(3, 0)).unwrap().structure, None);
        db.check_invariants().unwrap();
    }

    #[test]
    fn second_observation_of_same_point_is_rejected_as_duplicate() {
        let mut db = database(2, 1);
        db.create_structure(&[FeatureId::new(0, 0), FeatureId::new(1, 0)])
            .unwrap();
        db.push_viewpoint(frame(2, 2)).unwrap();
        let report = Aggregator::new(5)
            .aggregate(
                &mut db,
                &table(vec![vec![Some(0), Some(0)], vec![Some(0), Some(0)]], 2),
            )
            .unwrap();
        assert_eq!(report.aggregated, 2);
        assert_eq!(report.attached_features, 1);
        assert_eq!(report.rejected_duplicates, 1);
        db.check_invariants().unwrap();
    }

    #[test]
    fn malformed_tables_are_contract_errors() {
        let mut db = database(2, 1);
        db.push_viewpoint(frame(2, 1)).unwrap();
        let agg = Aggregator::new(5);
        let err = agg.aggregate(&mut db, &MatchTable::new(1, 1)).unwrap_err();
        assert!(matches!(err, Error::MatchTableShape { expected_width: 2, .. }), "{err}");
        let err = agg
            .aggregate(&mut db, &table(vec![vec![Some(4), None]], 2))
            .unwrap_err();
        assert!(matches!(err, Error::MatchOutOfRange { train: 4, viewpoint: 0, .. }), "{err}");
    }

    #[test]
    fn window_limits_the_slots() {
        let mut db = database(4, 1);
        db.push_viewpoint(frame(4, 1)).unwrap();
        let agg = Aggregator::new(2);
        let report = agg
            .aggregate(&mut db, &table(vec![vec![Some(0), Some(0)]], 2))
            .unwrap();
        assert_eq!(report.created, 1);
        let (_, s) = db.structures().next().unwrap();
        assert_eq!(s.features()[0].viewpoint, 2);
    }
}
