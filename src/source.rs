//! Collaborator seams of the core: where viewpoints and correspondences come
//! from.
//!
//! [`VecSource`] and [`KeyMatcher`] are the in-memory implementations used by
//! the demo and the tests. Real front-ends (image decoding, descriptor
//! matching) implement the same two traits.

use crate::aggregate::MatchTable;
use crate::model::Viewpoint;
use crate::types::{Real, Vec2, Vec3};
use std::collections::{HashMap, VecDeque};

/// One detected observation of an incoming viewpoint.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Ray in the viewpoint frame; normalised on ingestion.
    pub direction: Vec3,
    pub pixel: Option<Vec2>,
    pub range: Option<Real>,
    pub key: Option<u64>,
}

impl Observation {
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction,
            pixel: None,
            range: None,
            key: None,
        }
    }

    pub fn with_range(direction: Vec3, range: Real) -> Self {
        Self {
            range: Some(range),
            ..Self::new(direction)
        }
    }

    pub fn keyed(mut self, key: u64) -> Self {
        self.key = Some(key);
        self
    }

    pub fn at_pixel(mut self, pixel: Vec2) -> Self {
        self.pixel = Some(pixel);
        self
    }
}

/// A viewpoint as delivered by a source, before ingestion.
#[derive(Clone, Debug)]
pub struct ViewpointFrame {
    pub index: usize,
    pub uid: String,
    pub observations: Vec<Observation>,
}

impl ViewpointFrame {
    pub fn new(index: usize, observations: Vec<Observation>) -> Self {
        Self {
            index,
            uid: format!("{index:05}"),
            observations,
        }
    }
}

/// Supplies viewpoints in strict sequential order.
pub trait ViewpointSource {
    /// `false` once the stream is over.
    fn has_next(&self) -> bool;

    /// Next viewpoint, or `None` when nothing is available right now.
    fn next_viewpoint(&mut self) -> Option<ViewpointFrame>;
}

/// Produces the match table of a new viewpoint against its prior window.
///
/// `window` holds the most recent prior viewpoints, oldest first; the table
/// must have one row per feature of `viewpoint` and one slot per window entry.
pub trait CorrespondenceProvider {
    fn correspondences(&mut self, viewpoint: &Viewpoint, window: &[Viewpoint]) -> MatchTable;
}

/// Queue-backed source. `None` entries stand for polls that found nothing.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    queue: VecDeque<Option<ViewpointFrame>>,
}

impl VecSource {
    pub fn new(frames: impl IntoIterator<Item = ViewpointFrame>) -> Self {
        Self {
            queue: frames.into_iter().map(Some).collect(),
        }
    }

    pub fn with_gaps(entries: impl IntoIterator<Item = Option<ViewpointFrame>>) -> Self {
        Self {
            queue: entries.into_iter().collect(),
        }
    }
}

impl ViewpointSource for VecSource {
    fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    fn next_viewpoint(&mut self) -> Option<ViewpointFrame> {
        self.queue.pop_front().flatten()
    }
}

/// Matches observations carrying the same key.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyMatcher;

impl CorrespondenceProvider for KeyMatcher {
    fn correspondences(&mut self, viewpoint: &Viewpoint, window: &[Viewpoint]) -> MatchTable {
        let lookups: Vec<HashMap<u64, usize>> = window
            .iter()
            .map(|prior| {
                prior
                    .features
                    .iter()
                    .enumerate()
                    .filter_map(|(i, f)| f.key.map(|k| (k, i)))
                    .collect()
            })
            .collect();
        let mut table = MatchTable::new(viewpoint.features.len(), window.len());
        for (row, feature) in viewpoint.features.iter().enumerate() {
            let Some(key) = feature.key else { continue };
            for (slot, lookup) in lookups.iter().enumerate() {
                if let Some(&train) = lookup.get(&key) {
                    table.set(row, slot, train);
                }
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_frame(index: usize, keys: &[u64]) -> ViewpointFrame {
        ViewpointFrame::new(
            index,
            keys.iter()
                .map(|&k| Observation::new(Vec3::z()).keyed(k))
                .collect(),
        )
    }

    #[test]
    fn key_matcher_fills_slots_oldest_first() {
        let window = vec![
            Viewpoint::from_frame(keyed_frame(0, &[10, 11, 12])),
            Viewpoint::from_frame(keyed_frame(1, &[12, 13])),
        ];
        let mut frame = keyed_frame(2, &[12, 99]);
        frame.observations.push(Observation::new(Vec3::x()));
        let current = Viewpoint::from_frame(frame);
        let table = KeyMatcher.correspondences(&current, &window);
        assert_eq!(table.rows(), 3);
        assert_eq!(table.width(), 2);
        assert_eq!(table.row(0), &[Some(2), Some(0)]);
        assert_eq!(table.row(1), &[None, None]);
        assert_eq!(table.row(2), &[None, None]);
    }

    #[test]
    fn vec_source_reports_gaps_and_exhaustion() {
        let mut source = VecSource::with_gaps(vec![None, Some(keyed_frame(0, &[1]))]);
        assert!(source.has_next());
        assert!(source.next_viewpoint().is_none());
        assert_eq!(source.next_viewpoint().map(|f| f.index), Some(0));
        assert!(!source.has_next());
    }
}
