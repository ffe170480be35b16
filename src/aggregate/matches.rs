use crate::error::{Error, Result};

/// Row-major correspondence table of a new viewpoint against its window.
///
/// Row `q` belongs to observation `q` of the new viewpoint; slot `s` to the
/// `s`-th prior viewpoint of the window, oldest first. `None` is "no match".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchTable {
    rows: usize,
    width: usize,
    entries: Vec<Option<usize>>,
}

impl MatchTable {
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            rows,
            width,
            entries: vec![None; rows * width],
        }
    }

    /// Build from explicit rows, which must share one width.
    pub fn from_rows(rows: Vec<Vec<Option<usize>>>, width: usize) -> Result<Self> {
        let count = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(Error::MatchTableShape {
                rows: count,
                width: bad.len(),
                expected_rows: count,
                expected_width: width,
            });
        }
        Ok(Self {
            rows: count,
            width,
            entries: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set(&mut self, row: usize, slot: usize, train: usize) {
        self.entries[row * self.width + slot] = Some(train);
    }

    pub fn get(&self, row: usize, slot: usize) -> Option<usize> {
        self.entries[row * self.width + slot]
    }

    pub fn row(&self, row: usize) -> &[Option<usize>] {
        &self.entries[row * self.width..(row + 1) * self.width]
    }
}
