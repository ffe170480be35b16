use crate::model::{Structure, StructureId};
use serde::Serialize;
use std::collections::HashSet;

/// Classification of a structure relative to the newest viewpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StructureType {
    /// Two features, one of them from the newest viewpoint.
    A,
    /// More than two features, one of them from the newest viewpoint.
    B,
    /// Not observed by the newest viewpoint.
    C,
}

impl StructureType {
    pub fn classify(structure: &Structure, newest: Option<usize>) -> Self {
        match newest {
            Some(n) if structure.last_viewpoint() == Some(n) => {
                if structure.len() > 2 {
                    StructureType::B
                } else {
                    StructureType::A
                }
            }
            _ => StructureType::C,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StructureType::A => "A",
            StructureType::B => "B",
            StructureType::C => "C",
        }
    }
}

/// Structures removed from each range by one removal batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemovalCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl RemovalCounts {
    pub fn total(&self) -> usize {
        self.a + self.b + self.c
    }
}

/// Ordered view over the live structures: all type A ids, then all type B,
/// then all type C.
///
/// The two counters are the range boundaries; every mutation keeps them in
/// step with the order vector.
#[derive(Clone, Debug, Default)]
pub struct Partition {
    order: Vec<StructureId>,
    a: usize,
    b: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(A, B, C)` range sizes.
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.a, self.b, self.order.len() - self.a - self.b)
    }

    pub fn all(&self) -> &[StructureId] {
        &self.order
    }

    pub fn range(&self, ty: StructureType) -> &[StructureId] {
        match ty {
            StructureType::A => &self.order[..self.a],
            StructureType::B => &self.order[self.a..self.a + self.b],
            StructureType::C => &self.order[self.a + self.b..],
        }
    }

    /// Types A and B: everything observed by the newest viewpoint.
    pub fn touching_newest(&self) -> &[StructureId] {
        &self.order[..self.a + self.b]
    }

    /// Range type of a slot position.
    pub fn type_at(&self, position: usize) -> StructureType {
        if position < self.a {
            StructureType::A
        } else if position < self.a + self.b {
            StructureType::B
        } else {
            StructureType::C
        }
    }

    /// Move everything into range C, as when a viewpoint that nothing
    /// references yet becomes the newest.
    pub(crate) fn demote_all(&mut self) {
        self.a = 0;
        self.b = 0;
    }

    pub(crate) fn insert(&mut self, id: StructureId, ty: StructureType) {
        match ty {
            StructureType::A => {
                self.order.insert(self.a, id);
                self.a += 1;
            }
            StructureType::B => {
                self.order.insert(self.a + self.b, id);
                self.b += 1;
            }
            StructureType::C => self.order.push(id),
        }
    }

    /// Move `id` to the range of `ty`. Returns `false` if `id` is unknown.
    pub(crate) fn reclassify(&mut self, id: StructureId, ty: StructureType) -> bool {
        let Some(position) = self.order.iter().position(|&s| s == id) else {
            return false;
        };
        if self.type_at(position) == ty {
            return true;
        }
        self.remove_at(position);
        self.insert(id, ty);
        true
    }

    fn remove_at(&mut self, position: usize) -> StructureType {
        let ty = self.type_at(position);
        self.order.remove(position);
        match ty {
            StructureType::A => self.a -= 1,
            StructureType::B => self.b -= 1,
            StructureType::C => {}
        }
        ty
    }

    /// Drop every id of `removed`, preserving the relative order of the rest.
    pub(crate) fn remove_many(&mut self, removed: &HashSet<StructureId>) -> RemovalCounts {
        let mut counts = RemovalCounts::default();
        if removed.is_empty() {
            return counts;
        }
        let mut position = 0usize;
        let (a, b) = (self.a, self.b);
        self.order.retain(|id| {
            let keep = !removed.contains(id);
            if !keep {
                if position < a {
                    counts.a += 1;
                } else if position < a + b {
                    counts.b += 1;
                } else {
                    counts.c += 1;
                }
            }
            position += 1;
            keep
        });
        self.a -= counts.a;
        self.b -= counts.b;
        counts
    }
}
