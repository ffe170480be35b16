use super::{Database, StructureType};
use crate::error::{InvariantViolation, Result};
use crate::model::StructureId;
use std::collections::HashSet;

impl Database {
    /// Audit every cross-reference between structures, features, viewpoints
    /// and the partition. Returns the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        for (key, structure) in self.structures.iter() {
            let id = StructureId(key);
            if structure.len() < 2 {
                return Err(InvariantViolation::UndersizedStructure {
                    structure: id,
                    count: structure.len(),
                }
                .into());
            }
            for pair in structure.features().windows(2) {
                if pair[0].viewpoint == pair[1].viewpoint {
                    return Err(InvariantViolation::DuplicateViewpoint {
                        structure: id,
                        viewpoint: pair[0].viewpoint,
                    }
                    .into());
                }
            }
            for &fid in structure.features() {
                let found = self.feature(fid).and_then(|f| f.structure);
                if found != Some(id) {
                    return Err(InvariantViolation::BrokenBackReference {
                        feature: fid,
                        structure: id,
                        found,
                    }
                    .into());
                }
            }
        }

        for vp in &self.viewpoints {
            for (index, feature) in vp.features.iter().enumerate() {
                let Some(owner) = feature.structure else {
                    continue;
                };
                let fid = vp.feature_id(index);
                let listed = self.structure(owner).is_some_and(|s| s.contains(fid));
                if !listed {
                    return Err(InvariantViolation::MissingMembership {
                        feature: fid,
                        structure: owner,
                    }
                    .into());
                }
            }
        }

        let newest = self.newest();
        let mut seen = HashSet::with_capacity(self.partition.len());
        for (position, &id) in self.partition.all().iter().enumerate() {
            let expected = self.partition.type_at(position);
            let found = match self.structure(id) {
                Some(s) => StructureType::classify(s, newest).label(),
                None => "removed",
            };
            if !seen.insert(id) {
                return Err(InvariantViolation::PartitionMismatch {
                    position,
                    structure: id,
                    expected: expected.label(),
                    found: "duplicate",
                }
                .into());
            }
            if found != expected.label() {
                return Err(InvariantViolation::PartitionMismatch {
                    position,
                    structure: id,
                    expected: expected.label(),
                    found,
                }
                .into());
            }
        }
        if let Some((key, s)) = self
            .structures
            .iter()
            .find(|(key, _)| !seen.contains(&StructureId(*key)))
        {
            return Err(InvariantViolation::PartitionMismatch {
                position: self.partition.len(),
                structure: StructureId(key),
                expected: StructureType::classify(s, newest).label(),
                found: "absent",
            }
            .into());
        }
        Ok(())
    }
}
