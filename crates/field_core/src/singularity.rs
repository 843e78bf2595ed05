//! Prescribed singularities of an N-direction field.
//!
//! Singularities sit on faces (the field itself lives on vertices). An index
//! `k` means the field turns by `k / N` of a full turn around the face, so
//! the indices are already degree-scaled integers. On every closed
//! component the indices must add up to `N * χ`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::mesh::{FaceId, Mesh};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingularitySet {
    indices: BTreeMap<FaceId, i32>,
}

impl SingularitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every prescribed singularity.
    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// Prescribe index `index` at `face`, replacing any previous value.
    pub fn set(&mut self, face: FaceId, index: i32) {
        self.indices.insert(face, index);
    }

    pub fn remove(&mut self, face: FaceId) -> Option<i32> {
        self.indices.remove(&face)
    }

    /// Index at `face`, zero when nothing is prescribed there.
    pub fn get(&self, face: FaceId) -> i32 {
        self.indices.get(&face).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FaceId, i32)> + '_ {
        self.indices.iter().map(|(&face, &index)| (face, index))
    }

    /// Sum of all indices.
    pub fn index_sum(&self) -> i64 {
        self.indices.values().map(|&k| k as i64).sum()
    }

    /// Verify that every face exists and that on each closed component the
    /// indices sum to `degree * χ`. Components with boundary are not
    /// constrained: the boundary absorbs any remaining turning.
    pub fn check(&self, mesh: &Mesh, degree: u32) -> Result<(), FieldError> {
        self.check_components(mesh, degree, false)
    }

    /// Like [`check`](Self::check), but components with boundary are held to
    /// `degree * χ` as well. With the field pinned to the boundary tangent
    /// the boundary turning is fixed and absorbs nothing.
    pub fn check_fixed_boundary(&self, mesh: &Mesh, degree: u32) -> Result<(), FieldError> {
        self.check_components(mesh, degree, true)
    }

    fn check_components(
        &self,
        mesh: &Mesh,
        degree: u32,
        include_bounded: bool,
    ) -> Result<(), FieldError> {
        if let Some((&face, _)) = self
            .indices
            .iter()
            .find(|(face, _)| face.0 >= mesh.face_count())
        {
            return Err(FieldError::UnknownFace(face));
        }

        let labels = mesh.face_components();
        for (component_index, component) in mesh.components().iter().enumerate() {
            if !include_bounded && !component.is_closed() {
                continue;
            }
            let observed: i64 = self
                .iter()
                .filter(|(face, _)| labels[face.0] == component_index)
                .map(|(_, k)| k as i64)
                .sum();
            let expected = degree as i64 * component.euler_characteristic();
            if observed != expected {
                return Err(FieldError::IndexSum {
                    component: component_index,
                    expected,
                    observed,
                    degree,
                });
            }
        }
        Ok(())
    }
}
