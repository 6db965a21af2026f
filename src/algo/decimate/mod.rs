//! Mesh decimation (simplification) algorithms.
//!
//! This module reduces the number of triangles in a mesh while preserving
//! its overall shape as much as possible.
//!
//! # Quadric Error Metrics (QEM)
//!
//! The QEM algorithm (Garland & Heckbert, 1997) minimizes geometric error
//! during edge collapses. Each vertex carries a quadric matrix summing the
//! squared distances to the planes of its adjacent faces; collapses are
//! executed cheapest-first until the target face count is reached.
//!
//! # Example
//!
//! ```
//! use whittle::prelude::*;
//! use whittle::algo::decimate::{qem_decimate, DecimateOptions};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//! let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // Reduce to 50% of original faces.
//! let options = DecimateOptions::with_target_ratio(0.5);
//! qem_decimate(&mut mesh, &options);
//! assert!(mesh.is_valid());
//! ```
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.

mod qem;
mod quadric;

pub use qem::{
    face_quadric, qem_decimate, qem_decimate_with_progress, vertex_quadric, EdgeCollapse,
    QuadricTopology, VertexQuadricModel,
};
pub use quadric::Quadric;

/// How far to decimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecimateTarget {
    /// Stop when the mesh has at most this many faces.
    FaceCount(usize),
    /// Stop when the face count drops to this fraction of the original
    /// (clamped to `0.0..=1.0`).
    Ratio(f64),
}

impl DecimateTarget {
    /// Resolve the target to an absolute face count.
    pub fn face_count(&self, original_faces: usize) -> usize {
        match *self {
            DecimateTarget::FaceCount(n) => n.min(original_faces),
            DecimateTarget::Ratio(r) => {
                ((original_faces as f64) * r.clamp(0.0, 1.0)).round() as usize
            }
        }
    }
}

/// Options for mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimateOptions {
    /// Stopping criterion.
    pub target: DecimateTarget,

    /// Whether to preserve boundary edges (don't collapse them).
    pub preserve_boundary: bool,

    /// Maximum allowed error for a single edge collapse.
    /// Edges with error above this threshold won't be collapsed.
    pub max_error: Option<f64>,
}

impl DecimateOptions {
    /// Create options to reduce to a target number of faces.
    pub fn with_target_faces(target: usize) -> Self {
        Self {
            target: DecimateTarget::FaceCount(target),
            preserve_boundary: true,
            max_error: None,
        }
    }

    /// Create options to reduce to a ratio of the original face count.
    pub fn with_target_ratio(ratio: f64) -> Self {
        Self {
            target: DecimateTarget::Ratio(ratio),
            preserve_boundary: true,
            max_error: None,
        }
    }

    /// Set whether to preserve boundary edges.
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set maximum error threshold for edge collapses.
    pub fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = Some(max_error);
        self
    }
}
