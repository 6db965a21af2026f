//! # Whittle
//!
//! Quadric error metric mesh simplification on a half-edge data structure.
//!
//! Whittle provides a half-edge triangle mesh with type-safe indices and a
//! Garland-Heckbert decimation pipeline built on per-vertex quadric error
//! matrices: face quadrics, vertex accumulation, collapse cost and position
//! evaluation with a singular-system fallback, and a cheapest-first edge
//! collapse driver.
//!
//! ## Quick Start
//!
//! ```
//! use whittle::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1], // bottom
//!     [0, 1, 3], // front
//!     [1, 2, 3], // right
//!     [2, 0, 3], // left
//! ];
//!
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_faces(), 4);
//!
//! // Simplify to half the face count.
//! qem_decimate(&mut mesh, &DecimateOptions::with_target_ratio(0.5));
//! assert!(mesh.is_valid());
//! ```
//!
//! ## Working with quadrics directly
//!
//! The [`algo::decimate::Quadric`] type also works standalone, e.g. for
//! implicit-surface style error evaluation:
//!
//! ```
//! use whittle::algo::decimate::Quadric;
//! use nalgebra::{Point3, Vector3};
//!
//! // Squared distance to the plane z = 0.
//! let q = Quadric::from_plane(&Vector3::new(0.0, 0.0, 1.0), 0.0);
//! assert_eq!(q.value(&Point3::new(1.0, 2.0, 3.0)), 9.0);
//! assert_eq!(q.gradient(&Point3::new(1.0, 2.0, 3.0)), Vector3::new(0.0, 0.0, 6.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use whittle::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::decimate::{
        qem_decimate, qem_decimate_with_progress, DecimateOptions, DecimateTarget, EdgeCollapse,
        Quadric, QuadricTopology, VertexQuadricModel,
    };
    pub use crate::algo::progress::Progress;
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, to_face_vertex, Face, FaceId, HalfEdge, HalfEdgeId, HalfEdgeMesh,
        Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        // 4 faces * 3 = 12 half-edges, no boundary
        assert_eq!(mesh.num_halfedges(), 12);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(
                !mesh.is_boundary_vertex(v),
                "vertex {:?} should not be on boundary",
                v
            );
        }
    }
}
