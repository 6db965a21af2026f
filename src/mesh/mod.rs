//! Core mesh data structures.
//!
//! The primary type is [`HalfEdgeMesh`], a half-edge (doubly-connected edge
//! list) representation of a triangle mesh with O(1) adjacency queries.
//! Mesh elements are identified by the type-safe indices [`VertexId`],
//! [`HalfEdgeId`], and [`FaceId`].
//!
//! Meshes are built from face-vertex lists:
//!
//! ```
//! use whittle::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//! assert_eq!(mesh.num_faces(), 1);
//! ```

mod builder;
mod halfedge;
mod index;

pub use builder::{build_from_triangles, to_face_vertex};
pub use halfedge::{Face, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter};
pub use index::{FaceId, HalfEdgeId, VertexId};
