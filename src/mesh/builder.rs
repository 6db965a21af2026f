//! Mesh construction utilities.
//!
//! Builds half-edge meshes from face-vertex lists and converts them back.
//! Input faces are counter-clockwise triangles.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{MeshError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Returns an error if the face list is empty, a face references a vertex
/// out of range, a face repeats a vertex, or a directed edge occurs twice
/// (non-manifold or inconsistently wound input).
///
/// # Example
/// ```
/// use whittle::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    for &pos in vertices {
        mesh.add_vertex(pos);
    }

    // Directed edge (origin, dest) -> interior half-edge.
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId> = HashMap::new();

    // First pass: interior half-edges and faces.
    for face in faces {
        let base = mesh.num_halfedges();
        let face_id = FaceId::new(mesh.num_faces());
        let hes = [
            HalfEdgeId::new(base),
            HalfEdgeId::new(base + 1),
            HalfEdgeId::new(base + 2),
        ];

        mesh.halfedges.extend([HalfEdge::default(); 3]);
        mesh.faces.push(Face { halfedge: hes[0] });

        for k in 0..3 {
            let he = mesh.halfedge_mut(hes[k]);
            he.origin = VertexId::new(face[k]);
            he.next = hes[(k + 1) % 3];
            he.prev = hes[(k + 2) % 3];
            he.face = face_id;

            mesh.vertex_mut(VertexId::new(face[k])).halfedge = hes[k];

            let key = (face[k], face[(k + 1) % 3]);
            if edge_map.insert(key, hes[k]).is_some() {
                return Err(MeshError::NonManifoldEdge { v0: key.0, v1: key.1 });
            }
        }
    }

    // Second pass: link twins, creating boundary half-edges where the
    // opposite directed edge is missing.
    let interior: Vec<((usize, usize), HalfEdgeId)> =
        edge_map.iter().map(|(&e, &he)| (e, he)).collect();
    for ((v0, v1), he) in interior {
        if let Some(&twin) = edge_map.get(&(v1, v0)) {
            mesh.halfedge_mut(he).twin = twin;
        } else {
            let boundary = HalfEdgeId::new(mesh.num_halfedges());
            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(v1),
                twin: he,
                ..HalfEdge::default()
            });
            mesh.halfedge_mut(he).twin = boundary;
        }
    }

    link_boundary_loops(&mut mesh);
    fix_boundary_vertex_halfedges(&mut mesh);

    Ok(mesh)
}

/// Link boundary half-edges into loops via their shared vertices.
fn link_boundary_loops(mesh: &mut HalfEdgeMesh) {
    let boundary: Vec<HalfEdgeId> = mesh
        .halfedge_ids()
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    // A manifold vertex has at most one outgoing boundary half-edge.
    let mut outgoing: HashMap<usize, HalfEdgeId> = HashMap::new();
    for &he in &boundary {
        outgoing.insert(mesh.origin(he).index(), he);
    }

    for &he in &boundary {
        if let Some(&next) = outgoing.get(&mesh.dest(he).index()) {
            mesh.halfedge_mut(he).next = next;
            mesh.halfedge_mut(next).prev = he;
        }
    }
}

/// Point boundary vertices at a boundary half-edge so vertex circulation
/// starts (and terminates) on the boundary.
fn fix_boundary_vertex_halfedges(mesh: &mut HalfEdgeMesh) {
    for vi in 0..mesh.num_vertices() {
        let v = VertexId::new(vi);
        let start = mesh.vertex(v).halfedge;
        if !start.is_valid() {
            continue;
        }

        let mut he = start;
        loop {
            if mesh.is_boundary_halfedge(he) {
                mesh.vertex_mut(v).halfedge = he;
                break;
            }
            he = mesh.next(mesh.twin(he));
            if he == start {
                break;
            }
        }
    }
}

/// Convert a half-edge mesh back to a face-vertex representation.
pub fn to_face_vertex(mesh: &HalfEdgeMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();
    let faces = mesh
        .face_ids()
        .map(|f| {
            let [v0, v1, v2] = mesh.face_triangle(f);
            [v0.index(), v1.index(), v2.index()]
        })
        .collect();
    (vertices, faces)
}
