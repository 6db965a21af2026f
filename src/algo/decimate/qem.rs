//! Quadric error metric (QEM) decimation.
//!
//! The per-vertex error model lives in [`VertexQuadricModel`]: a face
//! quadric is the rank-1 outer product of the face's plane, a vertex quadric
//! is the sum of the quadrics of its currently incident faces, and an edge
//! collapse is priced by solving for the position minimizing the combined
//! endpoint quadric (falling back to the better of the two endpoints and
//! their midpoint when the system is singular).
//!
//! The model talks to the mesh through the [`QuadricTopology`] trait, so the
//! same code prices collapses on a [`HalfEdgeMesh`] and on the driver's
//! internal working set while edges are being collapsed.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use nalgebra::{Point3, Vector3};

use crate::algo::progress::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{build_from_triangles, to_face_vertex, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

use super::quadric::Quadric;
use super::DecimateOptions;

/// Faces with squared-area below this are treated as slivers and contribute
/// a zero normal (hence a zero quadric).
const DEGENERATE_NORMAL_EPS: f64 = 1e-12;

/// Topological and geometric queries the quadric model needs from a mesh.
///
/// Vertices and faces are identified by their index into the mesh's dense
/// element arrays; the model keeps its quadric array parallel to the vertex
/// array. `faces_incident_to` must reflect the topology at call time and
/// never report a face twice. Passing indices of removed elements is a
/// contract violation at this boundary and is not defended against.
pub trait QuadricTopology {
    /// Position of a vertex.
    fn vertex_position(&self, v: usize) -> Point3<f64>;

    /// Unit normal of a face, or the zero vector for a degenerate face.
    fn face_unit_normal(&self, f: usize) -> Vector3<f64>;

    /// Position of one (arbitrary) vertex on a face.
    fn point_on_face(&self, f: usize) -> Point3<f64>;

    /// The faces currently incident to a vertex, without duplicates.
    fn faces_incident_to(&self, v: usize) -> Vec<usize>;
}

impl QuadricTopology for HalfEdgeMesh {
    fn vertex_position(&self, v: usize) -> Point3<f64> {
        *self.position(VertexId::new(v))
    }

    fn face_unit_normal(&self, f: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(FaceId::new(f));
        let n = (p1 - p0).cross(&(p2 - p0));
        let len = n.norm();
        if len * len < DEGENERATE_NORMAL_EPS {
            Vector3::zeros()
        } else {
            n / len
        }
    }

    fn point_on_face(&self, f: usize) -> Point3<f64> {
        self.face_point(FaceId::new(f))
    }

    fn faces_incident_to(&self, v: usize) -> Vec<usize> {
        self.vertex_faces(VertexId::new(v))
            .map(|f| f.index())
            .collect()
    }
}

/// Compute the quadric of a single face from its supporting plane.
///
/// With `p` any vertex on the face and `n` its unit normal, the plane offset
/// is `d = -(p . n)` and the quadric is the outer product of `(n, d)` with
/// itself. Degenerate faces yield the zero quadric.
pub fn face_quadric<T: QuadricTopology>(mesh: &T, f: usize) -> Quadric {
    let n = mesh.face_unit_normal(f);
    let p = mesh.point_on_face(f);
    let d = -n.dot(&p.coords);
    Quadric::from_plane(&n, d)
}

/// Compute the quadric of a vertex: the sum of the quadrics of the faces
/// currently incident to it.
///
/// Accumulation order follows the mesh's incidence enumeration; the sum is
/// order-independent up to floating-point rounding.
pub fn vertex_quadric<T: QuadricTopology>(mesh: &T, v: usize) -> Quadric {
    mesh.faces_incident_to(v)
        .into_iter()
        .map(|f| face_quadric(mesh, f))
        .sum()
}

/// A candidate edge collapse.
///
/// Identifies the two endpoint vertices and carries the two outputs the
/// quadric model fills in: the post-collapse `position` and its `cost`.
#[derive(Debug, Clone)]
pub struct EdgeCollapse {
    /// First endpoint (the vertex that survives the collapse).
    pub v0: usize,
    /// Second endpoint (the vertex removed by the collapse).
    pub v1: usize,
    /// Chosen post-collapse location.
    pub position: Point3<f64>,
    /// Quadric error at `position`. Non-negative for well-formed geometry.
    pub cost: f64,
}

impl EdgeCollapse {
    /// Create an unevaluated candidate for the edge `(v0, v1)`.
    pub fn new(v0: usize, v1: usize) -> Self {
        Self {
            v0,
            v1,
            position: Point3::origin(),
            cost: f64::INFINITY,
        }
    }

    /// Create a candidate from a half-edge and its pair.
    pub fn from_halfedge(mesh: &HalfEdgeMesh, he: HalfEdgeId) -> Self {
        Self::new(mesh.origin(he).index(), mesh.dest(he).index())
    }

    /// Check the evaluated cost for numerical breakdown.
    ///
    /// A negative or non-finite cost means the accumulated quadrics cancelled
    /// catastrophically; the model has no further fallback, so the candidate
    /// should be rejected by the caller.
    pub fn check(&self) -> Result<()> {
        if self.cost.is_finite() && self.cost >= 0.0 {
            Ok(())
        } else {
            Err(MeshError::NumericalBreakdown { cost: self.cost })
        }
    }
}

/// Per-vertex quadric storage and collapse evaluation.
///
/// Holds one quadric per vertex, parallel to the mesh's vertex array. The
/// stored quadric of vertex `i` equals the sum of the face quadrics of its
/// incident faces at the time of the last initialization or refresh; the
/// driver must call [`VertexQuadricModel::on_vertex_updated`] after every
/// collapse so stale entries are never read.
#[derive(Debug, Clone)]
pub struct VertexQuadricModel {
    quadrics: Vec<Quadric>,
}

impl VertexQuadricModel {
    /// Compute the quadric of every vertex of a mesh.
    pub fn new<T: QuadricTopology>(mesh: &T, num_vertices: usize) -> Self {
        let quadrics = (0..num_vertices).map(|v| vertex_quadric(mesh, v)).collect();
        Self { quadrics }
    }

    /// Number of stored vertex quadrics.
    pub fn len(&self) -> usize {
        self.quadrics.len()
    }

    /// Whether the model is empty.
    pub fn is_empty(&self) -> bool {
        self.quadrics.is_empty()
    }

    /// The stored quadric of a vertex.
    pub fn quadric(&self, v: usize) -> &Quadric {
        &self.quadrics[v]
    }

    /// Evaluate the cost and position of a candidate collapse, writing both
    /// output fields.
    ///
    /// The combined quadric `Q` is recomputed from the endpoints' current
    /// incident faces rather than read from the stored array, so candidates
    /// proposed before a refresh are still priced against live topology.
    /// If `Q` has a unique minimizer the position is solved directly and the
    /// cost is `Q` evaluated there; otherwise the better of endpoint 1,
    /// endpoint 2, and their midpoint is taken, ties resolved in that order.
    pub fn compute_collapse<T: QuadricTopology>(&self, mesh: &T, collapse: &mut EdgeCollapse) {
        let q = vertex_quadric(mesh, collapse.v0) + vertex_quadric(mesh, collapse.v1);

        let (position, cost) = match q.minimizer() {
            Some(p) => (p, q.value(&p)),
            None => {
                let p0 = mesh.vertex_position(collapse.v0);
                let p1 = mesh.vertex_position(collapse.v1);
                fallback_collapse(&q, &p0, &p1)
            }
        };

        collapse.position = position;
        collapse.cost = cost;
    }

    /// Refresh the stored quadric of a vertex after its incidence changed.
    ///
    /// The driver calls this as part of its post-collapse update, after the
    /// mesh itself has been mutated and before any further evaluation
    /// touches the vertex.
    pub fn on_vertex_updated<T: QuadricTopology>(&mut self, mesh: &T, v: usize) {
        self.quadrics[v] = vertex_quadric(mesh, v);
    }
}

/// Pick the cheapest of endpoint 1, endpoint 2, and the midpoint when the
/// position system is singular.
///
/// Ties are broken by strict comparison against the running minimum, so
/// endpoint 1 wins over endpoint 2, which wins over the midpoint. An
/// epsilon-aware comparison would be more robust but changes which position
/// is observed on exact ties; the exact comparison is kept deliberately.
fn fallback_collapse(q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> (Point3<f64>, f64) {
    let mid = Point3::from((p0.coords + p1.coords) * 0.5);

    let mut position = *p0;
    let mut cost = q.value(p0);

    let c1 = q.value(p1);
    if c1 < cost {
        position = *p1;
        cost = c1;
    }

    let cm = q.value(&mid);
    if cm < cost {
        position = mid;
        cost = cm;
    }

    (position, cost)
}

// ==================== Decimation driver ====================

/// A heap entry: an evaluated candidate plus the endpoint versions it was
/// priced at, for lazy invalidation.
struct Candidate {
    collapse: EdgeCollapse,
    stamp: (u64, u64),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.collapse.cost == other.collapse.cost
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the cheapest collapse.
        other
            .collapse
            .cost
            .partial_cmp(&self.collapse.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Mutable face-vertex working set used while collapsing edges.
///
/// Keeps per-vertex incidence lists in lock-step with the face table so the
/// quadric model always sees current topology through [`QuadricTopology`].
struct DecimationSurface {
    positions: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
    valid_vertex: Vec<bool>,
    valid_face: Vec<bool>,
    /// Vertex -> live faces touching it. Invariant: only valid faces appear.
    incident: Vec<Vec<usize>>,
    live_faces: usize,
}

impl DecimationSurface {
    fn new(positions: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        let mut incident = vec![Vec::new(); positions.len()];
        for (fi, face) in faces.iter().enumerate() {
            for &v in face {
                incident[v].push(fi);
            }
        }
        let live_faces = faces.len();
        Self {
            valid_vertex: vec![true; positions.len()],
            valid_face: vec![true; faces.len()],
            positions,
            faces,
            incident,
            live_faces,
        }
    }

    fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of live faces containing both endpoints.
    fn edge_face_count(&self, v0: usize, v1: usize) -> usize {
        self.incident[v0]
            .iter()
            .filter(|&&fi| self.faces[fi].contains(&v1))
            .count()
    }

    /// Live vertices sharing a face with `v`.
    fn vertex_neighbors(&self, v: usize) -> Vec<usize> {
        let mut neighbors = Vec::new();
        for &fi in &self.incident[v] {
            for &w in &self.faces[fi] {
                if w != v && !neighbors.contains(&w) {
                    neighbors.push(w);
                }
            }
        }
        neighbors
    }

    /// Link-condition check: collapsing `(v0, v1)` must not create
    /// non-manifold geometry. The number of vertices adjacent to both
    /// endpoints must equal the number of faces on the edge (two for an
    /// interior edge, one on the boundary).
    fn is_collapse_legal(&self, v0: usize, v1: usize) -> bool {
        let shared_faces = self.edge_face_count(v0, v1);
        if shared_faces == 0 || shared_faces > 2 {
            return false;
        }

        let n0: HashSet<usize> = self.vertex_neighbors(v0).into_iter().collect();
        let common = self
            .vertex_neighbors(v1)
            .into_iter()
            .filter(|w| n0.contains(w))
            .count();

        common == shared_faces
    }

    /// Collapse `v1` into `v0`, placing the merged vertex at `position`.
    ///
    /// Faces spanning the edge become degenerate and are removed; surviving
    /// faces of `v1` are rewritten to reference `v0`. Incidence lists are
    /// kept current throughout.
    fn collapse(&mut self, v0: usize, v1: usize, position: Point3<f64>) {
        self.positions[v0] = position;

        let absorbed = std::mem::take(&mut self.incident[v1]);
        for fi in absorbed {
            if !self.valid_face[fi] {
                continue;
            }

            for v in self.faces[fi].iter_mut() {
                if *v == v1 {
                    *v = v0;
                }
            }

            let face = self.faces[fi];
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                self.valid_face[fi] = false;
                self.live_faces -= 1;
                for &w in &face {
                    self.incident[w].retain(|&g| g != fi);
                }
            } else if !self.incident[v0].contains(&fi) {
                self.incident[v0].push(fi);
            }
        }

        self.valid_vertex[v1] = false;
    }

    /// Compact to a face-vertex pair, dropping removed elements and
    /// renumbering vertices. Returns empty lists if the result would be
    /// non-manifold (an edge with more than two faces), signalling the
    /// caller to keep the original mesh.
    fn into_face_vertex(self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for (fi, face) in self.faces.iter().enumerate() {
            if !self.valid_face[fi] {
                continue;
            }
            let mut out = [0usize; 3];
            for (k, &v) in face.iter().enumerate() {
                if remap[v] == usize::MAX {
                    remap[v] = vertices.len();
                    vertices.push(self.positions[v]);
                }
                out[k] = remap[v];
            }
            faces.push(out);
        }

        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &faces {
            for k in 0..3 {
                *edge_count
                    .entry(ordered(face[k], face[(k + 1) % 3]))
                    .or_insert(0) += 1;
            }
        }
        if edge_count.values().any(|&c| c > 2) {
            return (Vec::new(), Vec::new());
        }

        (vertices, faces)
    }
}

impl QuadricTopology for DecimationSurface {
    fn vertex_position(&self, v: usize) -> Point3<f64> {
        self.positions[v]
    }

    fn face_unit_normal(&self, f: usize) -> Vector3<f64> {
        let [a, b, c] = self.faces[f];
        let p0 = self.positions[a];
        let n = (self.positions[b] - p0).cross(&(self.positions[c] - p0));
        let len = n.norm();
        if len * len < DEGENERATE_NORMAL_EPS {
            Vector3::zeros()
        } else {
            n / len
        }
    }

    fn point_on_face(&self, f: usize) -> Point3<f64> {
        self.positions[self.faces[f][0]]
    }

    fn faces_incident_to(&self, v: usize) -> Vec<usize> {
        self.incident[v].clone()
    }
}

fn ordered(v0: usize, v1: usize) -> (usize, usize) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// Evaluate an edge and push it onto the heap if it is admissible.
fn push_candidate(
    surface: &DecimationSurface,
    model: &VertexQuadricModel,
    versions: &[u64],
    v0: usize,
    v1: usize,
    options: &DecimateOptions,
    heap: &mut BinaryHeap<Candidate>,
) {
    if options.preserve_boundary && surface.edge_face_count(v0, v1) < 2 {
        return;
    }

    let mut collapse = EdgeCollapse::new(v0, v1);
    model.compute_collapse(surface, &mut collapse);
    if collapse.check().is_err() {
        return;
    }

    heap.push(Candidate {
        stamp: (versions[v0], versions[v1]),
        collapse,
    });
}

/// Simplify a mesh with quadric error metric edge collapses.
///
/// Collapses are executed cheapest-first until the face target from
/// `options` is reached, no admissible candidate remains, or the next
/// candidate exceeds the configured error bound. The mesh is replaced by the
/// simplified result; if simplification would empty the mesh or produce
/// non-manifold geometry, the original is kept.
pub fn qem_decimate(mesh: &mut HalfEdgeMesh, options: &DecimateOptions) {
    qem_decimate_with_progress(mesh, options, None);
}

/// [`qem_decimate`] with a progress callback reporting collapsed faces.
pub fn qem_decimate_with_progress(
    mesh: &mut HalfEdgeMesh,
    options: &DecimateOptions,
    progress: Option<&Progress>,
) {
    let (vertices, faces) = to_face_vertex(mesh);
    if vertices.is_empty() || faces.is_empty() {
        return;
    }

    let target = options.target.face_count(faces.len());
    if target >= faces.len() {
        return;
    }

    let mut surface = DecimationSurface::new(vertices, faces);
    let mut model = VertexQuadricModel::new(&surface, surface.num_vertices());
    let mut versions: Vec<u64> = vec![0; surface.num_vertices()];
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();

    // Seed every unique edge.
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for face in surface.faces.iter().copied() {
        for k in 0..3 {
            let (v0, v1) = (face[k], face[(k + 1) % 3]);
            if seen.insert(ordered(v0, v1)) {
                push_candidate(&surface, &model, &versions, v0, v1, options, &mut heap);
            }
        }
    }

    let initial = surface.live_faces;
    let to_remove = initial - target;

    while surface.live_faces > target {
        let Some(candidate) = heap.pop() else {
            break;
        };
        let (v0, v1) = (candidate.collapse.v0, candidate.collapse.v1);

        if !surface.valid_vertex[v0] || !surface.valid_vertex[v1] {
            continue;
        }
        if candidate.stamp != (versions[v0], versions[v1]) {
            continue;
        }
        if let Some(max) = options.max_error {
            // The heap is cost-ordered, so nothing cheaper is coming.
            if candidate.collapse.cost > max {
                break;
            }
        }
        if options.preserve_boundary && surface.edge_face_count(v0, v1) < 2 {
            continue;
        }
        if !surface.is_collapse_legal(v0, v1) {
            continue;
        }

        // Re-price against current topology before committing.
        let mut collapse = EdgeCollapse::new(v0, v1);
        model.compute_collapse(&surface, &mut collapse);
        if collapse.check().is_err() {
            continue;
        }
        if let Some(max) = options.max_error {
            if collapse.cost > max {
                continue;
            }
        }

        surface.collapse(v0, v1, collapse.position);
        versions[v0] += 1;
        model.on_vertex_updated(&surface, v0);

        for n in surface.vertex_neighbors(v0) {
            push_candidate(&surface, &model, &versions, v0, n, options, &mut heap);
        }

        if let Some(p) = progress {
            p.report(initial - surface.live_faces, to_remove, "collapsing edges");
        }
    }

    let (new_vertices, new_faces) = surface.into_face_vertex();
    if new_faces.is_empty() {
        return;
    }
    if let Ok(rebuilt) = build_from_triangles(&new_vertices, &new_faces) {
        *mesh = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::decimate::DecimateTarget;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector4};

    /// Two coplanar triangles (unit square in z = 0) sharing the diagonal
    /// edge (0, 2).
    fn flat_square() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    /// Three mutually orthogonal faces meeting at vertex 0 (a cube corner):
    /// a tetrahedron with the face opposite the corner removed.
    fn cube_corner(offset: Vector3<f64>) -> HalfEdgeMesh {
        let vertices = vec![
            Point3::from(Vector3::new(0.0, 0.0, 0.0) + offset),
            Point3::from(Vector3::new(1.0, 0.0, 0.0) + offset),
            Point3::from(Vector3::new(0.0, 1.0, 0.0) + offset),
            Point3::from(Vector3::new(0.0, 0.0, 1.0) + offset),
        ];
        build_from_triangles(&vertices, &[[0, 2, 1], [0, 1, 3], [2, 0, 3]]).unwrap()
    }

    fn octahedron() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn grid_mesh(n: usize) -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + (n + 1);
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_face_quadric_matches_plane() {
        let mesh = flat_square();
        let q = face_quadric(&mesh, 0);
        let expected = Quadric::from_plane(&Vector3::new(0.0, 0.0, 1.0), 0.0);
        assert_eq!(q.matrix(), expected.matrix());
    }

    #[test]
    fn test_planar_vertex_quadric_vanishes_on_plane() {
        let mesh = flat_square();
        let q = vertex_quadric(&mesh, 0);

        // Anywhere in the plane: zero error.
        assert_relative_eq!(q.value(&Point3::new(0.3, 0.7, 0.0)), 0.0);
        assert_relative_eq!(q.value(&Point3::new(-5.0, 2.0, 0.0)), 0.0);

        // Off the plane: positive, growing with squared distance.
        let c1 = q.value(&Point3::new(0.3, 0.7, 0.5));
        let c2 = q.value(&Point3::new(0.3, 0.7, 1.0));
        assert!(c1 > 0.0);
        assert_relative_eq!(c2, 4.0 * c1, epsilon = 1e-12);
    }

    #[test]
    fn test_vertex_quadric_idempotent() {
        let mesh = cube_corner(Vector3::zeros());
        let a = vertex_quadric(&mesh, 0);
        let b = vertex_quadric(&mesh, 0);
        assert_eq!(a.matrix(), b.matrix());
    }

    #[test]
    fn test_vertex_quadric_order_independent() {
        let mesh = cube_corner(Vector3::zeros());
        let faces = mesh.faces_incident_to(0);

        let forward: Quadric = faces.iter().map(|&f| face_quadric(&mesh, f)).sum();
        let reverse: Quadric = faces.iter().rev().map(|&f| face_quadric(&mesh, f)).sum();

        assert_relative_eq!(*forward.matrix(), *reverse.matrix(), epsilon = 1e-14);
    }

    #[test]
    fn test_model_initial_error_near_zero() {
        // Each vertex lies on all of its incident face planes, so its own
        // quadric evaluates to ~0 at its position.
        let mesh = octahedron();
        let model = VertexQuadricModel::new(&mesh, mesh.num_vertices());
        assert_eq!(model.len(), 6);
        for v in 0..model.len() {
            let err = model.quadric(v).value(&mesh.vertex_position(v));
            assert_relative_eq!(err, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corner_collapse_solves_exactly() {
        let mesh = cube_corner(Vector3::zeros());
        let mut collapse = EdgeCollapse::new(0, 1);
        let model = VertexQuadricModel::new(&mesh, mesh.num_vertices());
        model.compute_collapse(&mesh, &mut collapse);

        // The corner is the unique zero of all three planes; the direct
        // solve must reproduce it exactly.
        assert_eq!(collapse.position, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(collapse.cost, 0.0);
        collapse.check().unwrap();
    }

    #[test]
    fn test_corner_collapse_solves_off_origin() {
        let offset = Vector3::new(1.0, 2.0, 3.0);
        let mesh = cube_corner(offset);
        let mut collapse = EdgeCollapse::new(0, 2);
        let model = VertexQuadricModel::new(&mesh, mesh.num_vertices());
        model.compute_collapse(&mesh, &mut collapse);

        assert_relative_eq!(collapse.position, Point3::from(offset), epsilon = 1e-9);
        assert_relative_eq!(collapse.cost, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cost_equals_quadric_at_position_direct_path() {
        let mesh = cube_corner(Vector3::new(0.5, -0.25, 2.0));
        let model = VertexQuadricModel::new(&mesh, mesh.num_vertices());
        let mut collapse = EdgeCollapse::new(0, 1);
        model.compute_collapse(&mesh, &mut collapse);

        let q = vertex_quadric(&mesh, 0) + vertex_quadric(&mesh, 1);
        assert_eq!(collapse.cost, q.value(&collapse.position));
    }

    #[test]
    fn test_flat_square_collapse_uses_fallback() {
        let mesh = flat_square();
        let model = VertexQuadricModel::new(&mesh, mesh.num_vertices());

        // Diagonal edge (0, 2); the combined planar quadric is singular.
        let mut collapse = EdgeCollapse::new(0, 2);
        model.compute_collapse(&mesh, &mut collapse);

        assert_eq!(collapse.position.z, 0.0);
        assert_relative_eq!(collapse.cost, 0.0);

        let q = vertex_quadric(&mesh, 0) + vertex_quadric(&mesh, 2);
        assert_eq!(collapse.cost, q.value(&collapse.position));

        // All three fallback candidates tie at zero; endpoint 1 wins.
        assert_eq!(collapse.position, *mesh.position(VertexId::new(0)));
    }

    #[test]
    fn test_fallback_tie_break_prefers_endpoint_one() {
        // An indefinite matrix makes the midpoint strictly worse while the
        // endpoints tie exactly: value = -x^2.
        let q = Quadric::from_matrix(Matrix4::from_diagonal(&Vector4::new(
            -1.0, 0.0, 0.0, 0.0,
        )));
        let p0 = Point3::new(1.0, 0.0, 0.0);
        let p1 = Point3::new(-1.0, 0.0, 0.0);

        let (position, cost) = fallback_collapse(&q, &p0, &p1);
        assert_eq!(position, p0);
        assert_eq!(cost, -1.0);
    }

    #[test]
    fn test_fallback_picks_midpoint_when_cheapest() {
        // Two parallel planes z = 1 and z = -1; the midpoint of two points
        // straddling them minimizes the summed squared distance.
        let mut q = Quadric::from_plane(&Vector3::new(0.0, 0.0, 1.0), -1.0);
        q += Quadric::from_plane(&Vector3::new(0.0, 0.0, 1.0), 1.0);

        let p0 = Point3::new(0.0, 0.0, 1.0);
        let p1 = Point3::new(0.0, 0.0, -1.0);
        let (position, cost) = fallback_collapse(&q, &p0, &p1);

        assert_eq!(position, Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(cost, 2.0);
    }

    #[test]
    fn test_breakdown_detected() {
        let mut collapse = EdgeCollapse::new(0, 1);
        collapse.cost = f64::NAN;
        assert!(matches!(
            collapse.check(),
            Err(MeshError::NumericalBreakdown { .. })
        ));

        collapse.cost = -1e-3;
        assert!(collapse.check().is_err());

        collapse.cost = 0.0;
        assert!(collapse.check().is_ok());
    }

    #[test]
    fn test_refresh_tracks_topology() {
        let flat = flat_square();
        let corner = cube_corner(Vector3::zeros());

        let mut model = VertexQuadricModel::new(&flat, flat.num_vertices());
        let before = *model.quadric(0);

        // Same vertex index, different incident geometry.
        model.on_vertex_updated(&corner, 0);
        let after = *model.quadric(0);

        assert_ne!(before.matrix(), after.matrix());
        assert_eq!(after.matrix(), vertex_quadric(&corner, 0).matrix());
    }

    #[test]
    fn test_from_halfedge_resolves_endpoints() {
        let mesh = flat_square();
        let he = HalfEdgeId::new(0);
        let collapse = EdgeCollapse::from_halfedge(&mesh, he);
        assert_eq!(collapse.v0, mesh.origin(he).index());
        assert_eq!(collapse.v1, mesh.dest(he).index());
    }

    #[test]
    fn test_decimate_reduces_octahedron() {
        let mut mesh = octahedron();
        let original = mesh.num_faces();

        qem_decimate(&mut mesh, &DecimateOptions::with_target_ratio(0.5));

        assert!(mesh.num_faces() < original);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_decimate_no_change_at_full_ratio() {
        let mut mesh = octahedron();
        qem_decimate(&mut mesh, &DecimateOptions::with_target_ratio(1.0));
        assert_eq!(mesh.num_faces(), 8);
        assert_eq!(mesh.num_vertices(), 6);
    }

    #[test]
    fn test_decimate_grid() {
        let mut mesh = grid_mesh(3);
        let original = mesh.num_faces();

        qem_decimate(&mut mesh, &DecimateOptions::with_target_ratio(0.7));

        assert!(mesh.num_faces() < original);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_decimate_respects_max_error() {
        let mut mesh = octahedron();
        let options = DecimateOptions {
            target: DecimateTarget::Ratio(0.1),
            max_error: Some(1e-12),
            preserve_boundary: true,
        };
        qem_decimate(&mut mesh, &options);

        // Every octahedron collapse has real cost; nothing may collapse.
        assert_eq!(mesh.num_faces(), 8);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_decimate_keeps_mesh_nonempty() {
        // With boundary preservation only the diagonal is admissible, and
        // collapsing it deletes both faces; the driver must then keep the
        // original mesh rather than emptying it.
        let mut mesh = flat_square();
        let options = DecimateOptions::with_target_ratio(0.4);
        qem_decimate(&mut mesh, &options);

        assert_eq!(mesh.num_faces(), 2);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_decimate_reports_progress() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |_, _, _| {
            counter.fetch_add(1, AtomicOrdering::Relaxed);
        });

        let mut mesh = octahedron();
        qem_decimate_with_progress(
            &mut mesh,
            &DecimateOptions::with_target_ratio(0.5),
            Some(&progress),
        );

        assert!(calls.load(AtomicOrdering::Relaxed) > 0);
    }
}
