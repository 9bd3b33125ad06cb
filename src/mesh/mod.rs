//! # Tetrahedral meshes
//!
//! A [`Mesh`] holds vertices, positively oriented tetrahedra, tagged
//! boundary triangles and a global edge numbering (needed for quadratic
//! elements). Meshes are read from Gmsh files ([`gmsh`]) or generated for
//! simple boxes ([`generator`]). Cells are distributed over ranks by
//! [`partition`].
pub mod generator;
pub mod gmsh;
pub mod partition;

use crate::error::{NavierError, Result};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::HashMap;

/// Integer tag of a boundary part (0 inlet, 1 outflow, 2 walls, 3 obstacle)
pub type BoundaryId = u32;

/// Local vertex pairs of the six edges (VTK order for quadratic tetrahedra)
pub const LOCAL_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [0, 2], [0, 3], [1, 3], [2, 3]];

/// Local vertices of face `i`, which is the face opposite to vertex `i`
pub const LOCAL_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// Boundary triangle with its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryFace {
    /// Vertex indices
    pub vertices: [usize; 3],
    /// Boundary tag
    pub id: BoundaryId,
}

/// Unstructured tetrahedral mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point3<f64>>,
    cells: Vec<[usize; 4]>,
    boundary_faces: Vec<BoundaryFace>,
    cell_face_ids: Vec<[Option<BoundaryId>; 4]>,
    edges: Vec<[usize; 2]>,
    cell_edges: Vec<[usize; 6]>,
}

fn sorted3(mut v: [usize; 3]) -> [usize; 3] {
    v.sort_unstable();
    v
}

impl Mesh {
    /// Build mesh from raw vertex, cell and boundary face lists.
    ///
    /// Negatively oriented cells are flipped.
    ///
    /// # Errors
    /// Vertex index out of range or a degenerate (zero volume) cell.
    pub fn new(
        vertices: Vec<Point3<f64>>,
        mut cells: Vec<[usize; 4]>,
        boundary_faces: Vec<BoundaryFace>,
    ) -> Result<Self> {
        let nv = vertices.len();
        for (c, cell) in cells.iter_mut().enumerate() {
            if cell.iter().any(|&v| v >= nv) {
                return Err(NavierError::InvalidParameter(format!(
                    "cell {} references a vertex out of range",
                    c
                )));
            }
            let det = jacobian(&vertices, cell).determinant();
            if det.abs() < f64::EPSILON * 1e-3 {
                return Err(NavierError::InvalidParameter(format!(
                    "cell {} is degenerate",
                    c
                )));
            }
            if det < 0. {
                cell.swap(0, 1);
            }
        }
        for f in &boundary_faces {
            if f.vertices.iter().any(|&v| v >= nv) {
                return Err(NavierError::InvalidParameter(
                    "boundary face references a vertex out of range".to_owned(),
                ));
            }
        }

        // Boundary ids per cell face
        let face_lookup: HashMap<[usize; 3], BoundaryId> = boundary_faces
            .iter()
            .map(|f| (sorted3(f.vertices), f.id))
            .collect();
        let mut face_count: HashMap<[usize; 3], usize> = HashMap::new();
        let mut cell_face_ids = Vec::with_capacity(cells.len());
        for cell in &cells {
            let mut ids = [None; 4];
            for (f, local) in LOCAL_FACES.iter().enumerate() {
                let key = sorted3([cell[local[0]], cell[local[1]], cell[local[2]]]);
                ids[f] = face_lookup.get(&key).copied();
                *face_count.entry(key).or_insert(0) += 1;
            }
            cell_face_ids.push(ids);
        }
        let untagged = face_count
            .iter()
            .filter(|&(k, &n)| n == 1 && !face_lookup.contains_key(k))
            .count();
        if untagged > 0 {
            log::warn!("{} boundary faces carry no boundary id", untagged);
        }

        // Global edges
        let mut edge_lookup: HashMap<[usize; 2], usize> = HashMap::new();
        let mut edges = Vec::new();
        let mut cell_edges = Vec::with_capacity(cells.len());
        for cell in &cells {
            let mut ce = [0; 6];
            for (e, local) in LOCAL_EDGES.iter().enumerate() {
                let (a, b) = (cell[local[0]], cell[local[1]]);
                let key = if a < b { [a, b] } else { [b, a] };
                let next = edges.len();
                let idx = *edge_lookup.entry(key).or_insert(next);
                if idx == next {
                    edges.push(key);
                }
                ce[e] = idx;
            }
            cell_edges.push(ce);
        }

        Ok(Self {
            vertices,
            cells,
            boundary_faces,
            cell_face_ids,
            edges,
            cell_edges,
        })
    }

    /// Number of vertices
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of cells
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of edges
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// All vertices
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// All cells
    pub fn cells(&self) -> &[[usize; 4]] {
        &self.cells
    }

    /// Vertex indices of cell `c`
    pub fn cell(&self, c: usize) -> &[usize; 4] {
        &self.cells[c]
    }

    /// Global edges as vertex pairs
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Global edge indices of cell `c`, in [`LOCAL_EDGES`] order
    pub fn cell_edges(&self, c: usize) -> &[usize; 6] {
        &self.cell_edges[c]
    }

    /// Tagged boundary triangles
    pub fn boundary_faces(&self) -> &[BoundaryFace] {
        &self.boundary_faces
    }

    /// Boundary id of local face `f` of cell `c`, `None` for interior faces
    pub fn face_boundary_id(&self, c: usize, f: usize) -> Option<BoundaryId> {
        self.cell_face_ids[c][f]
    }

    /// True if any face of cell `c` is a tagged boundary face
    pub fn at_boundary(&self, c: usize) -> bool {
        self.cell_face_ids[c].iter().any(Option::is_some)
    }

    /// Corner coordinates of cell `c`
    pub fn cell_vertices(&self, c: usize) -> [Point3<f64>; 4] {
        let cell = &self.cells[c];
        [
            self.vertices[cell[0]],
            self.vertices[cell[1]],
            self.vertices[cell[2]],
            self.vertices[cell[3]],
        ]
    }

    /// Centroid of cell `c`
    pub fn centroid(&self, c: usize) -> Point3<f64> {
        let v = self.cell_vertices(c);
        Point3::from((v[0].coords + v[1].coords + v[2].coords + v[3].coords) / 4.)
    }

    /// Volume of cell `c`
    pub fn volume(&self, c: usize) -> f64 {
        jacobian(&self.vertices, &self.cells[c]).determinant() / 6.
    }

    /// Midpoint of global edge `e`
    pub fn edge_midpoint(&self, e: usize) -> Point3<f64> {
        let [a, b] = self.edges[e];
        nalgebra::center(&self.vertices[a], &self.vertices[b])
    }

    /// Axis aligned bounding box (min, max)
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut lo = Point3::from(Vector3::repeat(f64::INFINITY));
        let mut hi = Point3::from(Vector3::repeat(f64::NEG_INFINITY));
        for v in &self.vertices {
            for d in 0..3 {
                lo[d] = lo[d].min(v[d]);
                hi[d] = hi[d].max(v[d]);
            }
        }
        (lo, hi)
    }

    /// Boundary ids present in the mesh, sorted
    pub fn boundary_ids(&self) -> Vec<BoundaryId> {
        let mut ids: Vec<BoundaryId> = self.boundary_faces.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Jacobian of the affine map from the reference tetrahedron
pub(crate) fn jacobian(vertices: &[Point3<f64>], cell: &[usize; 4]) -> Matrix3<f64> {
    let p0 = vertices[cell[0]];
    Matrix3::from_columns(&[
        vertices[cell[1]] - p0,
        vertices[cell[2]] - p0,
        vertices[cell[3]] - p0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_tet() -> Mesh {
        let vertices = vec![
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(0., 1., 0.),
            Point3::new(0., 0., 1.),
        ];
        let faces = vec![BoundaryFace {
            vertices: [0, 1, 2],
            id: 4,
        }];
        // negatively oriented on purpose
        Mesh::new(vertices, vec![[1, 0, 2, 3]], faces).unwrap()
    }

    #[test]
    fn test_cells_are_positively_oriented() {
        let mesh = single_tet();
        assert_abs_diff_eq!(mesh.volume(0), 1. / 6., epsilon = 1e-14);
    }

    #[test]
    fn test_face_ids_and_edges() {
        let mesh = single_tet();
        assert_eq!(mesh.n_edges(), 6);
        // the face (0,1,2) is opposite to vertex 3
        let c = mesh.cell(0);
        let f = (0..4).find(|&i| c[i] == 3).unwrap();
        assert_eq!(mesh.face_boundary_id(0, f), Some(4));
        assert_eq!(
            (0..4).filter(|&i| mesh.face_boundary_id(0, i).is_some()).count(),
            1
        );
        assert!(mesh.at_boundary(0));
        assert_eq!(mesh.boundary_ids(), vec![4]);
    }

    #[test]
    fn test_degenerate_cell_is_rejected() {
        let vertices = vec![
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(2., 0., 0.),
            Point3::new(0., 0., 1.),
        ];
        assert!(Mesh::new(vertices, vec![[0, 1, 2, 3]], vec![]).is_err());
    }
}
