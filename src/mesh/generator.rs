//! Structured tetrahedral meshes of boxes
//!
//! Each hexahedron is split into six tetrahedra along its main diagonal
//! (Kuhn subdivision), which gives a conforming mesh when all hexahedra
//! share the same orientation.
use super::{BoundaryFace, BoundaryId, Mesh, LOCAL_FACES};
use crate::error::{NavierError, Result};
use nalgebra::Point3;
use std::collections::HashMap;

/// Axis permutations, each one path through the unit cube from corner 0 to 7
const KUHN_PATHS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Box `[lo, hi]` subdivided into `n[0] x n[1] x n[2]` hexahedra, six
/// tetrahedra each.
///
/// `boundary_id` is called with the centroid of every boundary triangle and
/// returns its tag, or `None` to leave it untagged.
///
/// # Errors
/// Zero subdivisions or empty box.
pub fn subdivided_box<F>(n: [usize; 3], lo: Point3<f64>, hi: Point3<f64>, boundary_id: F) -> Result<Mesh>
where
    F: Fn(&Point3<f64>) -> Option<BoundaryId>,
{
    if n.iter().any(|&k| k == 0) || (0..3).any(|d| hi[d] <= lo[d]) {
        return Err(NavierError::InvalidParameter(
            "box needs positive extent and subdivisions".to_owned(),
        ));
    }
    let index = |i: usize, j: usize, k: usize| i + (n[0] + 1) * (j + (n[1] + 1) * k);

    let mut vertices = Vec::with_capacity((n[0] + 1) * (n[1] + 1) * (n[2] + 1));
    for k in 0..=n[2] {
        for j in 0..=n[1] {
            for i in 0..=n[0] {
                let t = [
                    i as f64 / n[0] as f64,
                    j as f64 / n[1] as f64,
                    k as f64 / n[2] as f64,
                ];
                vertices.push(Point3::new(
                    lo[0] + t[0] * (hi[0] - lo[0]),
                    lo[1] + t[1] * (hi[1] - lo[1]),
                    lo[2] + t[2] * (hi[2] - lo[2]),
                ));
            }
        }
    }

    let mut cells = Vec::with_capacity(6 * n[0] * n[1] * n[2]);
    for k in 0..n[2] {
        for j in 0..n[1] {
            for i in 0..n[0] {
                // corner b has offsets (b & 1, b >> 1 & 1, b >> 2 & 1)
                let corner = |b: usize| index(i + (b & 1), j + ((b >> 1) & 1), k + ((b >> 2) & 1));
                for path in &KUHN_PATHS {
                    let b1 = 1 << path[0];
                    let b2 = b1 | (1 << path[1]);
                    cells.push([corner(0), corner(b1), corner(b2), corner(7)]);
                }
            }
        }
    }

    // Faces seen by exactly one cell are on the boundary
    let mut face_count: HashMap<[usize; 3], usize> = HashMap::new();
    for cell in &cells {
        for local in &LOCAL_FACES {
            let mut key = [cell[local[0]], cell[local[1]], cell[local[2]]];
            key.sort_unstable();
            *face_count.entry(key).or_insert(0) += 1;
        }
    }
    let mut boundary_faces: Vec<BoundaryFace> = face_count
        .into_iter()
        .filter(|&(_, count)| count == 1)
        .filter_map(|(key, _)| {
            let centroid = Point3::from(
                (vertices[key[0]].coords + vertices[key[1]].coords + vertices[key[2]].coords) / 3.,
            );
            boundary_id(&centroid).map(|id| BoundaryFace { vertices: key, id })
        })
        .collect();
    boundary_faces.sort_unstable_by_key(|f| f.vertices);

    Mesh::new(vertices, cells, boundary_faces)
}

/// Channel `[0, length[0]] x [0, length[1]] x [0, length[2]]` with inlet
/// (id 0) at x = 0, outflow (id 1) at x = length\[0\] and walls (id 2)
/// everywhere else.
///
/// # Errors
/// Zero subdivisions or non-positive lengths.
pub fn channel(n: [usize; 3], length: [f64; 3]) -> Result<Mesh> {
    let tol = 1e-10 * length[0].abs().max(1.);
    let lx = length[0];
    subdivided_box(
        n,
        Point3::origin(),
        Point3::new(length[0], length[1], length[2]),
        move |p| {
            if p.x.abs() < tol {
                Some(0)
            } else if (p.x - lx).abs() < tol {
                Some(1)
            } else {
                Some(2)
            }
        },
    )
}
