//! Degrees of freedom of the mixed velocity/pressure space
//!
//! Numbering is component-wise, which makes the two blocks contiguous:
//! ```text
//! [ u_x nodes | u_y nodes | u_z nodes | p nodes ]
//! ```
//! A scalar node of a degree 1 space is a vertex, a degree 2 space adds one
//! node per edge (numbered after the vertices). Within a cell the local
//! layout is `c * nv + a` for velocity component `c` and node `a`, followed
//! by `3 * nv + m` for pressure node `m`.
use super::LagrangeTet;
use crate::error::{NavierError, Result};
use crate::mesh::Mesh;
use crate::solver::{pattern_from_cells, BlockPartition, SparsityPattern};
use nalgebra::Point3;
use std::ops::Range;

/// Sorted set of global indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSet {
    size: usize,
    indices: Vec<usize>,
}

impl IndexSet {
    /// Set out of `indices` (any order, duplicates allowed) in `0..size`
    pub fn new<I: IntoIterator<Item = usize>>(size: usize, indices: I) -> Self {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        debug_assert!(indices.last().map_or(true, |&i| i < size));
        Self { size, indices }
    }

    /// Size of the index space
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of indices in the set
    pub fn n_elements(&self) -> usize {
        self.indices.len()
    }

    /// Membership test
    pub fn contains(&self, i: usize) -> bool {
        self.indices.binary_search(&i).is_ok()
    }

    /// Iterate over indices, ascending
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Restriction to `range`, shifted to start at zero
    pub fn get_view(&self, range: Range<usize>) -> IndexSet {
        let start = range.start;
        IndexSet::new(
            range.len(),
            self.iter().filter(|i| range.contains(i)).map(|i| i - start),
        )
    }
}

/// Scalar nodes of a cell for an element of given degree
fn cell_nodes(mesh: &Mesh, c: usize, degree: usize) -> Vec<usize> {
    let mut nodes: Vec<usize> = mesh.cell(c).to_vec();
    if degree == 2 {
        nodes.extend(mesh.cell_edges(c).iter().map(|e| mesh.n_vertices() + e));
    }
    nodes
}

fn n_nodes(mesh: &Mesh, degree: usize) -> usize {
    if degree == 2 {
        mesh.n_vertices() + mesh.n_edges()
    } else {
        mesh.n_vertices()
    }
}

fn support_points(mesh: &Mesh, degree: usize) -> Vec<Point3<f64>> {
    let mut points = mesh.vertices().to_vec();
    if degree == 2 {
        points.extend((0..mesh.n_edges()).map(|e| mesh.edge_midpoint(e)));
    }
    points
}

/// Lowest rank among the cells touching each node
fn node_owners(cells: &[Vec<usize>], cell_owner: &[usize], n: usize) -> Vec<usize> {
    let mut owner = vec![usize::MAX; n];
    for (nodes, &rank) in cells.iter().zip(cell_owner) {
        for &k in nodes {
            owner[k] = owner[k].min(rank);
        }
    }
    owner
}

/// Numbering and ownership of the degrees of freedom
#[derive(Debug, Clone)]
pub struct DofHandler {
    fe_u: LagrangeTet,
    fe_p: LagrangeTet,
    n_velocity_nodes: usize,
    n_pressure_nodes: usize,
    cell_nodes_u: Vec<Vec<usize>>,
    cell_nodes_p: Vec<Vec<usize>>,
    support_u: Vec<Point3<f64>>,
    support_p: Vec<Point3<f64>>,
    partition: BlockPartition,
    cell_owner: Vec<usize>,
    rank: usize,
    owned: IndexSet,
    relevant: IndexSet,
}

impl DofHandler {
    /// Distribute dofs of the velocity element `fe_u` (three components)
    /// and the pressure element `fe_p`.
    ///
    /// `cell_owner` holds the rank of every cell, `rank` is this process.
    ///
    /// # Errors
    /// `cell_owner` does not have one entry per cell
    pub fn new(
        mesh: &Mesh,
        fe_u: LagrangeTet,
        fe_p: LagrangeTet,
        cell_owner: Vec<usize>,
        rank: usize,
    ) -> Result<Self> {
        if cell_owner.len() != mesh.n_cells() {
            return Err(NavierError::InvalidParameter(format!(
                "{} cell owners given for {} cells",
                cell_owner.len(),
                mesh.n_cells()
            )));
        }
        let n_velocity_nodes = n_nodes(mesh, fe_u.degree());
        let n_pressure_nodes = n_nodes(mesh, fe_p.degree());
        let cell_nodes_u: Vec<Vec<usize>> = (0..mesh.n_cells())
            .map(|c| cell_nodes(mesh, c, fe_u.degree()))
            .collect();
        let cell_nodes_p: Vec<Vec<usize>> = (0..mesh.n_cells())
            .map(|c| cell_nodes(mesh, c, fe_p.degree()))
            .collect();
        let partition = BlockPartition::new(3 * n_velocity_nodes, n_pressure_nodes);

        let owner_u = node_owners(&cell_nodes_u, &cell_owner, n_velocity_nodes);
        let owner_p = node_owners(&cell_nodes_p, &cell_owner, n_pressure_nodes);
        let mut owned = Vec::new();
        for comp in 0..3 {
            owned.extend(
                (0..n_velocity_nodes)
                    .filter(|&k| owner_u[k] == rank)
                    .map(|k| comp * n_velocity_nodes + k),
            );
        }
        owned.extend(
            (0..n_pressure_nodes)
                .filter(|&k| owner_p[k] == rank)
                .map(|k| partition.n_u + k),
        );

        let mut dofs = Self {
            fe_u,
            fe_p,
            n_velocity_nodes,
            n_pressure_nodes,
            cell_nodes_u,
            cell_nodes_p,
            support_u: support_points(mesh, fe_u.degree()),
            support_p: support_points(mesh, fe_p.degree()),
            partition,
            cell_owner,
            rank,
            owned: IndexSet::new(partition.size(), owned),
            relevant: IndexSet::new(0, Vec::new()),
        };
        let mut relevant: Vec<usize> = dofs.owned.iter().collect();
        for c in dofs.locally_owned_cells().collect::<Vec<_>>() {
            relevant.extend(dofs.cell_dofs(c));
        }
        dofs.relevant = IndexSet::new(partition.size(), relevant);
        Ok(dofs)
    }

    /// Velocity element
    pub fn fe_velocity(&self) -> &LagrangeTet {
        &self.fe_u
    }

    /// Pressure element
    pub fn fe_pressure(&self) -> &LagrangeTet {
        &self.fe_p
    }

    /// Block sizes
    pub fn partition(&self) -> BlockPartition {
        self.partition
    }

    /// Total number of dofs
    pub fn n_dofs(&self) -> usize {
        self.partition.size()
    }

    /// Number of scalar velocity nodes (dofs per component)
    pub fn n_velocity_nodes(&self) -> usize {
        self.n_velocity_nodes
    }

    /// Number of pressure nodes
    pub fn n_pressure_nodes(&self) -> usize {
        self.n_pressure_nodes
    }

    /// Dofs per cell
    pub fn dofs_per_cell(&self) -> usize {
        3 * self.fe_u.n_dofs() + self.fe_p.n_dofs()
    }

    /// Global dof of velocity component `comp` at node `node`
    pub fn velocity_dof(&self, comp: usize, node: usize) -> usize {
        comp * self.n_velocity_nodes + node
    }

    /// Global dof of pressure node `node`
    pub fn pressure_dof(&self, node: usize) -> usize {
        self.partition.n_u + node
    }

    /// Scalar velocity nodes of cell `c`
    pub fn cell_velocity_nodes(&self, c: usize) -> &[usize] {
        &self.cell_nodes_u[c]
    }

    /// Pressure nodes of cell `c`
    pub fn cell_pressure_nodes(&self, c: usize) -> &[usize] {
        &self.cell_nodes_p[c]
    }

    /// Global dofs of cell `c` in local order
    pub fn cell_dofs(&self, c: usize) -> Vec<usize> {
        let mut dofs = Vec::with_capacity(self.dofs_per_cell());
        for comp in 0..3 {
            dofs.extend(
                self.cell_nodes_u[c]
                    .iter()
                    .map(|&k| self.velocity_dof(comp, k)),
            );
        }
        dofs.extend(self.cell_nodes_p[c].iter().map(|&k| self.pressure_dof(k)));
        dofs
    }

    /// Rank owning cell `c`
    pub fn cell_owner(&self, c: usize) -> usize {
        self.cell_owner[c]
    }

    /// Rank of this process
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Owner rank of every cell
    pub fn cell_owners(&self) -> &[usize] {
        &self.cell_owner
    }

    /// Cells assembled by this process
    pub fn locally_owned_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cell_owner
            .iter()
            .enumerate()
            .filter(move |&(_, &o)| o == self.rank)
            .map(|(c, _)| c)
    }

    /// Dofs owned by this process
    pub fn locally_owned_dofs(&self) -> &IndexSet {
        &self.owned
    }

    /// Owned dofs plus all dofs of owned cells
    pub fn locally_relevant_dofs(&self) -> &IndexSet {
        &self.relevant
    }

    /// Coordinates of velocity node `node`
    pub fn velocity_support_point(&self, node: usize) -> &Point3<f64> {
        &self.support_u[node]
    }

    /// Coordinates of pressure node `node`
    pub fn pressure_support_point(&self, node: usize) -> &Point3<f64> {
        &self.support_p[node]
    }

    /// Sparsity pattern of all cell couplings, masked per block pair.
    ///
    /// `couple(bi, bj)` with block indices 0 (velocity) and 1 (pressure).
    ///
    /// # Errors
    /// Cell dofs exceed the number of dofs
    pub fn sparsity_pattern<F: Fn(usize, usize) -> bool>(&self, couple: F) -> Result<SparsityPattern> {
        let part = self.partition;
        let cells: Vec<Vec<usize>> = (0..self.cell_owner.len()).map(|c| self.cell_dofs(c)).collect();
        pattern_from_cells(self.n_dofs(), cells.iter().map(Vec::as_slice), |i, j| {
            couple(part.block_of(i), part.block_of(j))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generator::channel;
    use crate::mesh::partition::partition_cells;

    fn handler(degree_u: usize, n_parts: usize, rank: usize) -> (Mesh, DofHandler) {
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let owner = partition_cells(&mesh, n_parts);
        let dofs = DofHandler::new(
            &mesh,
            LagrangeTet::new(degree_u).unwrap(),
            LagrangeTet::new(1).unwrap(),
            owner,
            rank,
        )
        .unwrap();
        (mesh, dofs)
    }

    #[test]
    fn test_block_sizes() {
        let (mesh, dofs) = handler(2, 1, 0);
        let nodes = mesh.n_vertices() + mesh.n_edges();
        assert_eq!(dofs.partition().n_u, 3 * nodes);
        assert_eq!(dofs.partition().n_p, mesh.n_vertices());
        assert_eq!(dofs.cell_dofs(0).len(), 34);
        assert_eq!(dofs.locally_owned_dofs().n_elements(), dofs.n_dofs());
    }

    #[test]
    fn test_cell_dof_layout() {
        let (_, dofs) = handler(2, 1, 0);
        let cell = dofs.cell_dofs(3);
        let nodes = dofs.cell_velocity_nodes(3).to_vec();
        for a in 0..10 {
            for comp in 0..3 {
                assert_eq!(cell[comp * 10 + a], dofs.velocity_dof(comp, nodes[a]));
            }
        }
        assert!(cell[30..].iter().all(|&d| d >= dofs.partition().n_u));
    }

    #[test]
    fn test_owned_sets_partition_all_dofs() {
        let n_parts = 3;
        let mut count = vec![0; handler(2, 1, 0).1.n_dofs()];
        for rank in 0..n_parts {
            let (_, dofs) = handler(2, n_parts, rank);
            for i in dofs.locally_owned_dofs().iter() {
                count[i] += 1;
                assert!(dofs.locally_relevant_dofs().contains(i));
            }
            for c in dofs.locally_owned_cells() {
                for d in dofs.cell_dofs(c) {
                    assert!(dofs.locally_relevant_dofs().contains(d));
                }
            }
        }
        assert!(count.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_index_set_view() {
        let set = IndexSet::new(10, vec![7, 1, 3, 3, 9]);
        assert_eq!(set.n_elements(), 4);
        let view = set.get_view(3..8);
        assert_eq!(view.size(), 5);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![0, 4]);
    }

    #[test]
    fn test_sparsity_without_pressure_coupling() {
        let (_, dofs) = handler(1, 1, 0);
        let pattern = dofs.sparsity_pattern(|bi, bj| !(bi == 1 && bj == 1)).unwrap();
        let p0 = dofs.pressure_dof(0);
        assert!(pattern.lane(p0).iter().all(|&j| j < dofs.partition().n_u));
        assert!(pattern.lane(0).binary_search(&0).is_ok());
    }
}
