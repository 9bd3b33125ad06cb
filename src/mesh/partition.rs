//! Distribute cells over ranks
use super::Mesh;

/// Owner rank of every cell.
///
/// Cells are sorted by the centroid coordinate along the longest axis of
/// the bounding box and cut into `n_parts` chunks of (almost) equal size,
/// which keeps the partition interfaces small for channel-like domains.
///
/// # Panics
/// If `n_parts` is zero
pub fn partition_cells(mesh: &Mesh, n_parts: usize) -> Vec<usize> {
    assert!(n_parts > 0, "need at least one partition");
    let (lo, hi) = mesh.bounding_box();
    let extent = hi - lo;
    let axis = extent.imax();

    let mut order: Vec<(f64, usize)> = (0..mesh.n_cells())
        .map(|c| (mesh.centroid(c)[axis], c))
        .collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let n = order.len();
    let mut owner = vec![0; n];
    for (position, (_, c)) in order.into_iter().enumerate() {
        owner[c] = position * n_parts / n.max(1);
    }
    owner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generator::channel;

    #[test]
    fn test_partition_is_balanced_and_sliced() {
        let mesh = channel([4, 1, 1], [4., 1., 1.]).unwrap();
        let owner = partition_cells(&mesh, 4);
        for rank in 0..4 {
            assert_eq!(owner.iter().filter(|&&o| o == rank).count(), 6);
        }
        // slices along x
        for (c, &o) in owner.iter().enumerate() {
            let x = mesh.centroid(c).x;
            assert!(x > o as f64 && x < (o + 1) as f64);
        }
    }

    #[test]
    fn test_single_partition() {
        let mesh = channel([2, 2, 2], [1., 1., 1.]).unwrap();
        assert!(partition_cells(&mesh, 1).iter().all(|&o| o == 0));
    }
}
