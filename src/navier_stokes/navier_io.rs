//! Implement io routines for `NavierStokes3D`
use super::functions::Forces;
use super::navier::NavierStokes3D;
use crate::error::Result;
use crate::io::vtu::{VTK_QUADRATIC_TETRA, VTK_TETRA};
use crate::io::{write_pvtu, DataArray, UnstructuredGrid};
use crate::mpi::Comm;
use log::{error, info};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

impl<C: Comm> NavierStokes3D<C> {
    /// Visualization piece of the locally owned cells. Pressure is
    /// evaluated at the velocity nodes.
    pub fn output_piece(&self) -> UnstructuredGrid {
        let fe_u = self.dofs.fe_velocity();
        let fe_p = self.dofs.fe_pressure();
        let pressure_at_nodes: Vec<Vec<f64>> =
            fe_u.support_points().iter().map(|x| fe_p.values(x)).collect();

        // global velocity node -> local point
        let mut local = HashMap::new();
        let mut grid = UnstructuredGrid {
            cell_type: if fe_u.degree() == 2 {
                VTK_QUADRATIC_TETRA
            } else {
                VTK_TETRA
            },
            ..UnstructuredGrid::default()
        };
        let (mut velocity, mut pressure, mut subdomain) = (Vec::new(), Vec::new(), Vec::new());
        for c in self.dofs.locally_owned_cells() {
            let p_nodes = self.dofs.cell_pressure_nodes(c);
            let mut cell = Vec::with_capacity(fe_u.n_dofs());
            for (a, &node) in self.dofs.cell_velocity_nodes(c).iter().enumerate() {
                let next = grid.points.len();
                let index = *local.entry(node).or_insert(next);
                if index == next {
                    grid.points.push(*self.dofs.velocity_support_point(node));
                    for comp in 0..3 {
                        velocity.push(self.solution[self.dofs.velocity_dof(comp, node)]);
                    }
                    let p: f64 = pressure_at_nodes[a]
                        .iter()
                        .zip(p_nodes)
                        .map(|(psi, &m)| psi * self.solution[self.dofs.pressure_dof(m)])
                        .sum();
                    pressure.push(p);
                }
                cell.push(index);
            }
            grid.cells.push(cell);
            subdomain.push(self.comm.rank() as f64);
        }
        grid.point_data = vec![
            DataArray::new("velocity", 3, velocity),
            DataArray::new("pressure", 1, pressure),
        ];
        grid.cell_data = vec![DataArray::new("subdomain", 1, subdomain)];
        grid
    }

    /// Write `solution_<step>.<rank>.vtu` on every rank and the
    /// `solution_<step>.pvtu` record on rank 0 into `output_dir`.
    /// Does nothing without `output_dir`.
    ///
    /// # Errors
    /// Folder could not be created or a file not be written
    pub fn write_output(&self) -> Result<()> {
        let dir = match &self.output_dir {
            Some(dir) => dir,
            None => return Ok(()),
        };
        std::fs::create_dir_all(dir)?;
        let stem = format!("solution_{:05}", self.time_step);
        let piece = |rank: usize| format!("{}.{}.vtu", stem, rank);
        self.output_piece()
            .write_file(dir.join(piece(self.comm.rank())))?;
        if self.comm.is_root() {
            let pieces: Vec<String> = (0..self.comm.size()).map(piece).collect();
            let mut out = BufWriter::new(File::create(dir.join(format!("{}.pvtu", stem)))?);
            write_pvtu(
                &mut out,
                &pieces,
                &[("velocity", 3), ("pressure", 1)],
                &[("subdomain", 1)],
            )?;
            out.flush()?;
            info!(" ==> {:?}", dir.join(format!("{}.pvtu", stem)));
        }
        Ok(())
    }

    /// Write output, and handle error
    pub fn write_output_unwrap(&self) {
        if let Err(e) = self.write_output() {
            error!("Error while writing output at step {}. Error: {}", self.time_step, e);
        }
    }

    /// Append time, forces and coefficients to `output_dir/forces.csv`
    /// (rank 0 only)
    ///
    /// # Errors
    /// File could not be opened or written
    pub fn write_forces(&self, forces: &Forces) -> Result<()> {
        if let Some(dir) = self.root_output_dir() {
            let mut file = open_append(&dir.join("forces.csv"), "time,drag,lift,c_d,c_l")?;
            writeln!(
                file,
                "{:.8e},{:.8e},{:.8e},{:.8e},{:.8e}",
                self.time, forces.drag, forces.lift, forces.c_d, forces.c_l
            )?;
        }
        Ok(())
    }

    /// Write forces, and handle error
    pub fn write_forces_unwrap(&self, forces: &Forces) {
        if let Err(e) = self.write_forces(forces) {
            error!("Couldn't write to file: {}", e);
        }
    }

    /// Append time and pressure difference to `output_dir/info.txt`
    /// (rank 0 only)
    ///
    /// # Errors
    /// File could not be opened or written
    pub fn write_pressure_difference(&self, dp: f64) -> Result<()> {
        if let Some(dir) = self.root_output_dir() {
            let mut file = open_append(&dir.join("info.txt"), "time pressure_difference")?;
            writeln!(file, "{:.8e} {:.8e}", self.time, dp)?;
        }
        Ok(())
    }

    /// Write pressure difference, and handle error
    pub fn write_pressure_difference_unwrap(&self, dp: f64) {
        if let Err(e) = self.write_pressure_difference(dp) {
            error!("Couldn't write to file: {}", e);
        }
    }

    fn root_output_dir(&self) -> Option<&Path> {
        if self.comm.is_root() {
            self.output_dir.as_deref()
        } else {
            None
        }
    }

    /// Write snapshot to file
    ///
    /// # Errors
    /// Failed to write
    #[cfg(feature = "hdf5")]
    pub fn write_snapshot<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        use crate::io::read_write_hdf5::{write_scalar_to_hdf5, write_to_hdf5};
        let filename = filename.as_ref();
        if !self.comm.is_root() {
            return Ok(());
        }
        write_to_hdf5(filename, "solution", &self.solution)?;
        write_to_hdf5(filename, "previous_solution", &self.previous_solution)?;
        write_scalar_to_hdf5(filename, "time", self.time)?;
        write_scalar_to_hdf5(filename, "time_step", self.time_step as u64)?;
        write_scalar_to_hdf5(filename, "nu", self.params.nu)?;
        info!(" ==> {:?}", filename);
        Ok(())
    }

    /// Read snapshot from file, on every rank
    ///
    /// # Errors
    /// Failed to read, or the snapshot belongs to a different discretization
    #[cfg(feature = "hdf5")]
    pub fn read_snapshot<P: AsRef<Path>>(&mut self, filename: P) -> Result<()> {
        use crate::error::NavierError;
        use crate::io::read_write_hdf5::{read_from_hdf5, read_scalar_from_hdf5};
        let filename = filename.as_ref();
        let solution = read_from_hdf5::<f64, _>(filename, "solution")?;
        let previous = read_from_hdf5::<f64, _>(filename, "previous_solution")?;
        if solution.len() != self.dofs.n_dofs() || previous.len() != self.dofs.n_dofs() {
            return Err(NavierError::InvalidParameter(format!(
                "snapshot has {} dofs, expected {}",
                solution.len(),
                self.dofs.n_dofs()
            )));
        }
        self.set_solution(solution);
        self.previous_solution = previous;
        self.time = read_scalar_from_hdf5(filename, "time")?;
        self.time_step = read_scalar_from_hdf5::<u64, _>(filename, "time_step")? as usize;
        self.operators_assembled = false;
        info!(" <== {:?}", filename);
        Ok(())
    }
}

/// Open `path` for appending, writing `header` if the file is new
fn open_append(path: &Path, header: &str) -> Result<File> {
    let exists = path.exists();
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    if !exists {
        writeln!(file, "{}", header)?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generator::channel;
    use crate::mpi::{DetachedComm, SerialComm};
    use crate::navier_stokes::navier::tests::small_params;
    use nalgebra::{Point3, Vector3};

    fn output_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("rustfem_output_test").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_output_piece() {
        let mesh = channel([2, 1, 1], [2., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        let v = navier.interpolate(
            &|p: &Point3<f64>, _: f64| Vector3::new(p.x, 0., 0.),
            |p| p.x + p.y,
            0.,
        );
        navier.set_solution(v);
        let grid = navier.output_piece();
        assert_eq!(grid.cell_type, VTK_QUADRATIC_TETRA);
        assert_eq!(grid.cells.len(), navier.mesh().n_cells());
        assert_eq!(grid.points.len(), navier.dof_handler().n_velocity_nodes());
        // linear pressure is exact at the edge midpoints too
        let pressure = &grid.point_data[1].values;
        for (x, p) in grid.points.iter().zip(pressure) {
            assert!((p - (x.x + x.y)).abs() < 1e-12);
        }
        let velocity = &grid.point_data[0].values;
        for (x, u) in grid.points.iter().zip(velocity.chunks(3)) {
            assert!((u[0] - x.x).abs() < 1e-14);
        }
    }

    #[test]
    fn test_pieces_cover_mesh() {
        let n_parts = 3;
        let mut n_cells = 0;
        for rank in 0..n_parts {
            let mesh = channel([3, 1, 1], [3., 1., 1.]).unwrap();
            let navier =
                NavierStokes3D::new(mesh, small_params(), DetachedComm::new(rank, n_parts)).unwrap();
            let grid = navier.output_piece();
            assert!(grid.cell_data[0].values.iter().all(|&r| r == rank as f64));
            n_cells += grid.cells.len();
        }
        assert_eq!(n_cells, 18);
    }

    #[test]
    fn test_write_output_and_forces() {
        let dir = output_dir("write");
        let mesh = channel([1, 1, 1], [1., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        navier.output_dir = Some(dir.clone());
        navier.write_output().unwrap();
        assert!(dir.join("solution_00000.pvtu").exists());
        assert!(dir.join("solution_00000.0.vtu").exists());

        let forces = Forces {
            drag: 1.,
            lift: 2.,
            c_d: 3.,
            c_l: 4.,
        };
        navier.write_forces(&forces).unwrap();
        navier.time = 0.5;
        navier.write_forces(&forces).unwrap();
        let text = std::fs::read_to_string(dir.join("forces.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time,drag,lift,c_d,c_l");
        assert!(lines[2].starts_with("5.00000000e-1,"));

        navier.write_pressure_difference(0.125).unwrap();
        let info = std::fs::read_to_string(dir.join("info.txt")).unwrap();
        assert_eq!(info.lines().count(), 2);
    }

    #[test]
    fn test_only_root_writes_forces() {
        let dir = output_dir("non_root");
        let mesh = channel([1, 1, 1], [1., 1., 1.]).unwrap();
        let mut navier = NavierStokes3D::new(mesh, small_params(), DetachedComm::new(1, 2)).unwrap();
        navier.output_dir = Some(dir.clone());
        navier.write_forces(&Forces::default()).unwrap();
        assert!(!dir.join("forces.csv").exists());
    }

    #[test]
    fn test_no_output_without_folder() {
        let mesh = channel([1, 1, 1], [1., 1., 1.]).unwrap();
        let navier = NavierStokes3D::new(mesh, small_params(), SerialComm).unwrap();
        assert!(navier.write_output().is_ok());
        assert!(navier.write_forces(&Forces::default()).is_ok());
    }
}
