//! Run example:
//!
//! cargo mpirun --np 2 --features mpi --bin rustfem --release -- --mesh cylinder.msh
//!
//! Parameters not given in `--config` (json) take the values of the
//! 3D-2 benchmark.
use clap::Parser;
use log::{error, info, LevelFilter};
use rustfem::error::Result;
use rustfem::mesh::gmsh::read_msh;
use rustfem::mpi::Comm;
use rustfem::navier_stokes::{NavierStokes3D, Params};
use rustfem::solver::PreconditionerKind;
use std::convert::TryFrom;
use std::path::PathBuf;

/// Unsteady incompressible Navier-Stokes equations on tetrahedral meshes
#[derive(Parser, Debug)]
#[command(name = "rustfem")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Navier-Stokes solver with block preconditioned GMRES", long_about = None)]
struct Cli {
    /// Gmsh mesh file (msh 2.2 or 4.1, ascii)
    #[arg(short, long)]
    mesh: PathBuf,

    /// Parameter file (json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder for visualization and force history
    #[arg(short, long, default_value = "data")]
    output_dir: PathBuf,

    /// Preconditioner: 0 Yosida, 1 SIMPLE, 2 aYosida, 3 aSIMPLE
    #[arg(short, long)]
    preconditioner: Option<u32>,

    /// Time step size
    #[arg(long)]
    deltat: Option<f64>,

    /// Final time
    #[arg(long)]
    t_final: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
}

impl Cli {
    /// Parameters from file, with command line overrides
    fn params(&self) -> Result<Params> {
        let mut params = match &self.config {
            Some(path) => Params::from_file(path)?,
            None => Params::default(),
        };
        if let Some(kind) = self.preconditioner {
            params.preconditioner = PreconditionerKind::try_from(kind)?;
        }
        if let Some(deltat) = self.deltat {
            params.deltat = deltat;
        }
        if let Some(t_final) = self.t_final {
            params.t_final = t_final;
        }
        params.validate()?;
        Ok(params)
    }
}

/// Only the root rank reports progress
fn init_logger(level: LevelFilter, rank: usize) {
    let level = if rank == 0 {
        level
    } else {
        level.min(LevelFilter::Warn)
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn run<C: Comm>(cli: &Cli, comm: C) -> Result<()> {
    init_logger(cli.log_level, comm.rank());
    let params = cli.params()?;
    info!("Reading mesh {:?}", cli.mesh);
    let mesh = read_msh(&cli.mesh)?;
    info!(
        "Number of vertices: {}, number of cells: {}",
        mesh.n_vertices(),
        mesh.n_cells()
    );
    let mut navier = NavierStokes3D::new(mesh, params, comm)?;
    navier.output_dir = Some(cli.output_dir.clone());
    let steps = navier.run()?;
    info!("Finished after {} time steps", steps);
    Ok(())
}

#[cfg(feature = "mpi")]
fn main() {
    use rustfem::mpi::{initialize, MpiComm};
    let cli = Cli::parse();
    let universe = match initialize() {
        Some(universe) => universe,
        None => {
            eprintln!("mpi was initialized before");
            std::process::exit(1);
        }
    };
    if let Err(e) = run(&cli, MpiComm::new(&universe)) {
        error!("{}", e);
        MpiComm::new(&universe).abort(1);
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli, rustfem::mpi::SerialComm) {
        error!("{}", e);
        std::process::exit(1);
    }
}
