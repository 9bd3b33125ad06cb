//! [`Comm`] on top of `MPI_COMM_WORLD`
use super::Comm;
use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator, CommunicatorCollectives, Root};

pub use mpi::environment::Universe;

/// Initialize mpi. Returns `None` if mpi was initialized before.
pub fn initialize() -> Option<Universe> {
    mpi::initialize()
}

/// World communicator of an initialized [`Universe`]
pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    /// Wrap the world communicator of `universe`
    pub fn new(universe: &Universe) -> Self {
        Self {
            world: universe.world(),
        }
    }

    /// Terminate all ranks with `code`
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }
}

impl Comm for MpiComm {
    #[allow(clippy::cast_sign_loss)]
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    #[allow(clippy::cast_sign_loss)]
    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn sum_in_place(&self, values: &mut [f64]) {
        let send = values.to_vec();
        self.world
            .all_reduce_into(&send[..], values, SystemOperation::sum());
    }

    fn max_to_root(&self, value: f64) -> f64 {
        let root = self.world.process_at_rank(0);
        if self.world.rank() == 0 {
            let mut global = 0.;
            root.reduce_into_root(&value, &mut global, SystemOperation::max());
            global
        } else {
            root.reduce_into(&value, SystemOperation::max());
            value
        }
    }

    fn barrier(&self) {
        self.world.barrier();
    }
}
