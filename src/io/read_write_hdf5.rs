//! `Hdf5` functions to write ndarrays
use crate::error::Result;
use hdf5::H5Type;
use ndarray::{Array1, ArrayBase};
use std::path::Path;

/// Read scalar from hdf5
///
/// # Errors
/// When file or variable does not exist, or the variable is empty.
pub fn read_scalar_from_hdf5<T, P>(filename: P, name: &str) -> Result<T>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let scalar: Array1<T> = read_from_hdf5(filename, name)?;
    scalar.get(0).copied().ok_or_else(|| {
        crate::error::NavierError::InvalidParameter(format!("dataset {} is empty", name))
    })
}

/// Interface to write scalar to hdf5 file
///
/// # Errors
/// When file can not be opened or created.
pub fn write_scalar_to_hdf5<T, P>(filename: P, name: &str, scalar: T) -> Result<()>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let x = Array1::<T>::from_elem(1, scalar);
    write_to_hdf5(filename, name, &x)
}

/// Read one dimensional ndarray from hdf5 file
///
/// # Errors
/// Errors when file/variable does not exist or the variable is not one
/// dimensional
pub fn read_from_hdf5<A, P>(filename: P, varname: &str) -> Result<Array1<A>>
where
    A: H5Type,
    P: AsRef<Path>,
{
    let file = hdf5::File::open(filename)?;
    let data = file.dataset(varname)?;
    Ok(data.read_1d::<A>()?)
}

/// Write ndarray to hdf5 file
///
/// # Errors
/// When file can not be opened, or when file and variable exist but the
/// variable has a different shape than the input array.
pub fn write_to_hdf5<A, S, D, P>(filename: P, varname: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    A: H5Type,
    S: ndarray::Data<Elem = A>,
    D: ndarray::Dimension,
    P: AsRef<Path>,
{
    let file = if filename.as_ref().exists() {
        hdf5::File::append(filename)?
    } else {
        hdf5::File::create(filename)?
    };

    let dset = match file.dataset(varname) {
        // Overwrite
        Ok(dset) => dset,
        Err(..) => file
            .new_dataset::<A>()
            .no_chunk()
            .shape(array.shape())
            .create(varname)?,
    };
    dset.write(&array.view())?;
    Ok(())
}
