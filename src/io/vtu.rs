//! Ascii `vtu` and `pvtu` files for paraview
//!
//! Only what the solver writes is supported: one cell type per piece,
//! `Float64` point and cell data.
use crate::error::Result;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Vtk cell type of the linear tetrahedron
pub const VTK_TETRA: u8 = 10;
/// Vtk cell type of the quadratic tetrahedron
pub const VTK_QUADRATIC_TETRA: u8 = 24;

/// Named data with `n_components` values per point (or cell)
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    /// Name shown in paraview
    pub name: String,
    /// Values per entry
    pub n_components: usize,
    /// Interleaved values
    pub values: Vec<f64>,
}

impl DataArray {
    /// New data array
    pub fn new<S: Into<String>>(name: S, n_components: usize, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            n_components,
            values,
        }
    }

    fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(
            out,
            r#"        <DataArray type="Float64" Name="{}" NumberOfComponents="{}" format="ascii">"#,
            self.name, self.n_components
        )?;
        for chunk in self.values.chunks(self.n_components.max(1)) {
            let line: Vec<String> = chunk.iter().map(|v| format!("{:.8e}", v)).collect();
            writeln!(out, "          {}", line.join(" "))?;
        }
        writeln!(out, "        </DataArray>")?;
        Ok(())
    }
}

/// One piece of an unstructured grid
#[derive(Debug, Clone, Default)]
pub struct UnstructuredGrid {
    /// Point coordinates
    pub points: Vec<Point3<f64>>,
    /// Point indices of each cell, in vtk node order
    pub cells: Vec<Vec<usize>>,
    /// Vtk cell type shared by all cells
    pub cell_type: u8,
    /// Data on points
    pub point_data: Vec<DataArray>,
    /// Data on cells
    pub cell_data: Vec<DataArray>,
}

impl UnstructuredGrid {
    /// Write the piece as xml
    ///
    /// # Errors
    /// Writing to `out` failed
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
            self.points.len(),
            self.cells.len()
        )?;

        writeln!(out, "      <Points>")?;
        writeln!(
            out,
            r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        )?;
        for p in &self.points {
            writeln!(out, "          {:.8e} {:.8e} {:.8e}", p.x, p.y, p.z)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int64" Name="connectivity" format="ascii">"#
        )?;
        for cell in &self.cells {
            let line: Vec<String> = cell.iter().map(ToString::to_string).collect();
            writeln!(out, "          {}", line.join(" "))?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int64" Name="offsets" format="ascii">"#
        )?;
        let mut offset = 0;
        for cell in &self.cells {
            offset += cell.len();
            writeln!(out, "          {}", offset)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, r#"        <DataArray type="UInt8" Name="types" format="ascii">"#)?;
        for _ in &self.cells {
            writeln!(out, "          {}", self.cell_type)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "      <PointData>")?;
        for data in &self.point_data {
            data.write(out)?;
        }
        writeln!(out, "      </PointData>")?;
        writeln!(out, "      <CellData>")?;
        for data in &self.cell_data {
            data.write(out)?;
        }
        writeln!(out, "      </CellData>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        Ok(())
    }

    /// Write the piece to `filename`
    ///
    /// # Errors
    /// File could not be created or written
    pub fn write_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(filename)?);
        self.write(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// Write the `pvtu` record combining `pieces`.
///
/// `point_data` and `cell_data` list name and number of components of the
/// arrays every piece carries.
///
/// # Errors
/// Writing to `out` failed
pub fn write_pvtu<W: Write>(
    out: &mut W,
    pieces: &[String],
    point_data: &[(&str, usize)],
    cell_data: &[(&str, usize)],
) -> Result<()> {
    writeln!(out, r#"<?xml version="1.0"?>"#)?;
    writeln!(
        out,
        r#"<VTKFile type="PUnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
    )?;
    writeln!(out, r#"  <PUnstructuredGrid GhostLevel="0">"#)?;
    writeln!(out, "    <PPoints>")?;
    writeln!(out, r#"      <PDataArray type="Float64" NumberOfComponents="3"/>"#)?;
    writeln!(out, "    </PPoints>")?;
    writeln!(out, "    <PPointData>")?;
    for (name, n) in point_data {
        writeln!(
            out,
            r#"      <PDataArray type="Float64" Name="{}" NumberOfComponents="{}"/>"#,
            name, n
        )?;
    }
    writeln!(out, "    </PPointData>")?;
    writeln!(out, "    <PCellData>")?;
    for (name, n) in cell_data {
        writeln!(
            out,
            r#"      <PDataArray type="Float64" Name="{}" NumberOfComponents="{}"/>"#,
            name, n
        )?;
    }
    writeln!(out, "    </PCellData>")?;
    for piece in pieces {
        writeln!(out, r#"    <Piece Source="{}"/>"#, piece)?;
    }
    writeln!(out, "  </PUnstructuredGrid>")?;
    writeln!(out, "</VTKFile>")?;
    Ok(())
}
