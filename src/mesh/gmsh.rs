//! Reader for Gmsh ASCII mesh files (format 2.2 and 4.1)
//!
//! Tetrahedra (linear or quadratic, only corners are used) become cells,
//! triangles become boundary faces tagged with their physical group.
use super::{BoundaryFace, BoundaryId, Mesh};
use crate::error::{NavierError, Result};
use nalgebra::Point3;
use std::collections::HashMap;
use std::path::Path;

const TRI3: usize = 2;
const TET4: usize = 4;
const TRI6: usize = 9;
const TET10: usize = 11;

/// Read mesh from a `.msh` file
///
/// # Errors
/// File can not be read or is not a supported Gmsh format.
pub fn read_msh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let content = std::fs::read_to_string(path)?;
    parse_msh(&content)
}

/// Line iterator that remembers line numbers for error messages
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            inner: content.lines().enumerate(),
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<&'a str> {
        for (i, l) in &mut self.inner {
            self.line = i + 1;
            let l = l.trim();
            if !l.is_empty() {
                return Ok(l);
            }
        }
        Err(self.error("unexpected end of file"))
    }

    fn numbers<T: std::str::FromStr>(&mut self) -> Result<Vec<T>> {
        let line = self.next_line()?;
        line.split_whitespace()
            .map(|t| t.parse::<T>().map_err(|_| self.error(&format!("cannot parse '{}'", t))))
            .collect()
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        let line = self.next_line()?;
        if line == tag {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}, found {}", tag, line)))
        }
    }

    fn skip_section(&mut self, name: &str) -> Result<()> {
        let end = format!("$End{}", name);
        loop {
            if self.next_line()? == end {
                return Ok(());
            }
        }
    }

    fn error(&self, message: &str) -> NavierError {
        NavierError::MeshFormat {
            line: self.line,
            message: message.to_owned(),
        }
    }
}

/// Raw element lists collected while parsing
#[derive(Default)]
struct Collector {
    vertices: Vec<Point3<f64>>,
    node_index: HashMap<usize, usize>,
    cells: Vec<[usize; 4]>,
    faces: Vec<BoundaryFace>,
}

impl Collector {
    fn add_node(&mut self, tag: usize, x: f64, y: f64, z: f64) {
        self.node_index.insert(tag, self.vertices.len());
        self.vertices.push(Point3::new(x, y, z));
    }

    fn node(&self, tag: usize, lines: &Lines) -> Result<usize> {
        self.node_index
            .get(&tag)
            .copied()
            .ok_or_else(|| lines.error(&format!("unknown node {}", tag)))
    }

    fn add_element(
        &mut self,
        kind: usize,
        id: Option<BoundaryId>,
        nodes: &[usize],
        lines: &Lines,
    ) -> Result<()> {
        match kind {
            TET4 | TET10 => {
                if nodes.len() < 4 {
                    return Err(lines.error("tetrahedron with less than 4 nodes"));
                }
                let mut cell = [0; 4];
                for (c, n) in cell.iter_mut().zip(nodes) {
                    *c = self.node(*n, lines)?;
                }
                self.cells.push(cell);
            }
            TRI3 | TRI6 => {
                if nodes.len() < 3 {
                    return Err(lines.error("triangle with less than 3 nodes"));
                }
                if let Some(id) = id {
                    let mut vertices = [0; 3];
                    for (v, n) in vertices.iter_mut().zip(nodes) {
                        *v = self.node(*n, lines)?;
                    }
                    self.faces.push(BoundaryFace { vertices, id });
                }
            }
            // points, lines and other element types carry no information here
            _ => (),
        }
        Ok(())
    }

    fn finish(self) -> Result<Mesh> {
        if self.cells.is_empty() {
            return Err(NavierError::MeshFormat {
                line: 0,
                message: "mesh contains no tetrahedra".to_owned(),
            });
        }
        // only tetrahedron corners become vertices, mid-edge and free nodes are dropped
        let mut used = vec![false; self.vertices.len()];
        for cell in &self.cells {
            for &v in cell {
                used[v] = true;
            }
        }
        let mut renumber = vec![None; self.vertices.len()];
        let mut vertices = Vec::with_capacity(used.iter().filter(|&&u| u).count());
        for (old, x) in self.vertices.into_iter().enumerate() {
            if used[old] {
                renumber[old] = Some(vertices.len());
                vertices.push(x);
            }
        }
        let cells = self
            .cells
            .iter()
            .map(|cell| renumbered(cell, &renumber))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| NavierError::MeshFormat {
                line: 0,
                message: "tetrahedron corner was not renumbered".to_owned(),
            })?;
        let n_faces = self.faces.len();
        let faces: Vec<BoundaryFace> = self
            .faces
            .into_iter()
            .filter_map(|face| {
                renumbered(&face.vertices, &renumber).map(|vertices| BoundaryFace {
                    vertices,
                    id: face.id,
                })
            })
            .collect();
        if faces.len() < n_faces {
            log::warn!(
                "{} boundary triangles are not spanned by tetrahedron corners",
                n_faces - faces.len()
            );
        }
        Mesh::new(vertices, cells, faces)
    }
}

/// Map node indices through `renumber`, `None` if any node was dropped
fn renumbered<const N: usize>(
    nodes: &[usize; N],
    renumber: &[Option<usize>],
) -> Option<[usize; N]> {
    let mut out = [0; N];
    for (o, &n) in out.iter_mut().zip(nodes.iter()) {
        *o = renumber[n]?;
    }
    Some(out)
}

/// Parse the content of a `.msh` file
///
/// # Errors
/// Unsupported version, binary files or malformed sections.
pub fn parse_msh(content: &str) -> Result<Mesh> {
    let mut lines = Lines::new(content);
    lines.expect("$MeshFormat")?;
    let header = lines.next_line()?;
    let mut tokens = header.split_whitespace();
    let version = tokens.next().unwrap_or("");
    let file_type = tokens.next().unwrap_or("");
    if file_type != "0" {
        return Err(lines.error("only ASCII mesh files are supported"));
    }
    lines.expect("$EndMeshFormat")?;
    match version {
        "2.2" | "2.1" | "2" => parse_v2(lines),
        "4.1" => parse_v4(lines),
        _ => Err(lines.error(&format!("unsupported mesh format version {}", version))),
    }
}

fn parse_v2(mut lines: Lines) -> Result<Mesh> {
    let mut collector = Collector::default();
    while let Ok(line) = lines.next_line() {
        match line {
            "$Nodes" => {
                let n = lines.numbers::<usize>()?;
                for _ in 0..n[0] {
                    let line = lines.next_line()?;
                    let t: Vec<&str> = line.split_whitespace().collect();
                    if t.len() < 4 {
                        return Err(lines.error("node line needs tag and 3 coordinates"));
                    }
                    let tag = parse(&lines, t[0])?;
                    let x = parse(&lines, t[1])?;
                    let y = parse(&lines, t[2])?;
                    let z = parse(&lines, t[3])?;
                    collector.add_node(tag, x, y, z);
                }
                lines.expect("$EndNodes")?;
            }
            "$Elements" => {
                let n = lines.numbers::<usize>()?;
                for _ in 0..n[0] {
                    // tag type ntags tags... nodes...
                    let e = lines.numbers::<usize>()?;
                    if e.len() < 3 || e.len() < 3 + e[2] {
                        return Err(lines.error("malformed element line"));
                    }
                    let ntags = e[2];
                    #[allow(clippy::cast_possible_truncation)]
                    let id = if ntags > 0 {
                        Some(e[3] as BoundaryId)
                    } else {
                        None
                    };
                    collector.add_element(e[1], id, &e[3 + ntags..], &lines)?;
                }
                lines.expect("$EndElements")?;
            }
            other if other.starts_with('$') => {
                let name = other.trim_start_matches('$').to_owned();
                lines.skip_section(&name)?;
            }
            _ => return Err(lines.error("unexpected content outside of a section")),
        }
    }
    collector.finish()
}

fn parse_v4(mut lines: Lines) -> Result<Mesh> {
    let mut collector = Collector::default();
    // (dim, entity tag) -> first physical tag
    let mut physical: HashMap<(usize, i64), BoundaryId> = HashMap::new();
    while let Ok(line) = lines.next_line() {
        match line {
            "$Entities" => {
                let counts = lines.numbers::<usize>()?;
                if counts.len() < 4 {
                    return Err(lines.error("entity counts need 4 entries"));
                }
                for (dim, &count) in counts.iter().enumerate().take(4) {
                    for _ in 0..count {
                        let t = lines.numbers::<f64>()?;
                        // points: tag x y z nphys tags..., others: tag box(6) nphys tags...
                        let offset = if dim == 0 { 4 } else { 7 };
                        if t.len() <= offset {
                            return Err(lines.error("malformed entity line"));
                        }
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let nphys = t[offset] as usize;
                        if nphys > 0 && t.len() > offset + 1 {
                            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                            physical.insert((dim, t[0] as i64), t[offset + 1].abs() as BoundaryId);
                        }
                    }
                }
                lines.expect("$EndEntities")?;
            }
            "$Nodes" => {
                let header = lines.numbers::<usize>()?;
                for _ in 0..header[0] {
                    let block = lines.numbers::<i64>()?;
                    if block.len() < 4 {
                        return Err(lines.error("malformed node block"));
                    }
                    if block[2] != 0 {
                        return Err(lines.error("parametric nodes are not supported"));
                    }
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let n = block[3] as usize;
                    let mut tags = Vec::with_capacity(n);
                    for _ in 0..n {
                        tags.push(lines.numbers::<usize>()?[0]);
                    }
                    for tag in tags {
                        let x = lines.numbers::<f64>()?;
                        if x.len() < 3 {
                            return Err(lines.error("node needs 3 coordinates"));
                        }
                        collector.add_node(tag, x[0], x[1], x[2]);
                    }
                }
                lines.expect("$EndNodes")?;
            }
            "$Elements" => {
                let header = lines.numbers::<usize>()?;
                for _ in 0..header[0] {
                    let block = lines.numbers::<i64>()?;
                    if block.len() < 4 {
                        return Err(lines.error("malformed element block"));
                    }
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let (dim, kind, n) = (block[0] as usize, block[2] as usize, block[3] as usize);
                    let id = physical.get(&(dim, block[1])).copied();
                    for _ in 0..n {
                        let e = lines.numbers::<usize>()?;
                        if e.is_empty() {
                            return Err(lines.error("empty element line"));
                        }
                        collector.add_element(kind, id, &e[1..], &lines)?;
                    }
                }
                lines.expect("$EndElements")?;
            }
            other if other.starts_with('$') => {
                let name = other.trim_start_matches('$').to_owned();
                lines.skip_section(&name)?;
            }
            _ => return Err(lines.error("unexpected content outside of a section")),
        }
    }
    collector.finish()
}

fn parse<T: std::str::FromStr>(lines: &Lines, token: &str) -> Result<T> {
    token
        .parse::<T>()
        .map_err(|_| lines.error(&format!("cannot parse '{}'", token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const MSH2: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$PhysicalNames
1
2 3 \"obstacle\"
$EndPhysicalNames
$Nodes
5
1 0 0 0
2 1 0 0
3 0 1 0
4 0 0 1
5 1 1 1
$EndNodes
$Elements
4
1 2 2 3 1 1 2 3
2 2 2 0 7 1 2 4
3 4 2 5 1 1 2 3 4
4 4 2 5 1 2 3 4 5
$EndElements
";

    const MSH4: &str = "$MeshFormat
4.1 0 8
$EndMeshFormat
$Entities
0 0 1 1
1 0 0 0 1 1 0 1 3 3 1 2 3
1 0 0 0 1 1 1 1 5 0
$EndEntities
$Nodes
2 4 1 4
2 1 0 3
1
2
3
0 0 0
1 0 0
0 1 0
3 1 0 1
4
0 0 1
$EndNodes
$Elements
2 2 1 2
2 1 2 1
1 1 2 3
3 1 4 1
2 1 2 3 4
$EndElements
";

    #[test]
    fn test_parse_v2() {
        let mesh = parse_msh(MSH2).unwrap();
        assert_eq!(mesh.n_vertices(), 5);
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.boundary_ids(), vec![0, 3]);
        let volume: f64 = (0..2).map(|c| mesh.volume(c)).sum();
        assert_abs_diff_eq!(volume, 1. / 6. + 1. / 3., epsilon = 1e-12);
    }

    #[test]
    fn test_parse_v4() {
        let mesh = parse_msh(MSH4).unwrap();
        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_cells(), 1);
        assert_eq!(mesh.boundary_ids(), vec![3]);
    }

    #[test]
    fn test_quadratic_elements_keep_corners_only() {
        // mid-edge nodes 1-6 come first, node 11 is unconnected
        let content = "$MeshFormat
2.2 0 8
$EndMeshFormat
$Nodes
11
1 0.5 0 0
2 0.5 0.5 0
3 0 0.5 0
4 0 0 0.5
5 0 0.5 0.5
6 0.5 0 0.5
7 0 0 0
8 1 0 0
9 0 1 0
10 0 0 1
11 5 5 5
$EndNodes
$Elements
2
1 9 2 2 1 7 8 9 1 2 3
2 11 2 0 1 7 8 9 10 1 2 3 4 5 6
$EndElements
";
        let mesh = parse_msh(content).unwrap();
        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_cells(), 1);
        assert_eq!(mesh.cell(0), &[0, 1, 2, 3]);
        assert_abs_diff_eq!(mesh.vertices()[1].x, 1., epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.volume(0), 1. / 6., epsilon = 1e-12);
        assert_eq!(mesh.boundary_ids(), vec![2]);
        assert_eq!(mesh.boundary_faces()[0].vertices, [0, 1, 2]);
        let (_, max) = mesh.bounding_box();
        assert_abs_diff_eq!(max.x, 1., epsilon = 1e-12);
    }

    #[test]
    fn test_binary_is_rejected() {
        let content = "$MeshFormat\n2.2 1 8\n$EndMeshFormat\n";
        assert!(parse_msh(content).is_err());
    }

    #[test]
    fn test_missing_node_is_reported() {
        let content = MSH2.replace("4 4 2 5 1 2 3 4 5", "4 4 2 5 1 2 3 4 9");
        match parse_msh(&content) {
            Err(NavierError::MeshFormat { line, .. }) => assert!(line > 0),
            _ => panic!("expected mesh format error"),
        }
    }
}
