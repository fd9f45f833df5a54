use super::{Cell, CellArray, CellType, DataSetAttributes, FieldData, Points};
use crate::math::{Bounds, Vec3};
use crate::{Error, Result};

/// Which of the four cell arrays of a [`PolyData`] a cell lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyCellKind {
    Verts,
    Lines,
    Polys,
    Strips,
}

/// Points plus vertex, line, polygon and triangle strip cells.
///
/// Cell ids run over verts, then lines, then polys, then strips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyData {
    pub points: Points,
    pub verts: CellArray,
    pub lines: CellArray,
    pub polys: CellArray,
    pub strips: CellArray,
    pub point_data: DataSetAttributes,
    pub cell_data: DataSetAttributes,
    pub field_data: FieldData,
}

impl PolyData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Points) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.verts.number_of_cells()
            + self.lines.number_of_cells()
            + self.polys.number_of_cells()
            + self.strips.number_of_cells()
    }

    pub fn point(&self, id: usize) -> Vec3 {
        self.points.get(id)
    }

    /// Split a global cell id into the cell array holding it and the local index.
    pub fn locate_cell(&self, id: usize) -> Option<(PolyCellKind, usize)> {
        let mut id = id;
        for (kind, cells) in [
            (PolyCellKind::Verts, &self.verts),
            (PolyCellKind::Lines, &self.lines),
            (PolyCellKind::Polys, &self.polys),
            (PolyCellKind::Strips, &self.strips),
        ] {
            if id < cells.number_of_cells() {
                return Some((kind, id));
            }
            id -= cells.number_of_cells();
        }
        None
    }

    pub fn cells_of(&self, kind: PolyCellKind) -> &CellArray {
        match kind {
            PolyCellKind::Verts => &self.verts,
            PolyCellKind::Lines => &self.lines,
            PolyCellKind::Polys => &self.polys,
            PolyCellKind::Strips => &self.strips,
        }
    }

    /// `None` when `id` is past the last cell.
    pub fn cell(&self, id: usize) -> Option<Cell> {
        let (kind, local) = self.locate_cell(id)?;
        let ids = self.cells_of(kind).cell(local);
        let cell_type = match kind {
            PolyCellKind::Verts if ids.len() == 1 => CellType::Vertex,
            PolyCellKind::Verts => CellType::PolyVertex,
            PolyCellKind::Lines if ids.len() == 2 => CellType::Line,
            PolyCellKind::Lines => CellType::PolyLine,
            PolyCellKind::Polys if ids.len() == 3 => CellType::Triangle,
            PolyCellKind::Polys if ids.len() == 4 => CellType::Quad,
            PolyCellKind::Polys => CellType::Polygon,
            PolyCellKind::Strips => CellType::TriangleStrip,
        };
        Some(Cell::new(cell_type, ids.to_vec()))
    }

    pub fn get_cell(&self, id: usize) -> Result<Cell> {
        self.cell(id)
            .ok_or_else(|| Error::out_of_bounds(format!("cell {id} of {}", self.number_of_cells())))
    }

    pub fn bounds(&self) -> Bounds {
        self.points.bounds()
    }

    /// Check that every cell references existing points.
    pub fn validate(&self) -> Result<()> {
        let n = self.number_of_points();
        for cells in [&self.verts, &self.lines, &self.polys, &self.strips] {
            if let Some(max) = cells.max_point_id() {
                if max >= n {
                    return Err(Error::out_of_bounds(format!(
                        "cell references point {max} but there are {n} points"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Polygons and strips as triangles (fan and strip decomposition), with the id of
    /// the cell each triangle came from.
    pub fn triangles(&self) -> Vec<([usize; 3], usize)> {
        let mut out = Vec::new();
        let poly_base = self.verts.number_of_cells() + self.lines.number_of_cells();
        for (local, poly) in self.polys.iter().enumerate() {
            for t in 1..poly.len().saturating_sub(1) {
                out.push(([poly[0], poly[t], poly[t + 1]], poly_base + local));
            }
        }
        let strip_base = poly_base + self.polys.number_of_cells();
        for (local, strip) in self.strips.iter().enumerate() {
            for t in 0..strip.len().saturating_sub(2) {
                let tri = if t % 2 == 0 {
                    [strip[t], strip[t + 1], strip[t + 2]]
                } else {
                    [strip[t + 1], strip[t], strip[t + 2]]
                };
                out.push((tri, strip_base + local));
            }
        }
        out
    }

    /// Append another polydata, offsetting its point ids. Only arrays present in both
    /// are kept.
    pub fn append(&mut self, other: &PolyData) {
        let offset = self.number_of_points();
        self.points.append(&other.points);
        self.verts.append(&other.verts, offset);
        self.lines.append(&other.lines, offset);
        self.polys.append(&other.polys, offset);
        self.strips.append(&other.strips, offset);
        self.point_data.append_all(&other.point_data);
        self.cell_data.append_all(&other.cell_data);
    }
}

impl PolyData {
    /// New polydata with only the given cells (global ids) and the points they use.
    pub fn extract_cells(&self, cell_ids: &[usize]) -> PolyData {
        let mut map = vec![usize::MAX; self.number_of_points()];
        let mut used = Vec::new();
        let mut out = PolyData::new();
        let mut kept = Vec::with_capacity(cell_ids.len());
        // cells are regrouped by kind, so cell data follows the new global order
        for kind in [PolyCellKind::Verts, PolyCellKind::Lines, PolyCellKind::Polys, PolyCellKind::Strips] {
            for &c in cell_ids {
                let Some((k, local)) = self.locate_cell(c) else { continue };
                if k != kind {
                    continue;
                }
                let ids: Vec<usize> = self
                    .cells_of(k)
                    .cell(local)
                    .iter()
                    .map(|&p| {
                        if map[p] == usize::MAX {
                            map[p] = used.len();
                            used.push(p);
                        }
                        map[p]
                    })
                    .collect();
                let target = match k {
                    PolyCellKind::Verts => &mut out.verts,
                    PolyCellKind::Lines => &mut out.lines,
                    PolyCellKind::Polys => &mut out.polys,
                    PolyCellKind::Strips => &mut out.strips,
                };
                target.insert_next_cell(&ids);
                kept.push(c);
            }
        }
        out.points = Points::from_vec(used.iter().map(|&p| self.points.get(p)).collect());
        out.point_data = self.point_data.extract(&used);
        out.cell_data = self.cell_data.extract(&kept);
        out.field_data = self.field_data.clone();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> PolyData {
        let mut pd = PolyData::with_points(Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]));
        pd.verts.insert_next_cell(&[0]);
        pd.lines.insert_next_cell(&[0, 1, 2]);
        pd.polys.insert_next_cell(&[0, 1, 2, 3]);
        pd
    }

    #[test]
    fn cell_ids_span_all_arrays() {
        let pd = square();
        assert_eq!(pd.number_of_cells(), 3);
        assert_eq!(pd.cell(0).map(|c| c.cell_type), Some(CellType::Vertex));
        assert_eq!(pd.cell(1).map(|c| c.cell_type), Some(CellType::PolyLine));
        assert_eq!(pd.cell(2).map(|c| c.cell_type), Some(CellType::Quad));
        assert!(pd.cell(3).is_none());
        assert!(pd.get_cell(3).is_err());
        assert_eq!(pd.triangles(), vec![([0, 1, 2], 2), ([0, 2, 3], 2)]);
    }

    #[test]
    fn dangling_ids_are_reported() {
        let mut pd = square();
        pd.polys.insert_next_cell(&[0, 9, 2]);
        assert!(pd.validate().is_err());
    }
}
