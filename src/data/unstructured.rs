use super::{Cell, CellArray, CellType, DataSetAttributes, FieldData, Points};
use crate::math::{Bounds, Vec3};
use crate::{Error, Result};

/// Points plus one heterogeneous cell list with a type tag per cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnstructuredGrid {
    pub points: Points,
    pub cells: CellArray,
    pub cell_types: Vec<CellType>,
    pub point_data: DataSetAttributes,
    pub cell_data: DataSetAttributes,
    pub field_data: FieldData,
}

impl UnstructuredGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Points) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    /// Add a cell, checking the point count of fixed-size types.
    pub fn insert_next_cell(&mut self, cell_type: CellType, ids: &[usize]) -> Result<usize> {
        if let Some(n) = cell_type.number_of_points() {
            if n != ids.len() {
                return Err(Error::invalid_argument(format!(
                    "{cell_type:?} needs {n} points, got {}",
                    ids.len()
                )));
            }
        }
        self.cell_types.push(cell_type);
        Ok(self.cells.insert_next_cell(ids))
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.number_of_cells()
    }

    pub fn point(&self, id: usize) -> Vec3 {
        self.points.get(id)
    }

    pub fn cell(&self, id: usize) -> Cell {
        Cell::new(self.cell_types[id], self.cells.cell(id).to_vec())
    }

    pub fn get_cell(&self, id: usize) -> Result<Cell> {
        if id >= self.number_of_cells() {
            return Err(Error::out_of_bounds(format!(
                "cell {id} of {}",
                self.number_of_cells()
            )));
        }
        Ok(self.cell(id))
    }

    pub fn cell_type(&self, id: usize) -> CellType {
        self.cell_types[id]
    }

    /// true when every cell is a tetra, voxel, hexahedron, wedge or pyramid
    pub fn is_linear_3d_only(&self) -> bool {
        self.cell_types.iter().all(CellType::is_linear_3d)
    }

    pub fn bounds(&self) -> Bounds {
        self.points.bounds()
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_types.len() != self.cells.number_of_cells() {
            return Err(Error::invalid_argument(format!(
                "{} cell types for {} cells",
                self.cell_types.len(),
                self.cells.number_of_cells()
            )));
        }
        if let Some(max) = self.cells.max_point_id() {
            if max >= self.number_of_points() {
                return Err(Error::out_of_bounds(format!(
                    "cell references point {max} but there are {} points",
                    self.number_of_points()
                )));
            }
        }
        Ok(())
    }

    pub fn append(&mut self, other: &UnstructuredGrid) {
        let offset = self.number_of_points();
        self.points.append(&other.points);
        self.cells.append(&other.cells, offset);
        self.cell_types.extend_from_slice(&other.cell_types);
        self.point_data.append_all(&other.point_data);
        self.cell_data.append_all(&other.cell_data);
    }
}

impl UnstructuredGrid {
    /// New grid with only the given cells and the points they use, renumbered in
    /// order of first use.
    pub fn extract_cells(&self, cell_ids: &[usize]) -> UnstructuredGrid {
        let mut map = vec![usize::MAX; self.number_of_points()];
        let mut used = Vec::new();
        let mut out = UnstructuredGrid::new();
        for &c in cell_ids {
            let ids: Vec<usize> = self
                .cells
                .cell(c)
                .iter()
                .map(|&p| {
                    if map[p] == usize::MAX {
                        map[p] = used.len();
                        used.push(p);
                    }
                    map[p]
                })
                .collect();
            out.cell_types.push(self.cell_types[c]);
            out.cells.insert_next_cell(&ids);
        }
        out.points = Points::from_vec(used.iter().map(|&p| self.points.get(p)).collect());
        out.point_data = self.point_data.extract(&used);
        out.cell_data = self.cell_data.extract(cell_ids);
        out.field_data = self.field_data.clone();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_cells_are_checked() {
        let mut grid = UnstructuredGrid::with_points(Points::from_vec(vec![[0.0; 3]; 4]));
        assert!(grid.insert_next_cell(CellType::Tetra, &[0, 1, 2]).is_err());
        assert_eq!(grid.insert_next_cell(CellType::Tetra, &[0, 1, 2, 3]).unwrap(), 0);
        grid.insert_next_cell(CellType::Polygon, &[0, 1, 2, 3, 0]).unwrap();
        assert_eq!(grid.number_of_cells(), 2);
        assert!(!grid.is_linear_3d_only());
        grid.validate().unwrap();
    }
}
