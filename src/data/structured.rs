use super::image::{extent_dimensions, structured_cell, structured_cell_count, Extent};
use super::{Cell, DataSetAttributes, FieldData, Points};
use crate::array::DataArray;
use crate::math::{self, Bounds, Vec3};
use crate::{Error, Result};

use std::sync::Arc;

/// Grid with one monotone coordinate array per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RectilinearGrid {
    pub extent: Extent,
    pub x_coordinates: Arc<DataArray>,
    pub y_coordinates: Arc<DataArray>,
    pub z_coordinates: Arc<DataArray>,
    pub point_data: DataSetAttributes,
    pub cell_data: DataSetAttributes,
    pub field_data: FieldData,
}

impl RectilinearGrid {
    /// Grid starting at index zero over the given coordinates.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        let extent = [
            0,
            x.len() as i32 - 1,
            0,
            y.len() as i32 - 1,
            0,
            z.len() as i32 - 1,
        ];
        Self::with_extent(
            extent,
            DataArray::scalars("x_coordinates", x),
            DataArray::scalars("y_coordinates", y),
            DataArray::scalars("z_coordinates", z),
        )
    }

    pub fn with_extent(
        extent: Extent,
        x: impl Into<Arc<DataArray>>,
        y: impl Into<Arc<DataArray>>,
        z: impl Into<Arc<DataArray>>,
    ) -> Result<Self> {
        let coords = [x.into(), y.into(), z.into()];
        let dims = extent_dimensions(&extent);
        for (axis, c) in coords.iter().enumerate() {
            if c.number_of_tuples() != dims[axis] {
                return Err(Error::invalid_argument(format!(
                    "axis {axis} has {} coordinates but the extent needs {}",
                    c.number_of_tuples(),
                    dims[axis]
                )));
            }
            let values = c.values_as_f64();
            if values.windows(2).any(|w| w[0] > w[1]) {
                return Err(Error::invalid_argument(format!(
                    "coordinates along axis {axis} are not monotone"
                )));
            }
        }
        let [x, y, z] = coords;
        Ok(Self {
            extent,
            x_coordinates: x,
            y_coordinates: y,
            z_coordinates: z,
            point_data: DataSetAttributes::new(),
            cell_data: DataSetAttributes::new(),
            field_data: FieldData::new(),
        })
    }

    pub fn dimensions(&self) -> [usize; 3] {
        extent_dimensions(&self.extent)
    }

    pub fn number_of_points(&self) -> usize {
        self.dimensions().iter().product()
    }

    pub fn number_of_cells(&self) -> usize {
        structured_cell_count(self.dimensions())
    }

    pub fn point(&self, id: usize) -> Vec3 {
        let dims = self.dimensions();
        let i = id % dims[0];
        let j = (id / dims[0]) % dims[1];
        let k = id / (dims[0] * dims[1]);
        [
            self.x_coordinates.component(i, 0),
            self.y_coordinates.component(j, 0),
            self.z_coordinates.component(k, 0),
        ]
    }

    pub fn cell(&self, id: usize) -> Cell {
        structured_cell(self.dimensions(), id)
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = math::empty_bounds();
        let ranges = [
            self.x_coordinates.range(0),
            self.y_coordinates.range(0),
            self.z_coordinates.range(0),
        ];
        for (axis, range) in ranges.iter().enumerate() {
            if let Some([lo, hi]) = range {
                bounds[2 * axis] = *lo;
                bounds[2 * axis + 1] = *hi;
            }
        }
        bounds
    }
}

/// Curvilinear grid: explicit points laid out along a structured extent.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredGrid {
    pub extent: Extent,
    pub points: Points,
    pub point_data: DataSetAttributes,
    pub cell_data: DataSetAttributes,
    pub field_data: FieldData,
}

impl StructuredGrid {
    pub fn new(extent: Extent, points: Points) -> Result<Self> {
        let n: usize = extent_dimensions(&extent).iter().product();
        if n != points.len() {
            return Err(Error::invalid_argument(format!(
                "extent {extent:?} needs {n} points, got {}",
                points.len()
            )));
        }
        Ok(Self {
            extent,
            points,
            point_data: DataSetAttributes::new(),
            cell_data: DataSetAttributes::new(),
            field_data: FieldData::new(),
        })
    }

    pub fn dimensions(&self) -> [usize; 3] {
        extent_dimensions(&self.extent)
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn number_of_cells(&self) -> usize {
        structured_cell_count(self.dimensions())
    }

    pub fn point(&self, id: usize) -> Vec3 {
        self.points.get(id)
    }

    /// Cells use hexahedron/quad ordering since the points need not be axis aligned.
    pub fn cell(&self, id: usize) -> Cell {
        let mut cell = structured_cell(self.dimensions(), id);
        cell.to_non_axis_aligned();
        cell
    }

    pub fn bounds(&self) -> Bounds {
        self.points.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellType;

    #[test]
    fn rectilinear_points_and_bounds() {
        let grid = RectilinearGrid::new(vec![0.0, 1.0, 3.0], vec![-1.0, 1.0], vec![2.0]).unwrap();
        assert_eq!(grid.number_of_points(), 6);
        assert_eq!(grid.number_of_cells(), 2);
        assert_eq!(grid.point(5), [3.0, 1.0, 2.0]);
        assert_eq!(grid.bounds(), [0.0, 3.0, -1.0, 1.0, 2.0, 2.0]);
        assert!(RectilinearGrid::new(vec![1.0, 0.0], vec![0.0], vec![0.0]).is_err());
    }

    #[test]
    fn structured_cells_are_hexahedra() {
        let points: Points = (0..8)
            .map(|i| [(i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64])
            .collect();
        let grid = StructuredGrid::new([0, 1, 0, 1, 0, 1], points).unwrap();
        let cell = grid.cell(0);
        assert_eq!(cell.cell_type, CellType::Hexahedron);
        assert_eq!(cell.point_ids, vec![0, 1, 3, 2, 4, 5, 7, 6]);
    }
}
