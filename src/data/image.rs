use super::{Cell, CellType, DataSetAttributes, FieldData};
use crate::array::DataArray;
use crate::math::{self, Bounds, Mat3, Vec3};
use crate::{Error, Result};

use ndarray::Array3;

/// Integer index range `[i0, i1, j0, j1, k0, k1]` of a structured dataset.
pub type Extent = [i32; 6];

/// Number of points along each axis of an extent.
pub fn extent_dimensions(extent: &Extent) -> [usize; 3] {
    let mut dims = [0; 3];
    for (axis, dim) in dims.iter_mut().enumerate() {
        let n = extent[2 * axis + 1] - extent[2 * axis] + 1;
        *dim = n.max(0) as usize;
    }
    dims
}

pub fn extent_is_empty(extent: &Extent) -> bool {
    extent_dimensions(extent).iter().any(|d| *d == 0)
}

/// Intersection of two extents, `None` when they do not overlap.
pub fn intersect_extents(a: &Extent, b: &Extent) -> Option<Extent> {
    let mut out = [0; 6];
    for axis in 0..3 {
        out[2 * axis] = a[2 * axis].max(b[2 * axis]);
        out[2 * axis + 1] = a[2 * axis + 1].min(b[2 * axis + 1]);
        if out[2 * axis] > out[2 * axis + 1] {
            return None;
        }
    }
    Some(out)
}

/// Cells of a structured block with `dims` points.
pub(crate) fn structured_cell_count(dims: [usize; 3]) -> usize {
    if dims.iter().any(|d| *d == 0) {
        return 0;
    }
    dims.iter().map(|d| if *d > 1 { d - 1 } else { 1 }).product()
}

/// Cell of a structured block: vertex, line, pixel or voxel depending on how many
/// axes have more than one point.
pub(crate) fn structured_cell(dims: [usize; 3], cell: usize) -> Cell {
    let cdims: Vec<usize> = dims.iter().map(|d| if *d > 1 { d - 1 } else { 1 }).collect();
    let ci = cell % cdims[0];
    let cj = (cell / cdims[0]) % cdims[1];
    let ck = cell / (cdims[0] * cdims[1]);
    let point = |i: usize, j: usize, k: usize| i + dims[0] * (j + dims[1] * k);

    let active: Vec<usize> = (0..3).filter(|a| dims[*a] > 1).collect();
    let base = [ci, cj, ck];
    let mut ids = Vec::new();
    // voxel/pixel point order: i fastest, then j, then k
    let steps = 1usize << active.len();
    for bits in 0..steps {
        let mut idx = base;
        for (n, axis) in active.iter().enumerate() {
            if bits & (1 << n) != 0 {
                idx[*axis] += 1;
            }
        }
        ids.push(point(idx[0], idx[1], idx[2]));
    }
    let cell_type = match active.len() {
        0 => CellType::Vertex,
        1 => CellType::Line,
        2 => CellType::Pixel,
        _ => CellType::Voxel,
    };
    Cell::new(cell_type, ids)
}

/// Regular grid with origin, spacing, extent and an optional direction matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub extent: Extent,
    pub origin: Vec3,
    pub spacing: Vec3,
    pub direction: Mat3,
    pub point_data: DataSetAttributes,
    pub cell_data: DataSetAttributes,
    pub field_data: FieldData,
}

impl Default for ImageData {
    fn default() -> Self {
        Self {
            extent: [0, -1, 0, -1, 0, -1],
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: math::IDENTITY3,
            point_data: DataSetAttributes::new(),
            cell_data: DataSetAttributes::new(),
            field_data: FieldData::new(),
        }
    }
}

impl ImageData {
    pub fn new(extent: Extent, origin: Vec3, spacing: Vec3) -> Self {
        Self {
            extent,
            origin,
            spacing,
            ..Default::default()
        }
    }

    /// Image with `dims` points starting at index zero.
    pub fn with_dimensions(dims: [usize; 3], origin: Vec3, spacing: Vec3) -> Self {
        let extent = [
            0,
            dims[0] as i32 - 1,
            0,
            dims[1] as i32 - 1,
            0,
            dims[2] as i32 - 1,
        ];
        Self::new(extent, origin, spacing)
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

    /// structural dimension (number of axes with more than one point)
    pub fn data_dimension(&self) -> usize {
        self.dimensions().iter().filter(|d| **d > 1).count()
    }

    /// world position of structured index `(i, j, k)`
    pub fn index_to_world(&self, ijk: [f64; 3]) -> Vec3 {
        let local = [
            ijk[0] * self.spacing[0],
            ijk[1] * self.spacing[1],
            ijk[2] * self.spacing[2],
        ];
        math::add(self.origin, math::mat3_mul_vec(&self.direction, local))
    }

    /// continuous structured index of a world position
    pub fn world_to_index(&self, p: Vec3) -> Vec3 {
        let rel = math::sub(p, self.origin);
        let inv = math::invert3(&self.direction).unwrap_or(math::IDENTITY3);
        let local = math::mat3_mul_vec(&inv, rel);
        [
            local[0] / self.spacing[0],
            local[1] / self.spacing[1],
            local[2] / self.spacing[2],
        ]
    }

    /// flat id of the point at structured index `(i, j, k)`
    pub fn point_id(&self, i: i32, j: i32, k: i32) -> usize {
        let dims = self.dimensions();
        let (i, j, k) = (
            (i - self.extent[0]) as usize,
            (j - self.extent[2]) as usize,
            (k - self.extent[4]) as usize,
        );
        i + dims[0] * (j + dims[1] * k)
    }

    pub fn point(&self, id: usize) -> Vec3 {
        let dims = self.dimensions();
        let i = id % dims[0];
        let j = (id / dims[0]) % dims[1];
        let k = id / (dims[0] * dims[1]);
        self.index_to_world([
            (i as i32 + self.extent[0]) as f64,
            (j as i32 + self.extent[2]) as f64,
            (k as i32 + self.extent[4]) as f64,
        ])
    }

    pub fn cell(&self, id: usize) -> Cell {
        structured_cell(self.dimensions(), id)
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = math::empty_bounds();
        if extent_is_empty(&self.extent) {
            return bounds;
        }
        for &i in &[self.extent[0], self.extent[1]] {
            for &j in &[self.extent[2], self.extent[3]] {
                for &k in &[self.extent[4], self.extent[5]] {
                    math::grow_bounds(&mut bounds, self.index_to_world([i as f64, j as f64, k as f64]));
                }
            }
        }
        bounds
    }

    /// Allocate a single component double scalar array filled by `f(world position)`.
    pub fn fill_point_scalars<F: Fn(Vec3) -> f64>(&mut self, name: &str, f: F) -> Result<()> {
        let values: Vec<f64> = (0..self.number_of_points()).map(|i| f(self.point(i))).collect();
        self.point_data.set_scalars(DataArray::scalars(name, values))?;
        Ok(())
    }

    /// Active point scalars (component 0) as an array indexed `[[i, j, k]]`.
    pub fn scalars_array3(&self) -> Result<Array3<f64>> {
        let scalars = self
            .point_data
            .scalars()
            .ok_or_else(|| Error::invalid_argument("image has no point scalars"))?;
        self.array3(scalars, 0)
    }

    /// Component `component` of a point array as an array indexed `[[i, j, k]]`.
    pub fn array3(&self, array: &DataArray, component: usize) -> Result<Array3<f64>> {
        let dims = self.dimensions();
        if array.number_of_tuples() != self.number_of_points() {
            return Err(Error::invalid_argument(format!(
                "array has {} tuples but the image has {} points",
                array.number_of_tuples(),
                self.number_of_points()
            )));
        }
        Ok(Array3::from_shape_fn((dims[0], dims[1], dims[2]), |(i, j, k)| {
            array.component(i + dims[0] * (j + dims[1] * k), component)
        }))
    }

    /// Store an `[[i, j, k]]` indexed array as point scalars.
    pub fn set_scalars_from_array3(&mut self, name: &str, values: &Array3<f64>) -> Result<()> {
        let dims = self.dimensions();
        if values.dim() != (dims[0], dims[1], dims[2]) {
            return Err(Error::invalid_argument(format!(
                "array shape {:?} does not match image dimensions {:?}",
                values.dim(),
                dims
            )));
        }
        let mut flat = Vec::with_capacity(self.number_of_points());
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    flat.push(values[[i, j, k]]);
                }
            }
        }
        self.point_data.set_scalars(DataArray::scalars(name, flat))?;
        Ok(())
    }

    /// The sub-image covering `extent` (which must lie inside ours).
    pub fn crop(&self, extent: &Extent) -> Result<ImageData> {
        let inside = intersect_extents(&self.extent, extent)
            .ok_or_else(|| Error::out_of_bounds(format!("extent {extent:?} outside of {:?}", self.extent)))?;
        let mut out = ImageData {
            extent: inside,
            origin: self.origin,
            spacing: self.spacing,
            direction: self.direction,
            ..Default::default()
        };
        let mut point_ids = Vec::new();
        for k in inside[4]..=inside[5] {
            for j in inside[2]..=inside[3] {
                for i in inside[0]..=inside[1] {
                    point_ids.push(self.point_id(i, j, k));
                }
            }
        }
        out.point_data = self.point_data.extract(&point_ids);

        let dims = self.dimensions();
        let out_dims = out.dimensions();
        let same_structure = (0..3).all(|a| (dims[a] > 1) == (out_dims[a] > 1));
        if same_structure {
            let cdims: Vec<usize> = dims.iter().map(|d| if *d > 1 { d - 1 } else { 1 }).collect();
            let hi = |axis: usize| {
                if dims[axis] > 1 {
                    inside[2 * axis + 1] - 1
                } else {
                    inside[2 * axis + 1]
                }
            };
            let mut cell_ids = Vec::new();
            for k in inside[4]..=hi(2) {
                for j in inside[2]..=hi(1) {
                    for i in inside[0]..=hi(0) {
                        let (ci, cj, ck) = (
                            (i - self.extent[0]) as usize,
                            (j - self.extent[2]) as usize,
                            (k - self.extent[4]) as usize,
                        );
                        cell_ids.push(ci + cdims[0] * (cj + cdims[1] * ck));
                    }
                }
            }
            out.cell_data = self.cell_data.extract(&cell_ids);
        }
        out.field_data = self.field_data.clone();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_count_matches_extent() {
        let image = ImageData::new([-1, 2, 0, 3, 5, 5], [0.0; 3], [0.5, 1.0, 2.0]);
        assert_eq!(image.dimensions(), [4, 4, 1]);
        assert_eq!(image.number_of_points(), 16);
        assert_eq!(image.number_of_cells(), 9);
        assert_eq!(image.cell(0).cell_type, CellType::Pixel);
        assert_eq!(image.point(0), [-0.5, 0.0, 10.0]);
        assert_eq!(image.bounds(), [-0.5, 1.0, 0.0, 3.0, 10.0, 10.0]);
    }

    #[test]
    fn voxel_point_order() {
        let image = ImageData::with_dimensions([2, 2, 2], [0.0; 3], [1.0; 3]);
        let cell = image.cell(0);
        assert_eq!(cell.cell_type, CellType::Voxel);
        assert_eq!(cell.point_ids, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn array3_round_trip_and_crop() {
        let mut image = ImageData::with_dimensions([3, 2, 2], [0.0; 3], [1.0; 3]);
        image.fill_point_scalars("x+10y+100z", |p| p[0] + 10.0 * p[1] + 100.0 * p[2]).unwrap();
        let a = image.scalars_array3().unwrap();
        assert_eq!(a[[2, 1, 1]], 112.0);

        let cropped = image.crop(&[1, 2, 0, 1, 1, 1]).unwrap();
        assert_eq!(cropped.number_of_points(), 4);
        assert_eq!(
            cropped.point_data.scalars().unwrap().values_as_f64(),
            vec![101.0, 102.0, 111.0, 112.0]
        );
    }

    #[test]
    fn world_index_inverse() {
        let mut image = ImageData::with_dimensions([4, 4, 4], [1.0, 2.0, 3.0], [0.5, 0.25, 2.0]);
        image.direction = math::rotation([0.0, 0.0, 1.0], 30.0);
        let p = image.index_to_world([1.5, 2.0, 0.5]);
        let back = image.world_to_index(p);
        assert!(math::distance2(back, [1.5, 2.0, 0.5]) < 1e-20);
    }
}
