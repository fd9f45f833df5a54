//! # Filters
//!
//! Sources and processing nodes. Every type here implements
//! [`Algorithm`](crate::pipeline::Algorithm) and can be added to a
//! [`Pipeline`](crate::pipeline::Pipeline), or run once with
//! [`execute`](crate::pipeline::execute).

mod clean;
mod clip;
mod contour;
mod cookie_cutter;
mod decimate;
mod htg_geometry;
mod implicit;
mod linear_grid;
mod locator;
mod sources;
mod statistics;
mod sum_tables;
mod surface_nets;
mod voronoi;

pub use clean::{StaticCleanPolyData, StaticCleanUnstructuredGrid};
pub use clip::{ClipDataSet, ClipSide};
pub use contour::{ContourFilter, Cutter};
pub use cookie_cutter::{CookieCutter, PointInterpolation};
pub use decimate::{BinnedDecimation, PointGeneration};
pub use htg_geometry::HyperTreeGridGeometry;
pub use implicit::{ImplicitFunction, Plane, Quadric, Sphere};
pub use linear_grid::{Contour3DLinearGrid, LinearGridPlaneCutter};
pub use locator::{PointLocator, StaticPointLocator};
pub use sources::{CellTypeSource, ImageField, ImageSource, PlaneSource, PointDistribution, PointSource, SphereSource};
pub use statistics::{ColumnHistogram, HistogramModel, VisualStatistics};
pub use sum_tables::{promoted_type, SumTables};
pub use surface_nets::{SurfaceNets2D, SurfaceNets3D, SurfaceNetsOutput};
pub use voronoi::{GeneratingScalars, Voronoi2D, VoronoiOutput};

use crate::array::DataArray;
use crate::data::{Cell, CellType, DataObject, DataSetAttributes};
use crate::math::Vec3;
use crate::{Error, Result};

use std::sync::Arc;

/// The named point array, or the active point scalars.
pub(crate) fn point_scalars(data: &DataObject, name: Option<&str>) -> Result<Arc<DataArray>> {
    let attributes = data
        .point_data()
        .ok_or_else(|| Error::pipeline(format!("{} has no point data", data.type_name())))?;
    let array = match name {
        Some(name) => attributes.get_shared(name),
        None => attributes
            .active_name(crate::data::AttributeRole::Scalars)
            .and_then(|n| attributes.get_shared(n)),
    };
    array.ok_or_else(|| match name {
        Some(name) => Error::pipeline(format!("no point array `{name}`")),
        None => Error::pipeline("no point scalars"),
    })
}

/// Decomposition of a linear cell into simplices of its own dimension.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Simplices {
    Tetras(Vec<[usize; 4]>),
    Triangles(Vec<[usize; 3]>),
    Unsupported,
}

const VOXEL_TETS: [[usize; 4]; 6] = [[0, 1, 3, 7], [0, 1, 5, 7], [0, 2, 3, 7], [0, 2, 6, 7], [0, 4, 5, 7], [0, 4, 6, 7]];
const HEX_TETS: [[usize; 4]; 6] = [[0, 1, 2, 6], [0, 1, 5, 6], [0, 3, 2, 6], [0, 3, 7, 6], [0, 4, 5, 6], [0, 4, 7, 6]];
const WEDGE_TETS: [[usize; 4]; 3] = [[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5]];
const PYRAMID_TETS: [[usize; 4]; 2] = [[0, 1, 2, 4], [0, 2, 3, 4]];

/// Split a cell into tetrahedra (3D) or triangles (2D), in global point ids.
pub(crate) fn simplices(cell: &Cell) -> Simplices {
    let p = &cell.point_ids;
    let tets = |table: &[[usize; 4]]| Simplices::Tetras(table.iter().map(|t| t.map(|i| p[i])).collect());
    match cell.cell_type {
        CellType::Tetra => tets(&[[0, 1, 2, 3]]),
        CellType::Voxel => tets(&VOXEL_TETS),
        CellType::Hexahedron => tets(&HEX_TETS),
        CellType::Wedge => tets(&WEDGE_TETS),
        CellType::Pyramid => tets(&PYRAMID_TETS),
        CellType::Triangle => Simplices::Triangles(vec![[p[0], p[1], p[2]]]),
        CellType::Pixel => Simplices::Triangles(vec![[p[0], p[1], p[3]], [p[0], p[3], p[2]]]),
        CellType::Quad | CellType::Polygon => {
            Simplices::Triangles((1..p.len().saturating_sub(1)).map(|i| [p[0], p[i], p[i + 1]]).collect())
        }
        CellType::TriangleStrip => Simplices::Triangles(
            (0..p.len().saturating_sub(2))
                .map(|i| if i % 2 == 0 { [p[i], p[i + 1], p[i + 2]] } else { [p[i + 1], p[i], p[i + 2]] })
                .collect(),
        ),
        _ => Simplices::Unsupported,
    }
}

/// Output points with point data copied or interpolated from an input.
pub(crate) struct PointBuilder<'a> {
    source: &'a DataSetAttributes,
    pub points: Vec<Vec3>,
    pub point_data: DataSetAttributes,
}

impl<'a> PointBuilder<'a> {
    pub fn new(source: &'a DataSetAttributes) -> Self {
        Self {
            source,
            points: Vec::new(),
            point_data: source.new_like(),
        }
    }

    pub fn copy(&mut self, x: Vec3, id: usize) -> usize {
        self.points.push(x);
        self.point_data.append_from(self.source, id);
        self.points.len() - 1
    }

    pub fn interpolate(&mut self, x: Vec3, ids: &[usize], weights: &[f64]) -> usize {
        self.points.push(x);
        self.point_data.append_interpolated(self.source, ids, weights);
        self.points.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexahedron_split_covers_volume() {
        let hex = Cell::new(CellType::Hexahedron, (0..8).collect());
        let corners = crate::cell::shape::parametric_coords(CellType::Hexahedron);
        let Simplices::Tetras(tets) = simplices(&hex) else { panic!("not split") };
        let volume: f64 = tets
            .iter()
            .map(|t| {
                let [a, b, c, d] = t.map(|i| corners[i]);
                let m = [
                    crate::math::sub(b, a),
                    crate::math::sub(c, a),
                    crate::math::sub(d, a),
                ];
                crate::math::determinant3(&m).abs() / 6.0
            })
            .sum();
        assert!((volume - 1.0).abs() < 1e-12);
    }

    #[test]
    fn voxel_split_covers_volume() {
        let voxel = Cell::new(CellType::Voxel, (0..8).collect());
        let corners = crate::cell::shape::parametric_coords(CellType::Voxel);
        let Simplices::Tetras(tets) = simplices(&voxel) else { panic!("not split") };
        let volume: f64 = tets
            .iter()
            .map(|t| {
                let [a, b, c, d] = t.map(|i| corners[i]);
                let m = [
                    crate::math::sub(b, a),
                    crate::math::sub(c, a),
                    crate::math::sub(d, a),
                ];
                crate::math::determinant3(&m).abs() / 6.0
            })
            .sum();
        assert!((volume - 1.0).abs() < 1e-12);
    }
}
