//! # Datasets
//!
//! Every dataset variant lives in [`DataObject`], a sum type dispatched by `match`.
//! Datasets own their points and attribute arrays through shared handles, so a source's
//! output and a filter's output can reference the same array without copying.

mod attributes;
mod cell_array;
mod cell_grid;
mod cell_type;
mod hyper_tree_grid;
mod image;
mod multiblock;
mod points;
mod poly_data;
mod structured;
mod table;
mod unstructured;

pub use attributes::{AttributeRole, DataSetAttributes, FieldData, FromFieldData, ToFieldData};
pub use cell_array::CellArray;
pub use cell_grid::{CellAttribute, CellGrid, CellGroup, FunctionSpace};
pub use cell_type::CellType;
pub use hyper_tree_grid::{HyperTree, HyperTreeCursor, HyperTreeGrid};
pub use image::{extent_dimensions, extent_is_empty, intersect_extents, Extent, ImageData};
pub use multiblock::{Block, MultiBlock};
pub use points::Points;
pub use poly_data::{PolyCellKind, PolyData};
pub use structured::{RectilinearGrid, StructuredGrid};
pub use table::Table;
pub use unstructured::UnstructuredGrid;

use crate::math::{self, Bounds, Vec3};

use derive_more::From;

/// A cell: its type and the ids of its points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub cell_type: CellType,
    pub point_ids: Vec<usize>,
}

impl Cell {
    pub fn new(cell_type: CellType, point_ids: Vec<usize>) -> Self {
        Self { cell_type, point_ids }
    }

    /// Turn axis-aligned voxel/pixel ordering into hexahedron/quad ordering.
    pub fn to_non_axis_aligned(&mut self) {
        match self.cell_type {
            CellType::Voxel => {
                let p = &self.point_ids;
                let ids = vec![p[0], p[1], p[3], p[2], p[4], p[5], p[7], p[6]];
                self.point_ids = ids;
                self.cell_type = CellType::Hexahedron;
            }
            CellType::Pixel => {
                let p = &self.point_ids;
                let ids = vec![p[0], p[1], p[3], p[2]];
                self.point_ids = ids;
                self.cell_type = CellType::Quad;
            }
            _ => {}
        }
    }
}

/// Where an array lives on a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Association {
    Points,
    Cells,
    Field,
}

/// Coarse kind of a data object, used to type pipeline ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// accepts anything
    Any,
    /// any variant with points and cells
    DataSet,
    Image,
    Rectilinear,
    Structured,
    PolyData,
    Unstructured,
    Table,
    MultiBlock,
    CellGrid,
    HyperTreeGrid,
}

impl DataKind {
    /// whether data of kind `other` can feed a port expecting `self`
    pub fn accepts(&self, other: DataKind) -> bool {
        match self {
            Self::Any => true,
            Self::DataSet => matches!(
                other,
                Self::Image | Self::Rectilinear | Self::Structured | Self::PolyData | Self::Unstructured
            ),
            kind => *kind == other,
        }
    }
}

/// Every dataset variant.
#[derive(Debug, Clone, PartialEq, From)]
pub enum DataObject {
    Image(ImageData),
    Rectilinear(RectilinearGrid),
    Structured(StructuredGrid),
    PolyData(PolyData),
    Unstructured(UnstructuredGrid),
    Table(Table),
    MultiBlock(MultiBlock),
    CellGrid(CellGrid),
    HyperTreeGrid(HyperTreeGrid),
}

impl DataObject {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Image(_) => DataKind::Image,
            Self::Rectilinear(_) => DataKind::Rectilinear,
            Self::Structured(_) => DataKind::Structured,
            Self::PolyData(_) => DataKind::PolyData,
            Self::Unstructured(_) => DataKind::Unstructured,
            Self::Table(_) => DataKind::Table,
            Self::MultiBlock(_) => DataKind::MultiBlock,
            Self::CellGrid(_) => DataKind::CellGrid,
            Self::HyperTreeGrid(_) => DataKind::HyperTreeGrid,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Image(_) => "ImageData",
            Self::Rectilinear(_) => "RectilinearGrid",
            Self::Structured(_) => "StructuredGrid",
            Self::PolyData(_) => "PolyData",
            Self::Unstructured(_) => "UnstructuredGrid",
            Self::Table(_) => "Table",
            Self::MultiBlock(_) => "MultiBlock",
            Self::CellGrid(_) => "CellGrid",
            Self::HyperTreeGrid(_) => "HyperTreeGrid",
        }
    }

    pub fn number_of_points(&self) -> usize {
        match self {
            Self::Image(d) => d.number_of_points(),
            Self::Rectilinear(d) => d.number_of_points(),
            Self::Structured(d) => d.number_of_points(),
            Self::PolyData(d) => d.number_of_points(),
            Self::Unstructured(d) => d.number_of_points(),
            Self::Table(_) => 0,
            Self::MultiBlock(d) => d.number_of_points(),
            Self::CellGrid(d) => d.number_of_points(),
            Self::HyperTreeGrid(_) => 0,
        }
    }

    pub fn number_of_cells(&self) -> usize {
        match self {
            Self::Image(d) => d.number_of_cells(),
            Self::Rectilinear(d) => d.number_of_cells(),
            Self::Structured(d) => d.number_of_cells(),
            Self::PolyData(d) => d.number_of_cells(),
            Self::Unstructured(d) => d.number_of_cells(),
            Self::Table(_) => 0,
            Self::MultiBlock(d) => d.number_of_cells(),
            Self::CellGrid(d) => d.number_of_cells(),
            Self::HyperTreeGrid(d) => d.number_of_leaves(),
        }
    }

    /// Point coordinates of a point-based dataset.
    pub fn point(&self, id: usize) -> Option<Vec3> {
        if id >= self.number_of_points() {
            return None;
        }
        match self {
            Self::Image(d) => Some(d.point(id)),
            Self::Rectilinear(d) => Some(d.point(id)),
            Self::Structured(d) => Some(d.point(id)),
            Self::PolyData(d) => Some(d.point(id)),
            Self::Unstructured(d) => Some(d.point(id)),
            Self::CellGrid(d) => Some(d.points.get(id)),
            _ => None,
        }
    }

    /// all point coordinates, empty for non point-based data
    pub fn points(&self) -> Vec<Vec3> {
        (0..self.number_of_points()).filter_map(|i| self.point(i)).collect()
    }

    pub fn cell(&self, id: usize) -> Option<Cell> {
        if id >= self.number_of_cells() {
            return None;
        }
        match self {
            Self::Image(d) => Some(d.cell(id)),
            Self::Rectilinear(d) => Some(d.cell(id)),
            Self::Structured(d) => Some(d.cell(id)),
            Self::PolyData(d) => d.cell(id),
            Self::Unstructured(d) => Some(d.cell(id)),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Image(d) => d.bounds(),
            Self::Rectilinear(d) => d.bounds(),
            Self::Structured(d) => d.bounds(),
            Self::PolyData(d) => d.bounds(),
            Self::Unstructured(d) => d.bounds(),
            Self::Table(_) => math::empty_bounds(),
            Self::MultiBlock(d) => d.bounds(),
            Self::CellGrid(d) => d.bounds(),
            Self::HyperTreeGrid(d) => d.bounds(),
        }
    }

    pub fn point_data(&self) -> Option<&DataSetAttributes> {
        match self {
            Self::Image(d) => Some(&d.point_data),
            Self::Rectilinear(d) => Some(&d.point_data),
            Self::Structured(d) => Some(&d.point_data),
            Self::PolyData(d) => Some(&d.point_data),
            Self::Unstructured(d) => Some(&d.point_data),
            _ => None,
        }
    }

    pub fn point_data_mut(&mut self) -> Option<&mut DataSetAttributes> {
        match self {
            Self::Image(d) => Some(&mut d.point_data),
            Self::Rectilinear(d) => Some(&mut d.point_data),
            Self::Structured(d) => Some(&mut d.point_data),
            Self::PolyData(d) => Some(&mut d.point_data),
            Self::Unstructured(d) => Some(&mut d.point_data),
            _ => None,
        }
    }

    pub fn cell_data(&self) -> Option<&DataSetAttributes> {
        match self {
            Self::Image(d) => Some(&d.cell_data),
            Self::Rectilinear(d) => Some(&d.cell_data),
            Self::Structured(d) => Some(&d.cell_data),
            Self::PolyData(d) => Some(&d.cell_data),
            Self::Unstructured(d) => Some(&d.cell_data),
            Self::HyperTreeGrid(d) => Some(&d.cell_data),
            _ => None,
        }
    }

    pub fn cell_data_mut(&mut self) -> Option<&mut DataSetAttributes> {
        match self {
            Self::Image(d) => Some(&mut d.cell_data),
            Self::Rectilinear(d) => Some(&mut d.cell_data),
            Self::Structured(d) => Some(&mut d.cell_data),
            Self::PolyData(d) => Some(&mut d.cell_data),
            Self::Unstructured(d) => Some(&mut d.cell_data),
            Self::HyperTreeGrid(d) => Some(&mut d.cell_data),
            _ => None,
        }
    }

    pub fn field_data(&self) -> Option<&FieldData> {
        match self {
            Self::Image(d) => Some(&d.field_data),
            Self::Rectilinear(d) => Some(&d.field_data),
            Self::Structured(d) => Some(&d.field_data),
            Self::PolyData(d) => Some(&d.field_data),
            Self::Unstructured(d) => Some(&d.field_data),
            Self::Table(d) => Some(d.columns()),
            Self::MultiBlock(d) => Some(&d.field_data),
            Self::CellGrid(d) => Some(&d.field_data),
            Self::HyperTreeGrid(_) => None,
        }
    }

    pub fn field_data_mut(&mut self) -> Option<&mut FieldData> {
        match self {
            Self::Image(d) => Some(&mut d.field_data),
            Self::Rectilinear(d) => Some(&mut d.field_data),
            Self::Structured(d) => Some(&mut d.field_data),
            Self::PolyData(d) => Some(&mut d.field_data),
            Self::Unstructured(d) => Some(&mut d.field_data),
            Self::MultiBlock(d) => Some(&mut d.field_data),
            Self::CellGrid(d) => Some(&mut d.field_data),
            _ => None,
        }
    }

    /// Attributes for an association (`Field` is not a [`DataSetAttributes`]).
    pub fn attributes(&self, association: Association) -> Option<&DataSetAttributes> {
        match association {
            Association::Points => self.point_data(),
            Association::Cells => self.cell_data(),
            Association::Field => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageData> {
        match self {
            Self::Image(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_poly_data(&self) -> Option<&PolyData> {
        match self {
            Self::PolyData(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_unstructured(&self) -> Option<&UnstructuredGrid> {
        match self {
            Self::Unstructured(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_multiblock(&self) -> Option<&MultiBlock> {
        match self {
            Self::MultiBlock(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_cell_grid(&self) -> Option<&CellGrid> {
        match self {
            Self::CellGrid(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_hyper_tree_grid(&self) -> Option<&HyperTreeGrid> {
        match self {
            Self::HyperTreeGrid(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_rectilinear(&self) -> Option<&RectilinearGrid> {
        match self {
            Self::Rectilinear(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredGrid> {
        match self {
            Self::Structured(d) => Some(d),
            _ => None,
        }
    }

    /// Check that every cell references existing points.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::PolyData(d) => d.validate(),
            Self::Unstructured(d) => d.validate(),
            Self::MultiBlock(d) => {
                for (_, leaf) in d.leaves() {
                    leaf.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
