use super::{CellType, FieldData, Points};
use crate::array::DataArray;
use crate::math::Bounds;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Function space of a cell attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionSpace {
    #[serde(rename = "HGRAD")]
    HGrad,
    #[serde(rename = "HCURL")]
    HCurl,
    #[serde(rename = "HDIV")]
    HDiv,
    #[serde(rename = "constant")]
    Constant,
}

impl fmt::Display for FunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HGrad => "HGRAD",
            Self::HCurl => "HCURL",
            Self::HDiv => "HDIV",
            Self::Constant => "constant",
        };
        f.write_str(s)
    }
}

impl FromStr for FunctionSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HGRAD" => Ok(Self::HGrad),
            "HCURL" => Ok(Self::HCurl),
            "HDIV" => Ok(Self::HDiv),
            "constant" => Ok(Self::Constant),
            other => Err(Error::invalid_argument(format!("unknown function space `{other}`"))),
        }
    }
}

/// All cells of one type: one connectivity tuple (corner point ids) per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGroup {
    pub name: String,
    pub shape: CellType,
    pub connectivity: Arc<DataArray>,
}

impl CellGroup {
    pub fn number_of_cells(&self) -> usize {
        self.connectivity.number_of_tuples()
    }
}

/// A named field defined over every cell group.
#[derive(Debug, Clone, PartialEq)]
pub struct CellAttribute {
    pub id: u64,
    pub name: String,
    pub space: FunctionSpace,
    pub components: usize,
    /// one array per cell group name
    pub arrays: BTreeMap<String, Arc<DataArray>>,
}

/// Discontinuous-Galerkin style collection of cells grouped by type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    pub points: Points,
    groups: Vec<CellGroup>,
    attributes: Vec<CellAttribute>,
    unordered_cell_attribute_ids: Vec<u64>,
    next_attribute_id: u64,
    pub field_data: FieldData,
}

impl CellGrid {
    pub fn new(points: Points) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    pub fn add_cell_group(&mut self, name: &str, shape: CellType, connectivity: impl Into<Arc<DataArray>>) -> Result<()> {
        let connectivity = connectivity.into();
        let corners = shape
            .number_of_points()
            .ok_or_else(|| Error::invalid_argument(format!("{shape:?} has no fixed corner count")))?;
        if connectivity.number_of_components() != corners {
            return Err(Error::invalid_argument(format!(
                "{name}: {shape:?} connectivity needs {corners} components, got {}",
                connectivity.number_of_components()
            )));
        }
        if connectivity.scalar_type().is_float() {
            return Err(Error::invalid_argument(format!("{name}: connectivity must be integer")));
        }
        let hi = connectivity.values_as_f64().into_iter().fold(None, |m: Option<f64>, v| {
            Some(m.map_or(v, |m| m.max(v)))
        });
        if let Some(hi) = hi {
            if hi < 0.0 || hi as usize >= self.points.len() {
                return Err(Error::out_of_bounds(format!(
                    "{name}: connectivity references point {hi} of {}",
                    self.points.len()
                )));
            }
        }
        self.groups.retain(|g| g.name != name);
        self.groups.push(CellGroup {
            name: name.to_string(),
            shape,
            connectivity,
        });
        Ok(())
    }

    pub fn cell_groups(&self) -> &[CellGroup] {
        &self.groups
    }

    pub fn cell_group(&self, name: &str) -> Option<&CellGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Declare an attribute and return its id.
    pub fn add_attribute(&mut self, name: &str, space: FunctionSpace, components: usize) -> u64 {
        self.add_attribute_with_id(self.next_attribute_id, name, space, components)
    }

    /// Declare an attribute with a known id (used by readers).
    pub fn add_attribute_with_id(&mut self, id: u64, name: &str, space: FunctionSpace, components: usize) -> u64 {
        self.attributes.retain(|a| a.id != id);
        self.unordered_cell_attribute_ids.retain(|a| *a != id);
        self.attributes.push(CellAttribute {
            id,
            name: name.to_string(),
            space,
            components,
            arrays: BTreeMap::new(),
        });
        self.unordered_cell_attribute_ids.push(id);
        self.next_attribute_id = self.next_attribute_id.max(id + 1);
        id
    }

    /// Attach the values of attribute `id` for cell group `group`.
    pub fn set_attribute_array(&mut self, id: u64, group: &str, array: impl Into<Arc<DataArray>>) -> Result<()> {
        let array = array.into();
        let cells = self
            .cell_group(group)
            .ok_or_else(|| Error::invalid_argument(format!("no cell group `{group}`")))?
            .number_of_cells();
        if array.number_of_tuples() != cells {
            return Err(Error::invalid_argument(format!(
                "attribute array has {} tuples for {cells} `{group}` cells",
                array.number_of_tuples()
            )));
        }
        let attribute = self
            .attributes
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::invalid_argument(format!("no cell attribute with id {id}")))?;
        if array.number_of_components() % attribute.components.max(1) != 0 {
            return Err(Error::invalid_argument(format!(
                "{} components is not a multiple of the attribute's {}",
                array.number_of_components(),
                attribute.components
            )));
        }
        attribute.arrays.insert(group.to_string(), array);
        Ok(())
    }

    pub fn attributes(&self) -> &[CellAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&CellAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_by_id(&self, id: u64) -> Option<&CellAttribute> {
        self.attributes.iter().find(|a| a.id == id)
    }

    /// attribute ids in the order they were declared
    pub fn unordered_cell_attribute_ids(&self) -> &[u64] {
        &self.unordered_cell_attribute_ids
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.groups.iter().map(CellGroup::number_of_cells).sum()
    }

    pub fn bounds(&self) -> Bounds {
        self.points.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> CellGrid {
        let points = Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ]);
        let mut grid = CellGrid::new(points);
        let conn = DataArray::from_tuples("conn", vec![[0i64, 1, 2, 3], [1, 2, 3, 4]]);
        grid.add_cell_group("vtkDGTet", CellType::Tetra, conn).unwrap();
        grid
    }

    #[test]
    fn attributes_keep_declaration_order() {
        let mut grid = grid();
        let b = grid.add_attribute_with_id(5, "b", FunctionSpace::HGrad, 1);
        let a = grid.add_attribute_with_id(2, "a", FunctionSpace::Constant, 3);
        assert_eq!(grid.unordered_cell_attribute_ids(), &[5, 2]);
        assert_eq!(grid.add_attribute("c", FunctionSpace::HDiv, 1), 6);

        let values = DataArray::from_tuples("b", vec![[0.0f64, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]]);
        grid.set_attribute_array(b, "vtkDGTet", values).unwrap();
        let short = DataArray::from_tuples("a", vec![[0.0f64, 1.0, 2.0]]);
        assert!(grid.set_attribute_array(a, "vtkDGTet", short).is_err());
        assert_eq!(grid.number_of_cells(), 2);
    }

    #[test]
    fn connectivity_is_checked() {
        let mut grid = grid();
        let bad = DataArray::from_tuples("conn", vec![[0i64, 1, 2, 9]]);
        assert!(grid.add_cell_group("x", CellType::Tetra, bad).is_err());
        let wrong_width = DataArray::from_tuples("conn", vec![[0i64, 1, 2]]);
        assert!(grid.add_cell_group("y", CellType::Tetra, wrong_width).is_err());
    }
}
