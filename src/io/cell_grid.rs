//! # CellGrid files
//!
//! A `.dg` file is a single JSON document. Every array (points, per-group
//! connectivity, attribute values, field data) is stored once under `"arrays"`
//! with a base64 little-endian payload; the rest of the document refers to arrays by
//! key.
//!
//! ```json
//! {
//!   "data-type": "cell-grid",
//!   "format-version": 1,
//!   "arrays": { "points": { "type": "Float64", "components": 3, "tuples": 4, "data": "..." } },
//!   "points": "points",
//!   "cell-types": [ { "type": 10, "name": "tets", "connectivity": "tets/connectivity" } ],
//!   "attributes": [ { "id": 0, "name": "u", "space": "HGRAD", "components": 1,
//!                     "arrays": { "tets": "u/tets" } } ],
//!   "UnorderedCellAttributeIds": [0]
//! }
//! ```

use crate::array::{DataArray, ScalarType};
use crate::data::{CellGrid, CellType, FunctionSpace, Points};
use crate::io::encode::{from_bytes, to_bytes, ByteOrder};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::path::Path;

const DATA_TYPE: &str = "cell-grid";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    #[serde(rename = "data-type")]
    data_type: String,
    #[serde(rename = "format-version")]
    format_version: u32,
    arrays: BTreeMap<String, ArrayEntry>,
    points: String,
    #[serde(rename = "cell-types")]
    cell_types: Vec<GroupEntry>,
    #[serde(default)]
    attributes: Vec<AttributeEntry>,
    #[serde(rename = "UnorderedCellAttributeIds", default)]
    unordered_cell_attribute_ids: Vec<u64>,
    #[serde(rename = "field-data", default, skip_serializing_if = "Vec::is_empty")]
    field_data: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArrayEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type")]
    scalar_type: String,
    components: usize,
    tuples: usize,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupEntry {
    #[serde(rename = "type")]
    cell_type: u8,
    name: String,
    connectivity: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttributeEntry {
    id: u64,
    name: String,
    space: FunctionSpace,
    components: usize,
    /// cell group name to array key
    arrays: BTreeMap<String, String>,
}

impl ArrayEntry {
    fn encode(array: &DataArray) -> Self {
        let ty = match array.scalar_type() {
            ScalarType::Bit => ScalarType::UnsignedChar,
            ty => ty,
        };
        Self {
            name: array.name().map(str::to_string),
            scalar_type: ty.xml_name().to_string(),
            components: array.number_of_components(),
            tuples: array.number_of_tuples(),
            data: base64::encode(to_bytes(array, ByteOrder::Little)),
        }
    }

    fn decode(&self, key: &str) -> Result<DataArray> {
        let ty = ScalarType::from_xml_name(&self.scalar_type)
            .ok_or_else(|| Error::file_format(format!("array `{key}` has unknown type `{}`", self.scalar_type)))?;
        let bytes = base64::decode(&self.data)?;
        let array = from_bytes(self.name.as_deref().unwrap_or(key), ty, self.components.max(1), &bytes, ByteOrder::Little)?;
        if array.number_of_tuples() != self.tuples {
            return Err(Error::file_format(format!(
                "array `{key}` holds {} tuples, the descriptor says {}",
                array.number_of_tuples(),
                self.tuples
            )));
        }
        Ok(array)
    }
}

/// Serialize `grid` to the JSON text of a `.dg` file.
pub fn to_string(grid: &CellGrid) -> Result<String> {
    let mut arrays = BTreeMap::new();
    arrays.insert("points".to_string(), ArrayEntry::encode(grid.points.data()));

    let mut cell_types = Vec::new();
    for group in grid.cell_groups() {
        let key = format!("{}/connectivity", group.name);
        arrays.insert(key.clone(), ArrayEntry::encode(&group.connectivity));
        cell_types.push(GroupEntry {
            cell_type: group.shape.id(),
            name: group.name.clone(),
            connectivity: key,
        });
    }

    let mut attributes = Vec::new();
    for attribute in grid.attributes() {
        let mut keys = BTreeMap::new();
        for (group, array) in &attribute.arrays {
            let key = format!("{}/{group}", attribute.name);
            arrays.insert(key.clone(), ArrayEntry::encode(array));
            keys.insert(group.clone(), key);
        }
        attributes.push(AttributeEntry {
            id: attribute.id,
            name: attribute.name.clone(),
            space: attribute.space,
            components: attribute.components,
            arrays: keys,
        });
    }

    let mut field_data = Vec::new();
    for (i, array) in grid.field_data.iter().enumerate() {
        let key = format!("field/{i}");
        arrays.insert(key.clone(), ArrayEntry::encode(array));
        field_data.push(key);
    }

    let descriptor = Descriptor {
        data_type: DATA_TYPE.to_string(),
        format_version: FORMAT_VERSION,
        arrays,
        points: "points".to_string(),
        cell_types,
        attributes,
        unordered_cell_attribute_ids: grid.unordered_cell_attribute_ids().to_vec(),
        field_data,
    };
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

/// Parse the JSON text of a `.dg` file.
pub fn from_str(text: &str) -> Result<CellGrid> {
    let descriptor: Descriptor = serde_json::from_str(text)?;
    if descriptor.data_type != DATA_TYPE {
        return Err(Error::file_format(format!(
            "expected data-type `{DATA_TYPE}`, found `{}`",
            descriptor.data_type
        )));
    }
    if descriptor.format_version > FORMAT_VERSION {
        tracing::warn!(version = descriptor.format_version, "newer cell grid format version");
    }
    let array = |key: &str| -> Result<DataArray> {
        descriptor
            .arrays
            .get(key)
            .ok_or_else(|| Error::file_format(format!("reference to missing array `{key}`")))?
            .decode(key)
    };

    let mut grid = CellGrid::new(Points::from_array(array(&descriptor.points)?)?);
    for group in &descriptor.cell_types {
        let shape = CellType::try_from(group.cell_type)?;
        grid.add_cell_group(&group.name, shape, array(&group.connectivity)?)?;
    }

    // declaration order follows UnorderedCellAttributeIds; ids missing from it come last
    let mut order: Vec<&AttributeEntry> = descriptor
        .unordered_cell_attribute_ids
        .iter()
        .filter_map(|id| descriptor.attributes.iter().find(|a| a.id == *id))
        .collect();
    for attribute in &descriptor.attributes {
        if !descriptor.unordered_cell_attribute_ids.contains(&attribute.id) {
            order.push(attribute);
        }
    }
    for attribute in order {
        grid.add_attribute_with_id(attribute.id, &attribute.name, attribute.space, attribute.components);
        for (group, key) in &attribute.arrays {
            grid.set_attribute_array(attribute.id, group, array(key)?)?;
        }
    }

    for key in &descriptor.field_data {
        grid.field_data.add_array(array(key)?);
    }
    Ok(grid)
}

pub fn write(path: impl AsRef<Path>, grid: &CellGrid) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_string(grid)?)?;
    tracing::debug!(path = %path.display(), groups = grid.cell_groups().len(), "wrote cell grid");
    Ok(())
}

pub fn read(path: impl AsRef<Path>) -> Result<CellGrid> {
    let path = path.as_ref();
    let grid = from_str(&std::fs::read_to_string(path)?)?;
    tracing::debug!(path = %path.display(), groups = grid.cell_groups().len(), "read cell grid");
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> CellGrid {
        let points = Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
        ]);
        let mut grid = CellGrid::new(points);
        grid.add_cell_group("tets", CellType::Tetra, DataArray::from_tuples("conn", vec![[0i64, 1, 2, 3]]))
            .unwrap();
        grid.add_cell_group("tris", CellType::Triangle, DataArray::from_tuples("conn", vec![[1i32, 4, 2], [0, 1, 2]]))
            .unwrap();
        let pressure = grid.add_attribute_with_id(7, "pressure", FunctionSpace::HGrad, 1);
        let shape = grid.add_attribute_with_id(2, "shape", FunctionSpace::Constant, 3);
        grid.set_attribute_array(pressure, "tets", DataArray::from_tuples("p", vec![[1.0f64, 2.0, 3.0, 4.0]]))
            .unwrap();
        grid.set_attribute_array(pressure, "tris", DataArray::from_tuples("p", vec![[5.0f64, 6.0, 7.0], [8.0, 9.0, 10.0]]))
            .unwrap();
        grid.set_attribute_array(shape, "tets", DataArray::from_tuples("s", vec![[0.5f32, 0.5, 0.5]]))
            .unwrap();
        grid.field_data.add_array(DataArray::from_tuples("ids", vec![[1u16, 2], [3, 4]]));
        grid
    }

    #[test]
    fn preserves_arrays_and_attribute_order() {
        let grid = two_groups();
        let text = to_string(&grid).unwrap();
        let back = from_str(&text).unwrap();
        assert_eq!(back, grid);
        assert_eq!(back.unordered_cell_attribute_ids(), &[7, 2]);
    }

    #[test]
    fn dangling_array_reference_is_an_error() {
        let text = to_string(&two_groups())
            .unwrap()
            .replace("\"connectivity\": \"tris/connectivity\"", "\"connectivity\": \"nowhere\"");
        assert!(matches!(from_str(&text), Err(Error::FileFormat(_))));
    }

    #[test]
    fn other_documents_are_refused() {
        assert!(from_str(r#"{"data-type": "mesh", "format-version": 1, "arrays": {}, "points": "p", "cell-types": []}"#).is_err());
    }
}
