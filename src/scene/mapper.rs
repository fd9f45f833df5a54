//! Binding of a data object to colored rendering geometry.

use super::lookup_table::{LookupTable, VectorMode};
use crate::array::{DataArray, ScalarType};
use crate::data::{AttributeRole, Association, Cell, CellType, DataObject};
use crate::math::{Bounds, Vec3};
use crate::object::{Object, Observable};
use crate::utils::impl_observable;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Which attribute array colors the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarMode {
    /// point scalars, else cell scalars
    #[default]
    Default,
    UsePointData,
    UseCellData,
    /// the selected array of the point data
    UsePointFieldData,
    /// the selected array of the cell data
    UseCellFieldData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// unsigned char arrays with 3 or 4 components are used as colors directly
    #[default]
    Default,
    MapScalars,
    DirectScalars,
}

/// Display overrides of one block of a composite input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockAttributes {
    pub visibility: Option<bool>,
    pub color: Option<Vec3>,
    pub opacity: Option<f64>,
}

/// Colors produced by [`Mapper::map_scalars`].
#[derive(Debug, Clone, PartialEq)]
pub struct MappedColors {
    pub association: Association,
    pub colors: Vec<[u8; 4]>,
}

#[derive(Debug, Clone)]
pub struct Mapper {
    object: Object,
    input: Option<Arc<DataObject>>,
    scalar_visibility: bool,
    scalar_range: [f64; 2],
    use_lookup_table_scalar_range: bool,
    lookup_table: LookupTable,
    scalar_mode: ScalarMode,
    color_mode: ColorMode,
    array_name: Option<String>,
    array_component: Option<usize>,
    blocks: BTreeMap<usize, BlockAttributes>,
}

impl_observable!(Mapper);

impl Default for Mapper {
    fn default() -> Self {
        Self {
            object: Object::new(),
            input: None,
            scalar_visibility: true,
            scalar_range: [0.0, 1.0],
            use_lookup_table_scalar_range: false,
            lookup_table: LookupTable::new(),
            scalar_mode: ScalarMode::Default,
            color_mode: ColorMode::Default,
            array_name: None,
            array_component: None,
            blocks: BTreeMap::new(),
        }
    }
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(data: impl Into<DataObject>) -> Self {
        let mut mapper = Self::new();
        mapper.set_input_data(data);
        mapper
    }

    pub fn set_input_data(&mut self, data: impl Into<DataObject>) {
        self.input = Some(Arc::new(data.into()));
        self.modified();
    }

    /// Use a pipeline output without copying it.
    pub fn set_input_shared(&mut self, data: Arc<DataObject>) {
        self.input = Some(data);
        self.modified();
    }

    pub fn input(&self) -> Option<&DataObject> {
        self.input.as_deref()
    }

    pub(crate) fn shared_input(&self) -> Option<Arc<DataObject>> {
        self.input.clone()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.input.as_ref().map(|d| d.bounds())
    }

    pub fn scalar_visibility(&self) -> bool {
        self.scalar_visibility
    }

    pub fn set_scalar_visibility(&mut self, on: bool) {
        self.scalar_visibility = on;
        self.modified();
    }

    pub fn scalar_range(&self) -> [f64; 2] {
        self.scalar_range
    }

    pub fn set_scalar_range(&mut self, min: f64, max: f64) {
        self.scalar_range = [min, max];
        self.modified();
    }

    /// Keep the lookup table's own range instead of the mapper's scalar range.
    pub fn set_use_lookup_table_scalar_range(&mut self, on: bool) {
        self.use_lookup_table_scalar_range = on;
        self.modified();
    }

    pub fn lookup_table(&self) -> &LookupTable {
        &self.lookup_table
    }

    pub fn lookup_table_mut(&mut self) -> &mut LookupTable {
        &mut self.lookup_table
    }

    pub fn set_lookup_table(&mut self, table: LookupTable) {
        self.lookup_table = table;
        self.modified();
    }

    pub fn scalar_mode(&self) -> ScalarMode {
        self.scalar_mode
    }

    pub fn set_scalar_mode(&mut self, mode: ScalarMode) {
        self.scalar_mode = mode;
        self.modified();
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.color_mode = mode;
        self.modified();
    }

    /// Array used by the field data scalar modes.
    pub fn select_color_array(&mut self, name: &str) {
        self.array_name = Some(name.to_string());
        self.modified();
    }

    /// Component to map; `None` maps the magnitude.
    pub fn set_array_component(&mut self, component: Option<usize>) {
        self.array_component = component;
        self.modified();
    }

    pub fn block_attributes(&self, flat_index: usize) -> Option<&BlockAttributes> {
        self.blocks.get(&flat_index)
    }

    pub fn set_block_visibility(&mut self, flat_index: usize, visible: bool) {
        self.blocks.entry(flat_index).or_default().visibility = Some(visible);
        self.modified();
    }

    pub fn set_block_color(&mut self, flat_index: usize, color: Vec3) {
        self.blocks.entry(flat_index).or_default().color = Some(color);
        self.modified();
    }

    pub fn set_block_opacity(&mut self, flat_index: usize, opacity: f64) {
        self.blocks.entry(flat_index).or_default().opacity = Some(opacity);
        self.modified();
    }

    pub fn remove_block_attributes(&mut self, flat_index: usize) {
        if self.blocks.remove(&flat_index).is_some() {
            self.modified();
        }
    }

    pub fn remove_all_block_attributes(&mut self) {
        self.blocks.clear();
        self.modified();
    }

    /// Array selected by the scalar mode, with where it lives.
    pub fn scalars<'a>(&self, data: &'a DataObject) -> Option<(Association, &'a DataArray)> {
        let point = || data.point_data().and_then(|a| a.attribute(AttributeRole::Scalars));
        let cell = || data.cell_data().and_then(|a| a.attribute(AttributeRole::Scalars));
        let named = |association| {
            let name = self.array_name.as_deref()?;
            data.attributes(association)?.get(name)
        };
        match self.scalar_mode {
            ScalarMode::Default => point()
                .map(|a| (Association::Points, a))
                .or_else(|| cell().map(|a| (Association::Cells, a))),
            ScalarMode::UsePointData => point().map(|a| (Association::Points, a)),
            ScalarMode::UseCellData => cell().map(|a| (Association::Cells, a)),
            ScalarMode::UsePointFieldData => named(Association::Points).map(|a| (Association::Points, a)),
            ScalarMode::UseCellFieldData => named(Association::Cells).map(|a| (Association::Cells, a)),
        }
    }

    /// RGBA per point or per cell of `data`, `None` when scalars are hidden or
    /// missing.
    pub fn map_scalars(&mut self, data: &DataObject) -> Option<MappedColors> {
        if !self.scalar_visibility {
            return None;
        }
        let (association, array) = self.scalars(data)?;
        let components = array.number_of_components();
        let direct = match self.color_mode {
            ColorMode::DirectScalars => true,
            ColorMode::MapScalars => false,
            ColorMode::Default => {
                array.scalar_type() == ScalarType::UnsignedChar && (components == 3 || components == 4)
            }
        };
        let colors = if direct {
            (0..array.number_of_tuples())
                .map(|t| {
                    let mut rgba = [0, 0, 0, 255];
                    for (c, slot) in rgba.iter_mut().enumerate().take(components.min(4)) {
                        *slot = array.component(t, c).clamp(0.0, 255.0) as u8;
                    }
                    if components == 1 {
                        rgba[1] = rgba[0];
                        rgba[2] = rgba[0];
                    }
                    rgba
                })
                .collect()
        } else {
            if !self.use_lookup_table_scalar_range {
                let [min, max] = self.scalar_range;
                self.lookup_table.set_table_range(min, max).ok()?;
            }
            let mode = self.array_component.map_or(VectorMode::Magnitude, VectorMode::Component);
            self.lookup_table.map_scalars(array, mode)
        };
        Some(MappedColors { association, colors })
    }
}

/// The input's leaves with their flat block index (`None` for a non composite
/// input).
pub(crate) fn leaves(data: &DataObject) -> Vec<(Option<usize>, &DataObject)> {
    match data.as_multiblock() {
        Some(mb) => mb.leaves().into_iter().map(|(i, d)| (Some(i), d)).collect(),
        None => vec![(None, data)],
    }
}

/// Drawable pieces of one cell, as local point indices.
#[derive(Debug, Default)]
pub(crate) struct CellPieces {
    pub triangles: Vec<[usize; 3]>,
    pub lines: Vec<[usize; 2]>,
    pub vertices: Vec<usize>,
}

fn fan(ids: &[usize], out: &mut Vec<[usize; 3]>) {
    for i in 1..ids.len().saturating_sub(1) {
        out.push([ids[0], ids[i], ids[i + 1]]);
    }
}

/// Triangles of surface cells and of the boundary faces of volume cells, segments of
/// line cells, and vertices.
pub(crate) fn decompose(cell: &Cell) -> CellPieces {
    let ids = &cell.point_ids;
    let mut pieces = CellPieces::default();
    match cell.cell_type {
        CellType::Vertex | CellType::PolyVertex => pieces.vertices.extend(ids.iter().copied()),
        CellType::Line | CellType::PolyLine => {
            pieces.lines.extend(ids.windows(2).map(|w| [w[0], w[1]]));
        }
        CellType::Triangle | CellType::Quad | CellType::Polygon => fan(ids, &mut pieces.triangles),
        CellType::Pixel if ids.len() == 4 => {
            pieces.triangles.push([ids[0], ids[1], ids[3]]);
            pieces.triangles.push([ids[0], ids[3], ids[2]]);
        }
        CellType::TriangleStrip => {
            for i in 0..ids.len().saturating_sub(2) {
                if i % 2 == 0 {
                    pieces.triangles.push([ids[i], ids[i + 1], ids[i + 2]]);
                } else {
                    pieces.triangles.push([ids[i + 1], ids[i], ids[i + 2]]);
                }
            }
        }
        other => {
            for face in other.faces() {
                let face: Vec<usize> = face.iter().filter_map(|&i| ids.get(i).copied()).collect();
                fan(&face, &mut pieces.triangles);
            }
        }
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MultiBlock, PolyData};

    fn colored_square() -> PolyData {
        let mut square = PolyData::with_points(crate::data::Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]));
        square.polys.insert_next_cell(&[0, 1, 2, 3]);
        square
            .point_data
            .set_scalars(DataArray::scalars("height", vec![0.0f64, 0.5, 1.0, 0.5]))
            .unwrap();
        square
            .cell_data
            .add_array(DataArray::from_tuples("rgb", vec![[10u8, 20, 30]]));
        square
    }

    #[test]
    fn scalar_modes_select_arrays() {
        let data: DataObject = colored_square().into();
        let mut mapper = Mapper::new();
        let (assoc, array) = mapper.scalars(&data).unwrap();
        assert_eq!((assoc, array.name()), (Association::Points, Some("height")));
        mapper.set_scalar_mode(ScalarMode::UseCellData);
        assert!(mapper.scalars(&data).is_none());
        mapper.set_scalar_mode(ScalarMode::UseCellFieldData);
        assert!(mapper.scalars(&data).is_none());
        mapper.select_color_array("rgb");
        let (assoc, _) = mapper.scalars(&data).unwrap();
        assert_eq!(assoc, Association::Cells);
        // unsigned char triples are colors already
        let mapped = mapper.map_scalars(&data).unwrap();
        assert_eq!(mapped.colors, vec![[10, 20, 30, 255]]);
    }

    #[test]
    fn point_scalars_through_lookup_table() {
        let data: DataObject = colored_square().into();
        let mut mapper = Mapper::new();
        let mapped = mapper.map_scalars(&data).unwrap();
        assert_eq!(mapped.association, Association::Points);
        assert_eq!(mapped.colors[0], [255, 0, 0, 255]);
        assert_eq!(mapped.colors[2], [0, 0, 255, 255]);
        mapper.set_scalar_visibility(false);
        assert!(mapper.map_scalars(&data).is_none());
    }

    #[test]
    fn block_attributes_by_flat_index() {
        let mut mb = MultiBlock::new();
        mb.add_block(None, colored_square());
        mb.add_block(None, colored_square());
        let data: DataObject = mb.into();
        let flat: Vec<Option<usize>> = leaves(&data).iter().map(|(i, _)| *i).collect();
        assert_eq!(flat, vec![Some(1), Some(2)]);

        let mut mapper = Mapper::with_input(data);
        mapper.set_block_visibility(2, false);
        mapper.set_block_color(2, [1.0, 0.0, 0.0]);
        assert_eq!(
            mapper.block_attributes(2),
            Some(&BlockAttributes {
                visibility: Some(false),
                color: Some([1.0, 0.0, 0.0]),
                opacity: None
            })
        );
        mapper.remove_block_attributes(2);
        assert!(mapper.block_attributes(2).is_none());
    }

    #[test]
    fn hexahedron_surface_has_twelve_triangles() {
        let hex = Cell::new(CellType::Hexahedron, (0..8).collect());
        assert_eq!(decompose(&hex).triangles.len(), 12);
        let strip = Cell::new(CellType::TriangleStrip, vec![0, 1, 2, 3]);
        assert_eq!(decompose(&strip).triangles, vec![[0, 1, 2], [2, 1, 3]]);
    }
}
