//! Clip any dataset with an implicit function or a point scalar array.

use super::implicit::ImplicitFunction;
use super::{point_scalars, simplices, PointBuilder, Simplices};
use crate::data::{CellType, DataKind, DataObject, DataSetAttributes, Points, UnstructuredGrid};
use crate::math;
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, CellStreaming, ExecutionContext, Information, UpdateRequest};
use crate::utils::impl_observable;
use crate::Result;

use std::collections::HashMap;
use std::sync::Arc;

/// Which side of the clip value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipSide {
    /// `F(x) <= value`
    #[default]
    Inside,
    /// `F(x) > value`
    Outside,
}

/// Keeps the part of every cell on one side of `F(x) = value`. Cells entirely kept
/// pass through, cut cells become tetrahedra (3D), triangles (2D) or segments.
#[derive(Debug)]
pub struct ClipDataSet {
    object: Object,
    function: Option<Arc<dyn ImplicitFunction>>,
    array: Option<String>,
    value: f64,
    side: ClipSide,
    streaming: CellStreaming,
}

impl_observable!(ClipDataSet);

impl Default for ClipDataSet {
    fn default() -> Self {
        Self {
            object: Object::new(),
            function: None,
            array: None,
            value: 0.0,
            side: ClipSide::Inside,
            streaming: CellStreaming::new(),
        }
    }
}

struct Clipper<'a> {
    data: &'a DataObject,
    values: &'a [f64],
    value: f64,
    side: ClipSide,
    builder: PointBuilder<'a>,
    kept: HashMap<usize, usize>,
    edges: HashMap<(usize, usize), usize>,
    out: UnstructuredGrid,
    cell_ids: Vec<usize>,
}

impl<'a> Clipper<'a> {
    fn keeps(&self, id: usize) -> bool {
        match self.side {
            ClipSide::Inside => self.values[id] <= self.value,
            ClipSide::Outside => self.values[id] > self.value,
        }
    }

    fn point(&mut self, id: usize) -> usize {
        if let Some(&new) = self.kept.get(&id) {
            return new;
        }
        let x = self.data.point(id).unwrap_or_default();
        let new = self.builder.copy(x, id);
        self.kept.insert(id, new);
        new
    }

    /// Point where the clip surface crosses edge `(a, b)`.
    fn edge(&mut self, a: usize, b: usize) -> usize {
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        if let Some(&new) = self.edges.get(&(a, b)) {
            return new;
        }
        let (fa, fb) = (self.values[a], self.values[b]);
        let t = if fa == fb { 0.5 } else { ((self.value - fa) / (fb - fa)).clamp(0.0, 1.0) };
        let pa = self.data.point(a).unwrap_or_default();
        let pb = self.data.point(b).unwrap_or_default();
        let new = self.builder.interpolate(math::lerp(pa, pb, t), &[a, b], &[1.0 - t, t]);
        self.edges.insert((a, b), new);
        new
    }

    fn emit(&mut self, cell_type: CellType, ids: &[usize], cell_id: usize) -> Result<()> {
        self.out.insert_next_cell(cell_type, ids)?;
        self.cell_ids.push(cell_id);
        Ok(())
    }

    fn split<const N: usize>(&self, ids: [usize; N]) -> (Vec<usize>, Vec<usize>) {
        ids.into_iter().partition(|&id| self.keeps(id))
    }

    fn clip_cell(&mut self, cell_id: usize) -> Result<()> {
        let Some(cell) = self.data.cell(cell_id) else { return Ok(()) };
        let kept = cell.point_ids.iter().filter(|&&id| self.keeps(id)).count();
        if kept == 0 {
            return Ok(());
        }
        if kept == cell.point_ids.len() {
            let ids: Vec<usize> = cell.point_ids.iter().map(|&id| self.point(id)).collect();
            return self.emit(cell.cell_type, &ids, cell_id);
        }
        match cell.cell_type {
            CellType::Vertex | CellType::PolyVertex => {
                for &id in &cell.point_ids {
                    if self.keeps(id) {
                        let p = self.point(id);
                        self.emit(CellType::Vertex, &[p], cell_id)?;
                    }
                }
                return Ok(());
            }
            CellType::Line | CellType::PolyLine => {
                for pair in cell.point_ids.windows(2) {
                    self.clip_segment([pair[0], pair[1]], cell_id)?;
                }
                return Ok(());
            }
            _ => {}
        }
        match simplices(&cell) {
            Simplices::Tetras(tets) => {
                for tet in tets {
                    self.clip_tet(tet, cell_id)?;
                }
            }
            Simplices::Triangles(tris) => {
                for tri in tris {
                    self.clip_triangle(tri, cell_id)?;
                }
            }
            Simplices::Unsupported => {
                tracing::warn!(cell = cell_id, cell_type = ?cell.cell_type, "cannot clip cell");
            }
        }
        Ok(())
    }

    fn clip_segment(&mut self, seg: [usize; 2], cell_id: usize) -> Result<()> {
        let (inn, out) = self.split(seg);
        match (inn.len(), out.len()) {
            (2, 0) => {
                let ids = [self.point(seg[0]), self.point(seg[1])];
                self.emit(CellType::Line, &ids, cell_id)
            }
            (1, 1) => {
                let a = self.point(inn[0]);
                let e = self.edge(inn[0], out[0]);
                let ids = if inn[0] == seg[0] { [a, e] } else { [e, a] };
                self.emit(CellType::Line, &ids, cell_id)
            }
            _ => Ok(()),
        }
    }

    fn clip_triangle(&mut self, tri: [usize; 3], cell_id: usize) -> Result<()> {
        let (inn, out) = self.split(tri);
        match inn.len() {
            3 => {
                let ids = tri.map(|id| self.point(id));
                self.emit(CellType::Triangle, &ids, cell_id)
            }
            1 => {
                let a = self.point(inn[0]);
                let (e0, e1) = (self.edge(inn[0], out[0]), self.edge(inn[0], out[1]));
                self.emit(CellType::Triangle, &[a, e0, e1], cell_id)
            }
            2 => {
                let (a0, a1) = (self.point(inn[0]), self.point(inn[1]));
                let (e0, e1) = (self.edge(inn[0], out[0]), self.edge(inn[1], out[0]));
                self.emit(CellType::Triangle, &[a0, a1, e1], cell_id)?;
                self.emit(CellType::Triangle, &[a0, e1, e0], cell_id)
            }
            _ => Ok(()),
        }
    }

    /// Three tetrahedra filling the prism between triangles `a` and `b`.
    fn prism(&mut self, a: [usize; 3], b: [usize; 3], cell_id: usize) -> Result<()> {
        for tet in [[a[0], a[1], a[2], b[0]], [a[1], a[2], b[0], b[1]], [a[2], b[0], b[1], b[2]]] {
            self.emit(CellType::Tetra, &tet, cell_id)?;
        }
        Ok(())
    }

    fn clip_tet(&mut self, tet: [usize; 4], cell_id: usize) -> Result<()> {
        let (inn, out) = self.split(tet);
        match inn.len() {
            4 => {
                let ids = tet.map(|id| self.point(id));
                self.emit(CellType::Tetra, &ids, cell_id)
            }
            1 => {
                let a = self.point(inn[0]);
                let e: Vec<usize> = out.iter().map(|&o| self.edge(inn[0], o)).collect();
                self.emit(CellType::Tetra, &[a, e[0], e[1], e[2]], cell_id)
            }
            2 => {
                let a = [self.point(inn[0]), self.edge(inn[0], out[0]), self.edge(inn[0], out[1])];
                let b = [self.point(inn[1]), self.edge(inn[1], out[0]), self.edge(inn[1], out[1])];
                self.prism(a, b, cell_id)
            }
            3 => {
                let a = [self.point(inn[0]), self.point(inn[1]), self.point(inn[2])];
                let b = [self.edge(inn[0], out[0]), self.edge(inn[1], out[0]), self.edge(inn[2], out[0])];
                self.prism(a, b, cell_id)
            }
            _ => Ok(()),
        }
    }
}

impl ClipDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip with `F(x)` instead of point scalars.
    pub fn with_function(function: impl ImplicitFunction + 'static) -> Self {
        Self {
            function: Some(Arc::new(function)),
            ..Self::default()
        }
    }

    pub fn set_function(&mut self, function: Option<Arc<dyn ImplicitFunction>>) {
        self.function = function;
        self.modified();
    }

    /// Point array clipped when no function is set; `None` uses the active scalars.
    pub fn set_input_array(&mut self, name: Option<&str>) {
        self.array = name.map(str::to_string);
        self.modified();
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.modified();
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_side(&mut self, side: ClipSide) {
        self.side = side;
        self.modified();
    }

    pub fn clip(&self, data: &DataObject) -> Result<UnstructuredGrid> {
        let values: Vec<f64> = match &self.function {
            Some(f) => (0..data.number_of_points())
                .map(|i| data.point(i).map_or(0.0, |p| f.evaluate(p)))
                .collect(),
            None => {
                let scalars = point_scalars(data, self.array.as_deref())?;
                (0..scalars.number_of_tuples()).map(|t| scalars.component(t, 0)).collect()
            }
        };
        let empty = DataSetAttributes::new();
        let source = data.point_data().unwrap_or(&empty);
        let mut clipper = Clipper {
            data,
            values: &values,
            value: self.value,
            side: self.side,
            builder: PointBuilder::new(source),
            kept: HashMap::new(),
            edges: HashMap::new(),
            out: UnstructuredGrid::new(),
            cell_ids: Vec::new(),
        };
        for cell_id in 0..data.number_of_cells() {
            clipper.clip_cell(cell_id)?;
        }
        let Clipper {
            builder,
            mut out,
            cell_ids,
            ..
        } = clipper;
        out.points = Points::from_vec(builder.points);
        out.point_data = builder.point_data;
        if let Some(cell_data) = data.cell_data() {
            out.cell_data = cell_data.extract(&cell_ids);
        }
        Ok(out)
    }
}

impl Algorithm for ClipDataSet {
    fn name(&self) -> &'static str {
        "ClipDataSet"
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::Unstructured);
        outputs[0].can_stream = true;
        Ok(())
    }

    fn request_update_extent(&mut self, request: &UpdateRequest, inputs: &[Vec<Information>]) -> Vec<Vec<UpdateRequest>> {
        self.streaming.request_update_extent(request, inputs)
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = match self.streaming.cut(ctx.input(0)?)? {
            Some(input) => {
                let out = self.clip(&input)?;
                tracing::debug!(cells_in = input.number_of_cells(), cells_out = out.number_of_cells(), "clipped");
                out
            }
            None => UnstructuredGrid::new(),
        };
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DataArray;
    use crate::data::ImageData;
    use crate::filters::implicit::Plane;

    fn volume(grid: &UnstructuredGrid) -> f64 {
        (0..grid.number_of_cells())
            .map(|c| {
                let Simplices::Tetras(tets) = simplices(&grid.cell(c)) else { return 0.0 };
                tets.iter()
                    .map(|t| {
                        let [a, b, c, d] = t.map(|i| grid.point(i));
                        math::determinant3(&[math::sub(b, a), math::sub(c, a), math::sub(d, a)]).abs() / 6.0
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    fn cube() -> DataObject {
        let mut image = ImageData::with_dimensions([3, 3, 3], [0.0; 3], [1.0; 3]);
        image.fill_point_scalars("z", |p| p[2]).unwrap();
        let ids: Vec<i32> = (0..8).collect();
        image.cell_data.add_array(DataArray::scalars("cell", ids));
        image.into()
    }

    #[test]
    fn plane_clip_keeps_volume_below() {
        let data = cube();
        let clip = ClipDataSet::with_function(Plane::new([0.0, 0.0, 0.25], [0.0, 0.0, 1.0]));
        let below = clip.clip(&data).unwrap();
        below.validate().unwrap();
        assert!((volume(&below) - 1.0).abs() < 1e-9);
        assert!(below.points.iter().all(|p| p[2] <= 0.25 + 1e-12));
        // only the bottom layer of cells contributes
        let cell = below.cell_data.get("cell").unwrap();
        assert!(cell.values_as_f64().iter().all(|&c| c < 4.0));
    }

    #[test]
    fn sides_are_complementary() {
        let data = cube();
        let mut clip = ClipDataSet::new();
        clip.set_value(1.3);
        let inside = clip.clip(&data).unwrap();
        clip.set_side(ClipSide::Outside);
        let outside = clip.clip(&data).unwrap();
        assert!((volume(&inside) + volume(&outside) - 8.0).abs() < 1e-9);
        assert!((volume(&outside) - 0.7 * 4.0).abs() < 1e-9);
        let z = outside.point_data.get("z").unwrap();
        for (i, p) in outside.points.iter().enumerate() {
            assert!((z.component(i, 0) - p[2]).abs() < 1e-12);
        }
    }

    #[test]
    fn whole_cells_pass_through() {
        let data = cube();
        let mut clip = ClipDataSet::new();
        clip.set_value(10.0);
        let all = clip.clip(&data).unwrap();
        assert_eq!(all.number_of_cells(), 8);
        assert_eq!(all.number_of_points(), 27);
        assert!(all.cell_types.iter().all(|&t| t == CellType::Voxel));
    }
}
