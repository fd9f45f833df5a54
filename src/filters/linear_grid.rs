//! Threaded contouring and plane cutting of unstructured grids made only of linear
//! 3D cells.

use super::contour::{assemble, contour_cells, generate_values, IsoBatch};
use super::implicit::{ImplicitFunction, Plane};
use super::point_scalars;
use crate::array::DataArray;
use crate::data::{DataKind, DataObject, PolyData, UnstructuredGrid};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::{batches, build_thread_pool, impl_observable};
use crate::{Error, Result};

use rayon::prelude::*;

/// Cells handed to one task.
const BATCH_SIZE: usize = 1000;

fn linear_grid(data: &DataObject) -> Result<&UnstructuredGrid> {
    match data {
        DataObject::Unstructured(grid) if grid.is_linear_3d_only() => Ok(grid),
        DataObject::Unstructured(_) => Err(Error::pipeline("grid holds cells other than linear 3D cells")),
        other => Err(Error::pipeline(format!("expected an unstructured grid, got {}", other.type_name()))),
    }
}

/// Contour every batch on the pool and stitch the results in batch order.
fn run_batches(
    data: &DataObject,
    scalars: &[f64],
    values: &[f64],
    merge: bool,
    threads: Option<usize>,
) -> Result<(PolyData, usize)> {
    let pool = build_thread_pool(threads)?;
    let ranges = batches(data.number_of_cells(), BATCH_SIZE);
    let results: Vec<IsoBatch> = pool.install(|| {
        ranges
            .into_par_iter()
            .map(|range| contour_cells(data, scalars, values, range, merge))
            .collect()
    });
    Ok((assemble(data, results, merge), pool.current_num_threads()))
}

/// Isosurfaces of a linear 3D unstructured grid, computed in parallel.
#[derive(Debug)]
pub struct Contour3DLinearGrid {
    object: Object,
    values: Vec<f64>,
    array: Option<String>,
    merge_points: bool,
    interpolate_attributes: bool,
    number_of_threads: Option<usize>,
    threads_used: usize,
}

impl_observable!(Contour3DLinearGrid);

impl Default for Contour3DLinearGrid {
    fn default() -> Self {
        Self {
            object: Object::new(),
            values: Vec::new(),
            array: None,
            merge_points: false,
            interpolate_attributes: true,
            number_of_threads: None,
            threads_used: 0,
        }
    }
}

impl Contour3DLinearGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn set_values(&mut self, values: &[f64]) {
        self.values = values.to_vec();
        self.modified();
    }

    pub fn generate_values(&mut self, n: usize, range: [f64; 2]) {
        self.values = generate_values(n, range);
        self.modified();
    }

    pub fn set_input_array(&mut self, name: Option<&str>) {
        self.array = name.map(str::to_string);
        self.modified();
    }

    /// Share points between adjacent cells. Off by default: every cell emits its own.
    pub fn set_merge_points(&mut self, on: bool) {
        self.merge_points = on;
        self.modified();
    }

    pub fn set_interpolate_attributes(&mut self, on: bool) {
        self.interpolate_attributes = on;
        self.modified();
    }

    /// Size of the worker pool; `None` uses every core.
    pub fn set_number_of_threads(&mut self, threads: Option<usize>) {
        self.number_of_threads = threads;
        self.modified();
    }

    /// Threads of the pool used by the last execution.
    pub fn number_of_threads_used(&self) -> usize {
        self.threads_used
    }

    pub fn contour(&mut self, data: &DataObject) -> Result<PolyData> {
        linear_grid(data)?;
        let scalars = point_scalars(data, self.array.as_deref())?;
        let values: Vec<f64> = (0..scalars.number_of_tuples()).map(|t| scalars.component(t, 0)).collect();
        let (mut out, threads) = run_batches(data, &values, &self.values, self.merge_points, self.number_of_threads)?;
        self.threads_used = threads;
        if !self.interpolate_attributes {
            out.point_data = Default::default();
            out.cell_data = Default::default();
        }
        Ok(out)
    }
}

impl Algorithm for Contour3DLinearGrid {
    fn name(&self) -> &'static str {
        "Contour3DLinearGrid"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::Unstructured
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.contour(ctx.input(0)?)?;
        tracing::debug!(threads = self.threads_used, points = out.number_of_points(), "contoured linear grid");
        ctx.set_output(0, out)
    }
}

/// Cut a linear 3D unstructured grid with a plane, in parallel.
#[derive(Debug)]
pub struct LinearGridPlaneCutter {
    object: Object,
    plane: Plane,
    merge_points: bool,
    interpolate_attributes: bool,
    compute_normals: bool,
    number_of_threads: Option<usize>,
    threads_used: usize,
}

impl_observable!(LinearGridPlaneCutter);

impl LinearGridPlaneCutter {
    pub fn new(plane: Plane) -> Self {
        Self {
            object: Object::new(),
            plane,
            merge_points: true,
            interpolate_attributes: true,
            compute_normals: false,
            number_of_threads: None,
            threads_used: 0,
        }
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn set_plane(&mut self, plane: Plane) {
        self.plane = plane;
        self.modified();
    }

    pub fn set_merge_points(&mut self, on: bool) {
        self.merge_points = on;
        self.modified();
    }

    pub fn set_interpolate_attributes(&mut self, on: bool) {
        self.interpolate_attributes = on;
        self.modified();
    }

    /// Attach the plane normal to every output point.
    pub fn set_compute_normals(&mut self, on: bool) {
        self.compute_normals = on;
        self.modified();
    }

    pub fn set_number_of_threads(&mut self, threads: Option<usize>) {
        self.number_of_threads = threads;
        self.modified();
    }

    pub fn number_of_threads_used(&self) -> usize {
        self.threads_used
    }

    pub fn cut(&mut self, data: &DataObject) -> Result<PolyData> {
        let grid = linear_grid(data)?;
        let values: Vec<f64> = grid.points.iter().map(|p| self.plane.evaluate(p)).collect();
        let (mut out, threads) = run_batches(data, &values, &[0.0], self.merge_points, self.number_of_threads)?;
        self.threads_used = threads;
        if !self.interpolate_attributes {
            out.point_data = Default::default();
            out.cell_data = Default::default();
        }
        if self.compute_normals {
            let normals = vec![self.plane.normal; out.number_of_points()];
            out.point_data.set_normals(DataArray::from_tuples("Normals", normals))?;
        }
        Ok(out)
    }
}

impl Algorithm for LinearGridPlaneCutter {
    fn name(&self) -> &'static str {
        "LinearGridPlaneCutter"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::Unstructured
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.cut(ctx.input(0)?)?;
        ctx.set_output(0, out)
    }
}
