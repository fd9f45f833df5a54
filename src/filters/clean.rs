//! Point merging for polydata and unstructured grids.
//!
//! Points are visited in id order; every point not yet merged becomes the
//! representative of all unmerged points within the tolerance, so each group is
//! represented by its lowest id. Output points keep the order of their
//! representatives.

use super::locator::StaticPointLocator;
use super::PointBuilder;
use crate::array::DataArray;
use crate::data::{CellArray, DataKind, DataSetAttributes, Points, PolyData, UnstructuredGrid};
use crate::math::{self, Bounds, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::collections::HashMap;

/// Settings shared by both cleaners.
#[derive(Debug, Clone, PartialEq)]
struct CleanSettings {
    tolerance: f64,
    absolute: bool,
    merging_array: Option<String>,
    produce_merge_map: bool,
    average_point_data: bool,
    remove_unused_points: bool,
    remove_degenerate_cells: bool,
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            absolute: false,
            merging_array: None,
            produce_merge_map: false,
            average_point_data: false,
            remove_unused_points: true,
            remove_degenerate_cells: false,
        }
    }
}

impl CleanSettings {
    fn distance(&self, bounds: &Bounds) -> f64 {
        if self.absolute || !math::bounds_are_valid(bounds) {
            self.tolerance
        } else {
            self.tolerance * math::bounds_diagonal(bounds)
        }
    }
}

/// Representative input id of every input point.
fn merge_targets(points: &[Vec3], tolerance: f64, merging: Option<&DataArray>) -> Result<Vec<usize>> {
    let n = points.len();
    let mut target = vec![usize::MAX; n];
    if tolerance <= 0.0 {
        // -0.0 and 0.0 must share a key
        let bits = |v: f64| (v + 0.0).to_bits();
        let mut seen: HashMap<Vec<u64>, usize> = HashMap::new();
        for id in 0..n {
            let mut key: Vec<u64> = points[id].iter().map(|&v| bits(v)).collect();
            if let Some(array) = merging {
                key.extend(array.tuple(id).into_iter().map(bits));
            }
            target[id] = *seen.entry(key).or_insert(id);
        }
        return Ok(target);
    }
    let same = |a: usize, b: usize| merging.map_or(true, |array| array.tuple(a) == array.tuple(b));
    let locator = StaticPointLocator::build(points.to_vec(), 1, None)?;
    for id in 0..n {
        if target[id] != usize::MAX {
            continue;
        }
        target[id] = id;
        for (_, other) in locator.within_radius(tolerance, points[id]) {
            if other > id && target[other] == usize::MAX && same(id, other) {
                target[other] = id;
            }
        }
    }
    Ok(target)
}

struct Merged {
    /// output id of every input point, `None` when dropped
    map: Vec<Option<usize>>,
    points: Points,
    point_data: DataSetAttributes,
}

/// Merge points; `used` marks the input points referenced by cells.
fn merge_points(
    points: &Points,
    point_data: &DataSetAttributes,
    settings: &CleanSettings,
    used: &[bool],
) -> Result<Merged> {
    let coords = points.to_vec();
    let merging = match &settings.merging_array {
        Some(name) => Some(
            point_data
                .get(name)
                .ok_or_else(|| Error::pipeline(format!("no point array `{name}` to restrict merging")))?,
        ),
        None => None,
    };
    let target = merge_targets(&coords, settings.distance(&points.bounds()), merging)?;

    let mut keep = vec![!settings.remove_unused_points; coords.len()];
    for (id, &u) in used.iter().enumerate() {
        if u {
            keep[target[id]] = true;
        }
    }
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    if settings.average_point_data {
        for (id, &rep) in target.iter().enumerate() {
            groups.entry(rep).or_default().push(id);
        }
    }

    let mut builder = PointBuilder::new(point_data);
    let mut rep_out = vec![None; coords.len()];
    for id in 0..coords.len() {
        if target[id] != id || !keep[id] {
            continue;
        }
        let new = match groups.get(&id) {
            Some(members) if members.len() > 1 => {
                let w = vec![1.0 / members.len() as f64; members.len()];
                builder.interpolate(coords[id], members, &w)
            }
            _ => builder.copy(coords[id], id),
        };
        rep_out[id] = Some(new);
    }
    let map = target.iter().map(|&rep| rep_out[rep]).collect();
    Ok(Merged {
        map,
        points: Points::from_vec(builder.points),
        point_data: builder.point_data,
    })
}

fn merge_map_array(map: &[Option<usize>]) -> DataArray {
    let values: Vec<i64> = map.iter().map(|m| m.map_or(-1, |v| v as i64)).collect();
    DataArray::scalars("MergeMap", values)
}

/// Renumber a cell; `None` when it degenerates and degenerate cells are removed.
fn renumber(ids: &[usize], map: &[Option<usize>], closed: bool, minimum: usize, remove_degenerate: bool) -> Option<Vec<usize>> {
    let mut out: Vec<usize> = ids.iter().filter_map(|&id| map[id]).collect();
    if out.len() != ids.len() {
        return None;
    }
    if remove_degenerate {
        out.dedup();
        if closed && out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        if out.len() < minimum {
            return None;
        }
    }
    Some(out)
}

macro_rules! clean_setters {
    ($ty:ty) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            /// Merge distance; relative to the bounding box diagonal unless absolute.
            pub fn set_tolerance(&mut self, tolerance: f64) {
                self.settings.tolerance = tolerance.max(0.0);
                self.modified();
            }

            pub fn set_tolerance_is_absolute(&mut self, on: bool) {
                self.settings.absolute = on;
                self.modified();
            }

            /// Only merge points with equal tuples in this point array.
            pub fn set_merging_array(&mut self, name: Option<&str>) {
                self.settings.merging_array = name.map(str::to_string);
                self.modified();
            }

            /// Add the field array `MergeMap`: the output id of every input point, -1
            /// when removed.
            pub fn set_produce_merge_map(&mut self, on: bool) {
                self.settings.produce_merge_map = on;
                self.modified();
            }

            pub fn set_average_point_data(&mut self, on: bool) {
                self.settings.average_point_data = on;
                self.modified();
            }

            pub fn set_remove_unused_points(&mut self, on: bool) {
                self.settings.remove_unused_points = on;
                self.modified();
            }

            pub fn set_remove_degenerate_cells(&mut self, on: bool) {
                self.settings.remove_degenerate_cells = on;
                self.modified();
            }
        }
    };
}

/// Merge coincident or nearby points of a polydata.
#[derive(Debug, Default)]
pub struct StaticCleanPolyData {
    object: Object,
    settings: CleanSettings,
}

impl_observable!(StaticCleanPolyData);
clean_setters!(StaticCleanPolyData);

impl StaticCleanPolyData {
    pub fn clean(&self, input: &PolyData) -> Result<PolyData> {
        let mut used = vec![false; input.number_of_points()];
        for cells in [&input.verts, &input.lines, &input.polys, &input.strips] {
            for &id in cells.connectivity() {
                used[id] = true;
            }
        }
        let merged = merge_points(&input.points, &input.point_data, &self.settings, &used)?;
        let mut out = PolyData::with_points(merged.points);
        out.point_data = merged.point_data;
        let mut kept_cells = Vec::new();
        let mut cell_id = 0;
        let remove = self.settings.remove_degenerate_cells;
        for (source, closed, minimum, target) in [
            (&input.verts, false, 1, &mut out.verts),
            (&input.lines, false, 2, &mut out.lines),
            (&input.polys, true, 3, &mut out.polys),
            (&input.strips, false, 3, &mut out.strips),
        ] {
            let mut cells = CellArray::new();
            for ids in source.iter() {
                if let Some(ids) = renumber(ids, &merged.map, closed, minimum, remove) {
                    cells.insert_next_cell(&ids);
                    kept_cells.push(cell_id);
                }
                cell_id += 1;
            }
            *target = cells;
        }
        out.cell_data = input.cell_data.extract(&kept_cells);
        out.field_data = input.field_data.clone();
        if self.settings.produce_merge_map {
            out.field_data.add_array(merge_map_array(&merged.map));
        }
        Ok(out)
    }
}

impl Algorithm for StaticCleanPolyData {
    fn name(&self) -> &'static str {
        "StaticCleanPolyData"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::PolyData
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let input = ctx
            .input(0)?
            .as_poly_data()
            .ok_or_else(|| Error::pipeline("expected polydata"))?;
        let out = self.clean(input)?;
        tracing::debug!(points_in = input.number_of_points(), points_out = out.number_of_points(), "cleaned polydata");
        ctx.set_output(0, out)
    }
}

/// Merge coincident or nearby points of an unstructured grid and renumber its cells.
#[derive(Debug, Default)]
pub struct StaticCleanUnstructuredGrid {
    object: Object,
    settings: CleanSettings,
}

impl_observable!(StaticCleanUnstructuredGrid);
clean_setters!(StaticCleanUnstructuredGrid);

impl StaticCleanUnstructuredGrid {
    pub fn clean(&self, input: &UnstructuredGrid) -> Result<UnstructuredGrid> {
        let mut used = vec![false; input.number_of_points()];
        for &id in input.cells.connectivity() {
            used[id] = true;
        }
        let merged = merge_points(&input.points, &input.point_data, &self.settings, &used)?;
        let mut out = UnstructuredGrid::with_points(merged.points);
        out.point_data = merged.point_data;
        let mut kept_cells = Vec::new();
        for (cell_id, ids) in input.cells.iter().enumerate() {
            let Some(new) = renumber(ids, &merged.map, false, 0, false) else { continue };
            if self.settings.remove_degenerate_cells {
                let mut distinct = new.clone();
                distinct.sort_unstable();
                distinct.dedup();
                if distinct.len() < new.len() {
                    continue;
                }
            }
            out.insert_next_cell(input.cell_types[cell_id], &new)?;
            kept_cells.push(cell_id);
        }
        out.cell_data = input.cell_data.extract(&kept_cells);
        out.field_data = input.field_data.clone();
        if self.settings.produce_merge_map {
            out.field_data.add_array(merge_map_array(&merged.map));
        }
        Ok(out)
    }
}

impl Algorithm for StaticCleanUnstructuredGrid {
    fn name(&self) -> &'static str {
        "StaticCleanUnstructuredGrid"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::Unstructured
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::Unstructured);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let input = ctx
            .input(0)?
            .as_unstructured()
            .ok_or_else(|| Error::pipeline("expected an unstructured grid"))?;
        let out = self.clean(input)?;
        ctx.set_output(0, out)
    }
}
