//! Vertex clustering: collapse every point falling into the same bin of a uniform
//! grid and drop triangles whose corners no longer fall into three bins.

use super::PointBuilder;
use crate::data::{DataKind, Points, PolyData};
use crate::math::{self, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::{build_thread_pool, impl_observable};
use crate::{Error, Result};

use rayon::prelude::*;

use std::collections::HashMap;

/// Position of the output point of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointGeneration {
    /// The input points are passed through unchanged; triangles refer to the lowest
    /// input id of each bin.
    #[default]
    UseInputPoints,
    /// compacted output, at the lowest id input point of the bin
    BinPoints,
    /// compacted output, at the bin center
    BinCenters,
    /// compacted output, at the mean of the bin's points; point data averaged too
    BinAverages,
}

#[derive(Debug)]
pub struct BinnedDecimation {
    object: Object,
    divisions: [usize; 3],
    point_generation: PointGeneration,
    produce_cell_data: bool,
    number_of_threads: Option<usize>,
    threads_used: usize,
}

impl_observable!(BinnedDecimation);

impl Default for BinnedDecimation {
    fn default() -> Self {
        Self {
            object: Object::new(),
            divisions: [256, 256, 256],
            point_generation: PointGeneration::UseInputPoints,
            produce_cell_data: true,
            number_of_threads: None,
            threads_used: 0,
        }
    }
}

impl BinnedDecimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_number_of_divisions(&mut self, divisions: [usize; 3]) {
        self.divisions = divisions.map(|d| d.max(1));
        self.modified();
    }

    pub fn set_point_generation(&mut self, mode: PointGeneration) {
        self.point_generation = mode;
        self.modified();
    }

    pub fn set_produce_cell_data(&mut self, on: bool) {
        self.produce_cell_data = on;
        self.modified();
    }

    pub fn set_number_of_threads(&mut self, threads: Option<usize>) {
        self.number_of_threads = threads;
        self.modified();
    }

    pub fn number_of_threads_used(&self) -> usize {
        self.threads_used
    }

    pub fn decimate(&mut self, input: &PolyData) -> Result<PolyData> {
        let bounds = input.bounds();
        if !math::bounds_are_valid(&bounds) {
            return Ok(PolyData::new());
        }
        let n = self.divisions;
        let lo = [bounds[0], bounds[2], bounds[4]];
        let len = [bounds[1] - bounds[0], bounds[3] - bounds[2], bounds[5] - bounds[4]];
        let bin_of = |p: Vec3| -> usize {
            let ijk = [0, 1, 2].map(|a| {
                if len[a] == 0.0 {
                    0
                } else {
                    (((p[a] - lo[a]) / len[a] * n[a] as f64) as usize).min(n[a] - 1)
                }
            });
            ijk[0] + n[0] * (ijk[1] + n[1] * ijk[2])
        };
        let bin_center = |bin: usize| -> Vec3 {
            let ijk = [bin % n[0], (bin / n[0]) % n[1], bin / (n[0] * n[1])];
            [0, 1, 2].map(|a| lo[a] + (ijk[a] as f64 + 0.5) * len[a] / n[a] as f64)
        };

        let pool = build_thread_pool(self.number_of_threads)?;
        let coords = input.points.to_vec();
        let bins: Vec<usize> = pool.install(|| coords.par_iter().map(|p| bin_of(*p)).collect());
        self.threads_used = pool.current_num_threads();

        // lowest id of every occupied bin, and its members
        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        for (id, &bin) in bins.iter().enumerate() {
            members.entry(bin).or_default().push(id);
        }

        let mut kept = Vec::new();
        for (tri, cell) in input.triangles() {
            let b = tri.map(|id| bins[id]);
            if b[0] != b[1] && b[1] != b[2] && b[0] != b[2] {
                kept.push((b, cell));
            }
        }

        let mut out = PolyData::new();
        let mut cell_ids = Vec::with_capacity(kept.len());
        match self.point_generation {
            PointGeneration::UseInputPoints => {
                out.points = input.points.clone();
                out.point_data = input.point_data.clone();
                for (b, cell) in &kept {
                    let ids = b.map(|bin| members[&bin][0]);
                    out.polys.insert_next_cell(&ids);
                    cell_ids.push(*cell);
                }
            }
            mode => {
                let mut builder = PointBuilder::new(&input.point_data);
                let mut out_of_bin: HashMap<usize, usize> = HashMap::new();
                for (b, cell) in &kept {
                    let mut ids = [0; 3];
                    for (v, &bin) in b.iter().enumerate() {
                        ids[v] = *out_of_bin.entry(bin).or_insert_with(|| {
                            let group = &members[&bin];
                            match mode {
                                PointGeneration::BinAverages => {
                                    let w = 1.0 / group.len() as f64;
                                    let mean = group
                                        .iter()
                                        .fold([0.0; 3], |acc, &id| math::add(acc, math::scale(coords[id], w)));
                                    builder.interpolate(mean, group, &vec![w; group.len()])
                                }
                                PointGeneration::BinCenters => {
                                    builder.points.push(bin_center(bin));
                                    builder.points.len() - 1
                                }
                                _ => builder.copy(coords[group[0]], group[0]),
                            }
                        });
                    }
                    out.polys.insert_next_cell(&ids);
                    cell_ids.push(*cell);
                }
                out.points = Points::from_vec(builder.points);
                if mode != PointGeneration::BinCenters {
                    out.point_data = builder.point_data;
                }
            }
        }
        if self.produce_cell_data {
            out.cell_data = input.cell_data.extract(&cell_ids);
        }
        tracing::debug!(
            triangles_in = input.polys.number_of_cells(),
            triangles_out = out.polys.number_of_cells(),
            threads = self.threads_used,
            "binned decimation"
        );
        Ok(out)
    }
}

impl Algorithm for BinnedDecimation {
    fn name(&self) -> &'static str {
        "BinnedDecimation"
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
        let out = self.decimate(input)?;
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DataArray;
    use crate::filters::SphereSource;

    fn sphere() -> PolyData {
        let mut source = SphereSource::new([0.0; 3], 1.0);
        source.set_theta_resolution(64);
        source.set_phi_resolution(64);
        let mut sphere = source.generate().unwrap();
        let n = sphere.polys.number_of_cells();
        let ids: Vec<i32> = (0..n as i32).collect();
        sphere.cell_data.add_array(DataArray::scalars("id", ids));
        sphere
    }

    #[test]
    fn fewer_triangles_and_no_degenerates() {
        let input = sphere();
        for mode in [
            PointGeneration::UseInputPoints,
            PointGeneration::BinPoints,
            PointGeneration::BinCenters,
            PointGeneration::BinAverages,
        ] {
            let mut decimate = BinnedDecimation::new();
            decimate.set_number_of_divisions([8, 8, 8]);
            decimate.set_point_generation(mode);
            decimate.set_number_of_threads(Some(2));
            let out = decimate.decimate(&input).unwrap();
            out.validate().unwrap();
            assert!(out.polys.number_of_cells() < input.polys.number_of_cells() / 4, "{mode:?}");
            for tri in out.polys.iter() {
                assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
            }
            assert_eq!(out.cell_data.get("id").unwrap().number_of_tuples(), out.polys.number_of_cells());
            assert_eq!(decimate.number_of_threads_used(), 2);
        }
    }

    #[test]
    fn input_points_mode_uses_lowest_ids() {
        let input = sphere();
        let mut decimate = BinnedDecimation::new();
        decimate.set_number_of_divisions([4, 4, 4]);
        let out = decimate.decimate(&input).unwrap();
        assert_eq!(out.number_of_points(), input.number_of_points());
        // the poles are the lowest ids of their bins
        let used: std::collections::HashSet<usize> = out.polys.connectivity().iter().copied().collect();
        assert!(used.contains(&0) && used.contains(&1));
    }

    #[test]
    fn averages_stay_inside_the_bins() {
        let mut input = sphere();
        let x: Vec<f64> = input.points.iter().map(|p| p[0]).collect();
        input.point_data.add_array(DataArray::scalars("x", x));
        let mut decimate = BinnedDecimation::new();
        decimate.set_number_of_divisions([5, 5, 5]);
        decimate.set_point_generation(PointGeneration::BinAverages);
        let out = decimate.decimate(&input).unwrap();
        let x = out.point_data.get("x").unwrap();
        for (i, p) in out.points.iter().enumerate() {
            assert!((x.component(i, 0) - p[0]).abs() < 1e-12);
        }
    }
}
