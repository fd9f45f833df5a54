//! Voronoi tessellation of points projected onto the xy-plane.
//!
//! Each tile starts as the padded bounding rectangle and is clipped by the
//! bisectors of its nearest generators. The neighbourhood doubles until the
//! farthest neighbour used lies beyond twice the tile's radius, at which point no
//! other generator can cut the tile.

use super::locator::StaticPointLocator;
use crate::array::DataArray;
use crate::data::{DataKind, DataObject, Points, PolyData};
use crate::math;
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::{build_thread_pool, impl_observable};
use crate::{Error, Result};

use rayon::prelude::*;

type Xy = [f64; 2];

/// Content of the `Voronoi Ids` cell array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratingScalars {
    /// no array
    None,
    /// the worker thread that built the tile
    ThreadIds,
    /// id of the generating point
    #[default]
    PointIds,
}

/// Output ports: 0 tiles, 1 flower samples, 2 flower circles.
#[derive(Debug)]
pub struct Voronoi2D {
    object: Object,
    padding: f64,
    generating_scalars: GeneratingScalars,
    point_of_interest: Option<usize>,
    samples_per_circle: usize,
    number_of_threads: Option<usize>,
    threads_used: usize,
}

impl_observable!(Voronoi2D);

impl Default for Voronoi2D {
    fn default() -> Self {
        Self {
            object: Object::new(),
            padding: 0.01,
            generating_scalars: GeneratingScalars::PointIds,
            point_of_interest: None,
            samples_per_circle: 32,
            number_of_threads: None,
            threads_used: 0,
        }
    }
}

/// Tiles plus, with a point of interest, its Voronoi flower.
#[derive(Debug, Clone, Default)]
pub struct VoronoiOutput {
    pub tiles: PolyData,
    pub flower_samples: PolyData,
    pub flower_circles: PolyData,
}

fn clip_half_plane(polygon: &[Xy], normal: Xy, offset: f64) -> Vec<Xy> {
    let side = |p: &Xy| normal[0] * p[0] + normal[1] * p[1] - offset;
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, a) in polygon.iter().enumerate() {
        let b = &polygon[(i + 1) % polygon.len()];
        let (sa, sb) = (side(a), side(b));
        if sa <= 0.0 {
            out.push(*a);
        }
        if (sa < 0.0 && sb > 0.0) || (sa > 0.0 && sb < 0.0) {
            let t = sa / (sa - sb);
            out.push([a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])]);
        }
    }
    out
}

fn d2(a: Xy, b: Xy) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

struct Tessellator<'a> {
    generators: &'a [Xy],
    locator: StaticPointLocator,
    frame: Vec<Xy>,
}

impl Tessellator<'_> {
    fn tile(&self, i: usize) -> Vec<Xy> {
        let n = self.generators.len();
        let g = self.generators[i];
        let mut k = n.min(8);
        loop {
            let ids = self.locator.find_closest_n_points(k, [g[0], g[1], 0.0]);
            let mut tile = self.frame.clone();
            for &j in &ids {
                let h = self.generators[j];
                if j == i {
                    continue;
                }
                if h == g {
                    // coincident generators: the lowest id owns the tile
                    if j < i {
                        return Vec::new();
                    }
                    continue;
                }
                let normal = [h[0] - g[0], h[1] - g[1]];
                let mid = [(h[0] + g[0]) / 2.0, (h[1] + g[1]) / 2.0];
                tile = clip_half_plane(&tile, normal, normal[0] * mid[0] + normal[1] * mid[1]);
                if tile.len() < 3 {
                    return Vec::new();
                }
            }
            let radius2 = tile.iter().map(|v| d2(*v, g)).fold(0.0, f64::max);
            let farthest = ids.last().map_or(0.0, |&j| d2(self.generators[j], g));
            if k >= n || farthest >= 4.0 * radius2 {
                return tile;
            }
            k = (2 * k).min(n);
        }
    }
}

impl Voronoi2D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounding box padding as a fraction of its diagonal.
    pub fn set_padding(&mut self, padding: f64) {
        self.padding = padding.max(0.0);
        self.modified();
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    pub fn set_generating_scalars(&mut self, scalars: GeneratingScalars) {
        self.generating_scalars = scalars;
        self.modified();
    }

    /// Emit only the tile of this generator, together with its flower.
    pub fn set_point_of_interest(&mut self, id: Option<usize>) {
        self.point_of_interest = id;
        self.modified();
    }

    pub fn point_of_interest(&self) -> Option<usize> {
        self.point_of_interest
    }

    pub fn set_samples_per_circle(&mut self, n: usize) {
        self.samples_per_circle = n.max(3);
        self.modified();
    }

    pub fn set_number_of_threads(&mut self, threads: Option<usize>) {
        self.number_of_threads = threads;
        self.modified();
    }

    pub fn number_of_threads_used(&self) -> usize {
        self.threads_used
    }

    pub fn tessellate(&mut self, input: &DataObject) -> Result<VoronoiOutput> {
        let points = input.points();
        let mut output = VoronoiOutput::default();
        if points.is_empty() {
            return Ok(output);
        }
        if let Some(poi) = self.point_of_interest {
            if poi >= points.len() {
                let message = format!("point of interest {poi} out of range ({} points)", points.len());
                self.object.error(&message);
                return Err(Error::out_of_bounds(message));
            }
        }

        let generators: Vec<Xy> = points.iter().map(|p| [p[0], p[1]]).collect();
        let mut frame = math::empty_bounds();
        for g in &generators {
            math::grow_bounds(&mut frame, [g[0], g[1], 0.0]);
        }
        let pad = self.padding * math::bounds_diagonal(&frame).max(f64::EPSILON);
        let (x0, x1, y0, y1) = (frame[0] - pad, frame[1] + pad, frame[2] - pad, frame[3] + pad);
        let tessellator = Tessellator {
            generators: &generators,
            locator: StaticPointLocator::build(
                generators.iter().map(|g| [g[0], g[1], 0.0]).collect(),
                1,
                self.number_of_threads,
            )?,
            frame: vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
        };

        let wanted: Vec<usize> = match self.point_of_interest {
            Some(poi) => vec![poi],
            None => (0..generators.len()).collect(),
        };
        let pool = build_thread_pool(self.number_of_threads)?;
        let tiles: Vec<(usize, usize, Vec<Xy>)> = pool.install(|| {
            wanted
                .par_iter()
                .map(|&i| (i, rayon::current_thread_index().unwrap_or(0), tessellator.tile(i)))
                .collect()
        });
        self.threads_used = pool.current_num_threads();

        let tiles_out = &mut output.tiles;
        let mut ids = Vec::new();
        let mut owners = Vec::new();
        let mut coords = Points::new();
        for (i, thread, tile) in &tiles {
            if tile.is_empty() {
                continue;
            }
            let z = points[*i][2];
            let start = coords.len();
            for v in tile {
                coords.push([v[0], v[1], z]);
            }
            let cell: Vec<usize> = (start..coords.len()).collect();
            tiles_out.polys.insert_next_cell(&cell);
            owners.push(*i);
            ids.push(match self.generating_scalars {
                GeneratingScalars::ThreadIds => *thread as i32,
                _ => *i as i32,
            });
        }
        tiles_out.points = coords;
        if let Some(point_data) = input.point_data() {
            tiles_out.cell_data = point_data.extract(&owners);
        }
        if self.generating_scalars != GeneratingScalars::None {
            tiles_out.cell_data.add_array(DataArray::scalars("Voronoi Ids", ids));
        }

        if let Some((i, _, tile)) = tiles.first().filter(|_| self.point_of_interest.is_some()) {
            let z = points[*i][2];
            let (samples, circles) = self.flower(generators[*i], tile, z);
            output.flower_samples = samples;
            output.flower_circles = circles;
        }
        tracing::debug!(
            generators = generators.len(),
            tiles = output.tiles.polys.number_of_cells(),
            threads = self.threads_used,
            "voronoi tessellation"
        );
        Ok(output)
    }

    /// Circles centred on the tile's vertices passing through the generator, and
    /// samples of their union's boundary.
    fn flower(&self, generator: Xy, tile: &[Xy], z: f64) -> (PolyData, PolyData) {
        let radii: Vec<f64> = tile.iter().map(|v| d2(*v, generator).sqrt()).collect();
        let mut circles = PolyData::new();
        for v in tile {
            circles.points.push([v[0], v[1], z]);
        }
        let all: Vec<usize> = (0..tile.len()).collect();
        circles.verts.insert_next_cell(&all);
        circles.point_data.add_array(DataArray::scalars("Radius", radii.clone()));

        let mut samples = PolyData::new();
        let n = self.samples_per_circle;
        for (c, (center, radius)) in tile.iter().zip(&radii).enumerate() {
            for s in 0..n {
                let angle = 2.0 * std::f64::consts::PI * s as f64 / n as f64;
                let p = [center[0] + radius * angle.cos(), center[1] + radius * angle.sin()];
                let covered = tile
                    .iter()
                    .zip(&radii)
                    .enumerate()
                    .any(|(o, (other, r))| o != c && d2(p, *other).sqrt() < r * (1.0 - 1e-9));
                if !covered {
                    samples.points.push([p[0], p[1], z]);
                }
            }
        }
        let all: Vec<usize> = (0..samples.points.len()).collect();
        if !all.is_empty() {
            samples.verts.insert_next_cell(&all);
        }
        (samples, circles)
    }
}

impl Algorithm for Voronoi2D {
    fn name(&self) -> &'static str {
        "Voronoi2D"
    }

    fn number_of_output_ports(&self) -> usize {
        3
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        for info in outputs.iter_mut() {
            *info = Information::of_kind(DataKind::PolyData);
        }
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let output = self.tessellate(ctx.input(0)?)?;
        ctx.set_output(0, output.tiles)?;
        ctx.set_output(1, output.flower_samples)?;
        ctx.set_output(2, output.flower_circles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn polygon_area(polygon: &[Xy]) -> f64 {
        let n = polygon.len();
        (0..n)
            .map(|i| {
                let (a, b) = (polygon[i], polygon[(i + 1) % n]);
                a[0] * b[1] - b[0] * a[1]
            })
            .sum::<f64>()
            / 2.0
    }

    fn cloud(points: Vec<Vec3>) -> DataObject {
        PolyData::with_points(Points::from_vec(points)).into()
    }

    fn grid3() -> DataObject {
        let mut points = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                points.push([i as f64, j as f64, 0.0]);
            }
        }
        cloud(points)
    }

    fn tile_polygons(out: &PolyData) -> Vec<Vec<Xy>> {
        out.polys
            .iter()
            .map(|cell| cell.iter().map(|&id| {
                let p = out.points.get(id);
                [p[0], p[1]]
            }).collect())
            .collect()
    }

    #[test]
    fn grid_tiles_are_unit_squares() {
        let mut voronoi = Voronoi2D::new();
        voronoi.set_padding(0.0);
        let out = voronoi.tessellate(&grid3()).unwrap().tiles;
        assert_eq!(out.polys.number_of_cells(), 9);
        let areas: Vec<f64> = tile_polygons(&out).iter().map(|t| polygon_area(t)).collect();
        assert!((areas[4] - 1.0).abs() < 1e-12);
        assert!((areas.iter().sum::<f64>() - 4.0).abs() < 1e-12);
        let ids = out.cell_data.get("Voronoi Ids").unwrap();
        assert_eq!(ids.values_as_f64(), (0..9).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn random_tiles_partition_frame_for_any_thread_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<Vec3> = (0..300).map(|_| [rng.gen(), rng.gen(), 0.0]).collect();
        let input = cloud(points.clone());

        let mut voronoi = Voronoi2D::new();
        voronoi.set_number_of_threads(Some(1));
        let serial = voronoi.tessellate(&input).unwrap().tiles;
        voronoi.set_number_of_threads(Some(4));
        voronoi.set_generating_scalars(GeneratingScalars::ThreadIds);
        let parallel = voronoi.tessellate(&input).unwrap().tiles;
        assert_eq!(voronoi.number_of_threads_used(), 4);
        assert_eq!(serial.points.to_vec(), parallel.points.to_vec());
        let threads = parallel.cell_data.get("Voronoi Ids").unwrap();
        assert!(threads.values_as_f64().iter().all(|&t| t < 4.0));

        let mut frame = math::empty_bounds();
        for p in &points {
            math::grow_bounds(&mut frame, *p);
        }
        let pad = 0.01 * math::bounds_diagonal(&frame);
        let expected = (frame[1] - frame[0] + 2.0 * pad) * (frame[3] - frame[2] + 2.0 * pad);
        let tiles = tile_polygons(&serial);
        let total: f64 = tiles.iter().map(|t| polygon_area(t)).sum();
        assert!((total - expected).abs() < 1e-9);

        // the centroid of every tile is closest to its own generator
        for (i, tile) in tiles.iter().enumerate() {
            let c = tile.iter().fold([0.0; 2], |acc, v| [acc[0] + v[0], acc[1] + v[1]]);
            let c = [c[0] / tile.len() as f64, c[1] / tile.len() as f64];
            let own = d2(c, [points[i][0], points[i][1]]);
            assert!(points.iter().all(|p| own <= d2(c, [p[0], p[1]]) + 1e-12));
        }
    }

    #[test]
    fn flower_of_the_center_tile() {
        let mut voronoi = Voronoi2D::new();
        voronoi.set_point_of_interest(Some(4));
        let out = voronoi.tessellate(&grid3()).unwrap();
        assert_eq!(out.tiles.polys.number_of_cells(), 1);
        let radius = out.flower_circles.point_data.get("Radius").unwrap();
        assert_eq!(radius.number_of_tuples(), 4);
        for r in radius.values_as_f64() {
            assert!((r - 0.5f64.sqrt()).abs() < 1e-12);
        }
        assert!(out.flower_samples.number_of_points() > 0);
        for p in out.flower_samples.points.iter() {
            let inside = out
                .flower_circles
                .points
                .iter()
                .any(|c| math::distance2(p, c).sqrt() < 0.5f64.sqrt() - 1e-6);
            assert!(!inside);
        }

        voronoi.set_point_of_interest(Some(9));
        assert!(voronoi.tessellate(&grid3()).is_err());
    }

    #[test]
    fn coincident_generators_share_one_tile() {
        let input = cloud(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        let out = Voronoi2D::new().tessellate(&input).unwrap().tiles;
        assert_eq!(out.polys.number_of_cells(), 2);
        let ids = out.cell_data.get("Voronoi Ids").unwrap();
        assert_eq!(ids.values_as_f64(), vec![0.0, 1.0]);
    }
}
