//! Uniform bucket grids for point queries.
//!
//! Both locators answer the same queries with the same search: the buckets around
//! the query are visited in rings of growing Chebyshev distance until candidates are
//! found, then every bucket overlapping the ball through the current best candidate
//! is checked. Ties between equidistant points go to the lowest id.

use crate::data::DataObject;
use crate::math::{self, Bounds, Vec3};
use crate::utils::build_thread_pool;
use crate::Result;

use rayon::prelude::*;

/// Bucket layout over a bounding box.
#[derive(Debug, Clone, PartialEq)]
struct BucketGrid {
    origin: Vec3,
    size: Vec3,
    divisions: [usize; 3],
}

impl BucketGrid {
    fn new(bounds: &Bounds, points: usize, per_bucket: usize) -> Self {
        let (origin, lengths) = if math::bounds_are_valid(bounds) {
            (
                [bounds[0], bounds[2], bounds[4]],
                [bounds[1] - bounds[0], bounds[3] - bounds[2], bounds[5] - bounds[4]],
            )
        } else {
            ([0.0; 3], [0.0; 3])
        };
        let buckets = (points / per_bucket.max(1)).max(1) as f64;
        let spanned: Vec<f64> = lengths.iter().copied().filter(|&l| l > 0.0).collect();
        let mut divisions = [1; 3];
        if !spanned.is_empty() {
            let volume: f64 = spanned.iter().product();
            let h = (volume / buckets).powf(1.0 / spanned.len() as f64);
            for axis in 0..3 {
                if lengths[axis] > 0.0 {
                    divisions[axis] = ((lengths[axis] / h).round() as usize).clamp(1, 1 << 10);
                }
            }
        }
        let size = [0, 1, 2].map(|a| if lengths[a] > 0.0 { lengths[a] / divisions[a] as f64 } else { 1.0 });
        Self { origin, size, divisions }
    }

    fn len(&self) -> usize {
        self.divisions.iter().product()
    }

    fn coordinate(&self, x: f64, axis: usize) -> isize {
        ((x - self.origin[axis]) / self.size[axis]).floor() as isize
    }

    /// bucket containing `p`, clamped to the grid
    fn bucket(&self, p: Vec3) -> [usize; 3] {
        [0, 1, 2].map(|a| self.coordinate(p[a], a).clamp(0, self.divisions[a] as isize - 1) as usize)
    }

    fn index(&self, ijk: [usize; 3]) -> usize {
        ijk[0] + self.divisions[0] * (ijk[1] + self.divisions[1] * ijk[2])
    }

    /// Indices of the buckets at Chebyshev distance `level` from `center`.
    fn ring(&self, center: [usize; 3], level: usize) -> Vec<usize> {
        let level = level as isize;
        let c = center.map(|v| v as isize);
        let d = self.divisions.map(|v| v as isize);
        let mut out = Vec::new();
        for k in (c[2] - level).max(0)..=(c[2] + level).min(d[2] - 1) {
            for j in (c[1] - level).max(0)..=(c[1] + level).min(d[1] - 1) {
                for i in (c[0] - level).max(0)..=(c[0] + level).min(d[0] - 1) {
                    let on_shell = (i - c[0]).abs() == level || (j - c[1]).abs() == level || (k - c[2]).abs() == level;
                    if on_shell {
                        out.push(self.index([i as usize, j as usize, k as usize]));
                    }
                }
            }
        }
        out
    }

    /// whether any bucket lies at Chebyshev distance `level`
    fn ring_exists(&self, center: [usize; 3], level: usize) -> bool {
        (0..3).any(|a| center[a] >= level || center[a] + level < self.divisions[a])
    }

    /// Indices of the buckets overlapping the box around the ball `(p, r)`.
    fn overlapping(&self, p: Vec3, r: f64) -> Vec<usize> {
        let lo = [0, 1, 2].map(|a| self.coordinate(p[a] - r, a).clamp(0, self.divisions[a] as isize - 1) as usize);
        let hi = [0, 1, 2].map(|a| self.coordinate(p[a] + r, a).clamp(0, self.divisions[a] as isize - 1) as usize);
        let mut out = Vec::new();
        for k in lo[2]..=hi[2] {
            for j in lo[1]..=hi[1] {
                for i in lo[0]..=hi[0] {
                    out.push(self.index([i, j, k]));
                }
            }
        }
        out
    }
}

/// Storage a search can walk.
trait Buckets {
    fn grid(&self) -> &BucketGrid;
    fn bucket_points(&self, bucket: usize) -> &[usize];
    fn point(&self, id: usize) -> Vec3;
    fn number_of_points(&self) -> usize;

    /// every point within `r` of `x` with its squared distance
    fn within(&self, x: Vec3, r: f64) -> Vec<(f64, usize)> {
        let r2 = r * r;
        let mut out = Vec::new();
        for bucket in self.grid().overlapping(x, r) {
            for &id in self.bucket_points(bucket) {
                let d2 = math::distance2(self.point(id), x);
                if d2 <= r2 {
                    out.push((d2, id));
                }
            }
        }
        out
    }

    /// Ring search until at least `n` candidates are known; returns them.
    fn candidates(&self, x: Vec3, n: usize) -> Vec<(f64, usize)> {
        let grid = self.grid();
        let center = grid.bucket(x);
        let mut found = Vec::new();
        let mut level = 0;
        while found.len() < n && grid.ring_exists(center, level) {
            for bucket in grid.ring(center, level) {
                for &id in self.bucket_points(bucket) {
                    found.push((math::distance2(self.point(id), x), id));
                }
            }
            level += 1;
        }
        found
    }

    fn closest(&self, x: Vec3) -> Option<usize> {
        self.closest_n(1, x).first().copied()
    }

    fn closest_n(&self, n: usize, x: Vec3) -> Vec<usize> {
        if n == 0 || self.number_of_points() == 0 {
            return Vec::new();
        }
        let mut found = self.candidates(x, n);
        found.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let k = n.min(found.len());
        if k == 0 {
            return Vec::new();
        }
        let d2 = found[k - 1].0;
        let mut confirmed = self.within(x, d2.sqrt() * (1.0 + 1e-12));
        confirmed.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        confirmed.truncate(n);
        confirmed.into_iter().map(|(_, id)| id).collect()
    }

    fn radius(&self, r: f64, x: Vec3) -> Vec<usize> {
        let mut ids: Vec<usize> = self.within(x, r).into_iter().map(|(_, id)| id).collect();
        ids.sort_unstable();
        ids
    }
}

/// Locator built once over a fixed point set, in parallel.
///
/// Buckets are stored as one sorted id array with offsets per bucket.
#[derive(Debug, Clone)]
pub struct StaticPointLocator {
    points: Vec<Vec3>,
    grid: BucketGrid,
    offsets: Vec<usize>,
    ids: Vec<usize>,
    threads_used: usize,
}

impl StaticPointLocator {
    /// Build over `points` with about `per_bucket` points per bucket, on a pool of
    /// `threads` workers (`None`: all cores).
    pub fn build(points: Vec<Vec3>, per_bucket: usize, threads: Option<usize>) -> Result<Self> {
        let mut bounds = math::empty_bounds();
        for p in &points {
            math::grow_bounds(&mut bounds, *p);
        }
        let grid = BucketGrid::new(&bounds, points.len(), per_bucket);
        let pool = build_thread_pool(threads)?;
        let mut keyed: Vec<(usize, usize)> = pool.install(|| {
            points
                .par_iter()
                .enumerate()
                .map(|(id, p)| (grid.index(grid.bucket(*p)), id))
                .collect()
        });
        pool.install(|| keyed.par_sort_unstable());
        let mut offsets = vec![0; grid.len() + 1];
        for &(bucket, _) in &keyed {
            offsets[bucket + 1] += 1;
        }
        for b in 0..grid.len() {
            offsets[b + 1] += offsets[b];
        }
        let ids = keyed.into_iter().map(|(_, id)| id).collect();
        tracing::trace!(points = points.len(), buckets = grid.len(), "built static locator");
        Ok(Self {
            points,
            grid,
            offsets,
            ids,
            threads_used: pool.current_num_threads(),
        })
    }

    /// Locator over the points of a dataset, one point per bucket.
    pub fn from_data(data: &DataObject) -> Result<Self> {
        Self::build(data.points(), 1, None)
    }

    pub fn number_of_buckets(&self) -> usize {
        self.grid.len()
    }

    pub fn divisions(&self) -> [usize; 3] {
        self.grid.divisions
    }

    pub fn number_of_threads_used(&self) -> usize {
        self.threads_used
    }

    pub fn find_closest_point(&self, x: Vec3) -> Option<usize> {
        self.closest(x)
    }

    /// The `n` closest points, nearest first.
    pub fn find_closest_n_points(&self, n: usize, x: Vec3) -> Vec<usize> {
        self.closest_n(n, x)
    }

    /// Points within `r` of `x`, in ascending id order.
    pub fn find_points_within_radius(&self, r: f64, x: Vec3) -> Vec<usize> {
        self.radius(r, x)
    }

    /// Points within `r` of `x` with their squared distances, unordered.
    pub(crate) fn within_radius(&self, r: f64, x: Vec3) -> Vec<(f64, usize)> {
        self.within(x, r)
    }

    pub fn point(&self, id: usize) -> Vec3 {
        self.points[id]
    }
}

impl Buckets for StaticPointLocator {
    fn grid(&self) -> &BucketGrid {
        &self.grid
    }

    fn bucket_points(&self, bucket: usize) -> &[usize] {
        &self.ids[self.offsets[bucket]..self.offsets[bucket + 1]]
    }

    fn point(&self, id: usize) -> Vec3 {
        self.points[id]
    }

    fn number_of_points(&self) -> usize {
        self.points.len()
    }
}

/// Locator that accepts insertions after construction.
#[derive(Debug, Clone)]
pub struct PointLocator {
    points: Vec<Vec3>,
    grid: BucketGrid,
    buckets: Vec<Vec<usize>>,
    tolerance: f64,
}

impl PointLocator {
    /// Empty locator over `bounds`, sized for about `estimated` points.
    pub fn new(bounds: Bounds, estimated: usize, per_bucket: usize) -> Self {
        let grid = BucketGrid::new(&bounds, estimated, per_bucket);
        Self {
            points: Vec::new(),
            buckets: vec![Vec::new(); grid.len()],
            grid,
            tolerance: 0.0,
        }
    }

    /// Locator holding the points of a dataset, three points per bucket.
    pub fn from_data(data: &DataObject) -> Self {
        let mut locator = Self::new(data.bounds(), data.number_of_points(), 3);
        for p in data.points() {
            locator.insert_next_point(p);
        }
        locator
    }

    /// Distance under which [`is_inserted_point`](Self::is_inserted_point) matches.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance.max(0.0);
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    /// Store `x` under `id`, which may be past the end.
    pub fn insert_point(&mut self, id: usize, x: Vec3) {
        if id >= self.points.len() {
            self.points.resize(id + 1, [f64::NAN; 3]);
        }
        self.points[id] = x;
        let bucket = self.grid.index(self.grid.bucket(x));
        self.buckets[bucket].push(id);
    }

    pub fn insert_next_point(&mut self, x: Vec3) -> usize {
        let id = self.points.len();
        self.insert_point(id, x);
        id
    }

    /// Id of an inserted point within the tolerance of `x`.
    pub fn is_inserted_point(&self, x: Vec3) -> Option<usize> {
        let tol2 = self.tolerance * self.tolerance;
        self.within(x, self.tolerance)
            .into_iter()
            .filter(|&(d2, _)| d2 <= tol2)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, id)| id)
    }

    /// Insert `x` unless it is already there; `(id, inserted)`.
    pub fn insert_unique_point(&mut self, x: Vec3) -> (usize, bool) {
        match self.is_inserted_point(x) {
            Some(id) => (id, false),
            None => (self.insert_next_point(x), true),
        }
    }

    pub fn find_closest_point(&self, x: Vec3) -> Option<usize> {
        self.closest(x)
    }

    pub fn find_closest_n_points(&self, n: usize, x: Vec3) -> Vec<usize> {
        self.closest_n(n, x)
    }

    pub fn find_points_within_radius(&self, r: f64, x: Vec3) -> Vec<usize> {
        self.radius(r, x)
    }

    pub fn point(&self, id: usize) -> Vec3 {
        self.points[id]
    }
}

impl Buckets for PointLocator {
    fn grid(&self) -> &BucketGrid {
        &self.grid
    }

    fn bucket_points(&self, bucket: usize) -> &[usize] {
        &self.buckets[bucket]
    }

    fn point(&self, id: usize) -> Vec3 {
        self.points[id]
    }

    fn number_of_points(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PointSource;

    fn cloud(n: usize) -> Vec<Vec3> {
        let mut source = PointSource::new(n, [0.0; 3], 1.0);
        source.set_seed(3);
        source.generate().points.to_vec()
    }

    fn brute_closest(points: &[Vec3], x: Vec3, n: usize) -> Vec<f64> {
        let mut d: Vec<f64> = points.iter().map(|p| math::distance2(*p, x)).collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        d.truncate(n);
        d
    }

    #[test]
    fn locators_agree_with_brute_force() {
        let points = cloud(2000);
        let fixed = StaticPointLocator::build(points.clone(), 1, Some(2)).unwrap();
        let mut bounds = math::empty_bounds();
        for p in &points {
            math::grow_bounds(&mut bounds, *p);
        }
        let mut incremental = PointLocator::new(bounds, points.len(), 3);
        for p in &points {
            incremental.insert_next_point(*p);
        }
        for x in [[0.0, 0.0, 0.0], [0.9, -0.2, 0.1], [3.0, 3.0, 3.0], [-0.5, 0.5, -0.5]] {
            let expected = brute_closest(&points, x, 7);
            for found in [fixed.find_closest_n_points(7, x), incremental.find_closest_n_points(7, x)] {
                let d: Vec<f64> = found.iter().map(|&id| math::distance2(points[id], x)).collect();
                assert_eq!(d, expected);
            }
            let closest = fixed.find_closest_point(x).unwrap();
            assert_eq!(math::distance2(points[closest], x), expected[0]);

            let mut brute: Vec<usize> = (0..points.len())
                .filter(|&i| math::distance2(points[i], x) <= 0.3 * 0.3)
                .collect();
            brute.sort_unstable();
            assert_eq!(fixed.find_points_within_radius(0.3, x), brute);
            assert_eq!(incremental.find_points_within_radius(0.3, x), brute);
        }
        assert_eq!(fixed.number_of_threads_used(), 2);
    }

    #[test]
    fn unique_insertion() {
        let mut locator = PointLocator::new([0.0, 1.0, 0.0, 1.0, 0.0, 1.0], 10, 3);
        assert_eq!(locator.insert_unique_point([0.5, 0.5, 0.5]), (0, true));
        assert_eq!(locator.insert_unique_point([0.5, 0.5, 0.5]), (0, false));
        assert_eq!(locator.insert_unique_point([0.5, 0.5, 0.6]), (1, true));
        locator.set_tolerance(0.2);
        assert_eq!(locator.is_inserted_point([0.5, 0.5, 0.58]), Some(1));
        // points outside the initial bounds land in the border buckets
        locator.insert_point(5, [4.0, 4.0, 4.0]);
        assert_eq!(locator.find_closest_point([3.0, 3.0, 3.0]), Some(5));
    }

    #[test]
    fn planar_points_get_flat_grid() {
        let points: Vec<Vec3> = (0..100).map(|i| [(i % 10) as f64, (i / 10) as f64, 0.0]).collect();
        let locator = StaticPointLocator::build(points, 1, None).unwrap();
        assert_eq!(locator.divisions()[2], 1);
        assert_eq!(locator.find_closest_point([4.2, 6.9, 5.0]), Some(74));
    }
}
