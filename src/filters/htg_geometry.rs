//! Boundary polygons of a hyper tree grid.

use crate::data::{CellType, DataKind, HyperTreeGrid, Points, PolyData};
use crate::math::Vec3;
use crate::object::Object;
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::collections::HashMap;

type Key = [u64; 3];

fn key(p: Vec3) -> Key {
    p.map(|c| (c + 0.0).to_bits())
}

/// Quads for every visible leaf of a 2D grid; in 3D, the faces of visible leaves
/// that no equal-sized visible neighbour covers.
///
/// Cell arrays of the grid, indexed by global node index, are passed to the
/// polygons of each leaf when every leaf has a global index.
#[derive(Debug, Default)]
pub struct HyperTreeGridGeometry {
    object: Object,
}

impl_observable!(HyperTreeGridGeometry);

struct Builder {
    points: Points,
    ids: HashMap<Key, usize>,
}

impl Builder {
    fn point(&mut self, p: Vec3) -> usize {
        let points = &mut self.points;
        *self.ids.entry(key(p)).or_insert_with(|| points.push(p))
    }
}

impl HyperTreeGridGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, grid: &HyperTreeGrid) -> Result<PolyData> {
        let leaves = grid.visible_leaves();
        let mut builder = Builder {
            points: Points::new(),
            ids: HashMap::new(),
        };
        let mut out = PolyData::new();
        let mut sources = Vec::new();

        if grid.dimension() == 2 {
            let flat = (0..3).find(|&a| leaves.first().map_or(false, |l| l.3[a] == 0.0)).unwrap_or(2);
            let (u, v) = ((flat + 1) % 3, (flat + 2) % 3);
            for (leaf, (_, _, origin, size)) in leaves.iter().enumerate() {
                let corner = |du: f64, dv: f64| {
                    let mut p = *origin;
                    p[u] += du * size[u];
                    p[v] += dv * size[v];
                    p
                };
                let quad = [corner(0.0, 0.0), corner(1.0, 0.0), corner(1.0, 1.0), corner(0.0, 1.0)]
                    .map(|p| builder.point(p));
                out.polys.insert_next_cell(&quad);
                sources.push(leaf);
            }
        } else {
            let mut faces: HashMap<[Key; 4], (usize, [Vec3; 4], usize)> = HashMap::new();
            let mut order = Vec::new();
            for (leaf, (_, _, origin, size)) in leaves.iter().enumerate() {
                let corners: Vec<Vec3> = (0..8)
                    .map(|c| {
                        let bits = [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0], [0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]][c];
                        [0, 1, 2].map(|a| origin[a] + bits[a] as f64 * size[a])
                    })
                    .collect();
                for face in CellType::Hexahedron.faces() {
                    let quad = [corners[face[0]], corners[face[1]], corners[face[2]], corners[face[3]]];
                    let mut id = quad.map(key);
                    id.sort_unstable();
                    let entry = faces.entry(id).or_insert_with(|| {
                        order.push(id);
                        (0, quad, leaf)
                    });
                    entry.0 += 1;
                }
            }
            for id in order {
                let (count, quad, leaf) = faces[&id];
                if count == 1 {
                    let ids = quad.map(|p| builder.point(p));
                    out.polys.insert_next_cell(&ids);
                    sources.push(leaf);
                }
            }
        }
        out.points = builder.points;

        let global: Option<Vec<usize>> = leaves
            .iter()
            .map(|(tree, node, _, _)| grid.tree(*tree).and_then(|t| t.global_index(*node)))
            .collect();
        let tuples = grid.cell_data.number_of_tuples();
        if let Some(global) = global.filter(|g| g.iter().all(|&i| i < tuples)) {
            let ids: Vec<usize> = sources.iter().map(|&leaf| global[leaf]).collect();
            out.cell_data = grid.cell_data.extract(&ids);
        }
        tracing::debug!(
            leaves = leaves.len(),
            polygons = out.polys.number_of_cells(),
            "hyper tree grid geometry"
        );
        Ok(out)
    }
}

impl Algorithm for HyperTreeGridGeometry {
    fn name(&self) -> &'static str {
        "HyperTreeGridGeometry"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::HyperTreeGrid
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let grid = ctx
            .input(0)?
            .as_hyper_tree_grid()
            .ok_or_else(|| Error::pipeline("expected a hyper tree grid"))?;
        let out = self.extract(grid)?;
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DataArray;
    use crate::math;

    fn area(out: &PolyData) -> f64 {
        out.triangles()
            .iter()
            .map(|(t, _)| {
                let [a, b, c] = t.map(|i| out.points.get(i));
                0.5 * math::norm(math::cross(math::sub(b, a), math::sub(c, a)))
            })
            .sum()
    }

    #[test]
    fn quadtree_leaves_become_quads() {
        let mut grid = HyperTreeGrid::new([2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0]).unwrap();
        let root = grid.cursor(0).unwrap();
        root.set_global_index_start(&mut grid, 0).unwrap();
        root.subdivide_leaf(&mut grid).unwrap();
        let mut child = root.clone();
        child.to_child(&grid, 1).unwrap();
        child.set_mask(&mut grid, true).unwrap();
        let other = grid.cursor(1).unwrap();
        other.set_global_index_start(&mut grid, 5).unwrap();
        grid.cell_data.add_array(DataArray::scalars("level", vec![0i32, 1, 1, 1, 1, 0]));

        let out = HyperTreeGridGeometry::new().extract(&grid).unwrap();
        assert_eq!(out.polys.number_of_cells(), 4);
        assert!((area(&out) - 1.75).abs() < 1e-12);
        // shared corners are merged
        assert_eq!(out.number_of_points(), 11);
        let level = out.cell_data.get("level").unwrap();
        assert_eq!(level.values_as_f64(), vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn octree_boundary_hides_shared_faces() {
        let mut grid = HyperTreeGrid::new([2, 1, 1], [0.0; 3], [2.0, 1.0, 1.0]).unwrap();
        grid.cursor(0).unwrap();
        grid.cursor(1).unwrap();
        let out = HyperTreeGridGeometry::new().extract(&grid).unwrap();
        // two unit cubes sharing one face
        assert_eq!(out.polys.number_of_cells(), 10);
        assert!((area(&out) - 10.0).abs() < 1e-12);
        assert!(out.cell_data.is_empty());

        let mut refined = grid.clone();
        let root = refined.cursor(0).unwrap();
        root.subdivide_leaf(&mut refined).unwrap();
        let out = HyperTreeGridGeometry::new().extract(&refined).unwrap();
        // 8 children expose 4 small faces on each of 5 outer sides, the
        // interface keeps both the big face and 4 small ones
        assert_eq!(out.polys.number_of_cells(), 5 + 20 + 1 + 4);
    }
}
