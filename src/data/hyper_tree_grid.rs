//! Grids of octrees (3D) or quadtrees (2D) with binary refinement.
//!
//! The grid owns every tree and every tree owns a flat arena of nodes. Cursors only
//! hold indices into that arena and are handed the grid on each call.

use super::DataSetAttributes;
use crate::math::{self, Bounds, Vec3};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
struct Node {
    parent: Option<usize>,
    /// index of the first of `number_of_children` consecutive nodes
    first_child: Option<usize>,
    level: usize,
    masked: bool,
    global_index: Option<usize>,
}

/// One refinement tree of a [`HyperTreeGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct HyperTree {
    nodes: Vec<Node>,
    global_index_start: Option<usize>,
}

impl HyperTree {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                first_child: None,
                level: 0,
                masked: false,
                global_index: None,
            }],
            global_index_start: None,
        }
    }

    pub fn number_of_vertices(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.first_child.is_none()).count()
    }

    pub fn number_of_levels(&self) -> usize {
        self.nodes.iter().map(|n| n.level + 1).max().unwrap_or(0)
    }

    /// Number every node of this tree `offset + local index`.
    pub fn set_global_index_start(&mut self, offset: usize) {
        self.global_index_start = Some(offset);
    }

    pub fn global_index_start(&self) -> Option<usize> {
        self.global_index_start
    }

    /// global index of a local node: explicit if set, otherwise start + local index
    pub fn global_index(&self, local: usize) -> Option<usize> {
        self.nodes
            .get(local)
            .and_then(|n| n.global_index)
            .or_else(|| self.global_index_start.map(|s| s + local))
    }
}

/// Structured grid of refinement trees.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperTreeGrid {
    dimension: usize,
    /// trees per axis
    cell_dims: [usize; 3],
    coordinates: [Vec<f64>; 3],
    trees: Vec<Option<HyperTree>>,
    has_mask: bool,
    /// arrays indexed by global node index
    pub cell_data: DataSetAttributes,
}

impl HyperTreeGrid {
    /// Uniform grid of `cell_dims` trees. Axes with zero or one tree and a zero
    /// extent (`size` component 0) are flattened, giving a 2D grid of quadtrees.
    pub fn new(cell_dims: [usize; 3], origin: Vec3, size: Vec3) -> Result<Self> {
        let mut coordinates: [Vec<f64>; 3] = Default::default();
        let mut dimension = 0;
        for axis in 0..3 {
            if cell_dims[axis] == 0 {
                return Err(Error::invalid_argument("a hyper tree grid needs at least one tree per axis"));
            }
            if size[axis] > 0.0 {
                dimension += 1;
                let n = cell_dims[axis];
                coordinates[axis] = (0..=n)
                    .map(|i| origin[axis] + size[axis] * i as f64 / n as f64)
                    .collect();
            } else {
                if cell_dims[axis] != 1 {
                    return Err(Error::invalid_argument("a flat axis can hold only one tree"));
                }
                coordinates[axis] = vec![origin[axis]];
            }
        }
        if dimension < 2 {
            return Err(Error::invalid_argument("hyper tree grids are 2D or 3D"));
        }
        let count = cell_dims.iter().product();
        Ok(Self {
            dimension,
            cell_dims,
            coordinates,
            trees: vec![None; count],
            has_mask: false,
            cell_data: DataSetAttributes::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn number_of_children(&self) -> usize {
        1 << self.dimension
    }

    pub fn cell_dims(&self) -> [usize; 3] {
        self.cell_dims
    }

    pub fn max_number_of_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree(&self, index: usize) -> Option<&HyperTree> {
        self.trees.get(index).and_then(|t| t.as_ref())
    }

    pub fn tree_mut(&mut self, index: usize) -> Option<&mut HyperTree> {
        self.trees.get_mut(index).and_then(|t| t.as_mut())
    }

    /// indices of the trees that exist
    pub fn tree_indices(&self) -> Vec<usize> {
        (0..self.trees.len()).filter(|i| self.trees[*i].is_some()).collect()
    }

    pub fn has_mask(&self) -> bool {
        self.has_mask
    }

    pub fn number_of_vertices(&self) -> usize {
        self.trees.iter().flatten().map(HyperTree::number_of_vertices).sum()
    }

    pub fn number_of_leaves(&self) -> usize {
        self.trees.iter().flatten().map(HyperTree::number_of_leaves).sum()
    }

    /// origin and size of tree `index`
    pub fn tree_box(&self, index: usize) -> (Vec3, Vec3) {
        let i = index % self.cell_dims[0];
        let j = (index / self.cell_dims[0]) % self.cell_dims[1];
        let k = index / (self.cell_dims[0] * self.cell_dims[1]);
        let ijk = [i, j, k];
        let mut origin = [0.0; 3];
        let mut size = [0.0; 3];
        for axis in 0..3 {
            let c = &self.coordinates[axis];
            origin[axis] = c[ijk[axis].min(c.len() - 1)];
            size[axis] = if c.len() > 1 {
                c[ijk[axis] + 1] - c[ijk[axis]]
            } else {
                0.0
            };
        }
        (origin, size)
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = math::empty_bounds();
        for axis in 0..3 {
            if let (Some(lo), Some(hi)) = (self.coordinates[axis].first(), self.coordinates[axis].last()) {
                bounds[2 * axis] = *lo;
                bounds[2 * axis + 1] = *hi;
            }
        }
        bounds
    }

    /// `Initialize(htg, treeIndex)`: a cursor on the root of tree `index`, creating
    /// the tree if it does not exist yet.
    pub fn cursor(&mut self, index: usize) -> Result<HyperTreeCursor> {
        if index >= self.trees.len() {
            return Err(Error::out_of_bounds(format!(
                "tree {index} of {}",
                self.trees.len()
            )));
        }
        if self.trees[index].is_none() {
            self.trees[index] = Some(HyperTree::new());
        }
        let (origin, size) = self.tree_box(index);
        Ok(HyperTreeCursor {
            tree: index,
            path: vec![(0, origin, size)],
        })
    }

    /// Every unmasked leaf as `(tree, local node, origin, size)`.
    pub fn visible_leaves(&self) -> Vec<(usize, usize, Vec3, Vec3)> {
        let mut out = Vec::new();
        for index in self.tree_indices() {
            let (origin, size) = self.tree_box(index);
            self.collect_leaves(index, 0, origin, size, &mut out);
        }
        out
    }

    fn collect_leaves(&self, tree: usize, node: usize, origin: Vec3, size: Vec3, out: &mut Vec<(usize, usize, Vec3, Vec3)>) {
        let Some(t) = self.tree(tree) else { return };
        let n = &t.nodes[node];
        if n.masked {
            return;
        }
        match n.first_child {
            None => out.push((tree, node, origin, size)),
            Some(first) => {
                for c in 0..self.number_of_children() {
                    let (o, s) = self.child_box(origin, size, c);
                    self.collect_leaves(tree, first + c, o, s, out);
                }
            }
        }
    }

    fn child_box(&self, origin: Vec3, size: Vec3, child: usize) -> (Vec3, Vec3) {
        let mut o = origin;
        let mut s = size;
        let mut bit = 0;
        for axis in 0..3 {
            if size[axis] > 0.0 {
                s[axis] = size[axis] * 0.5;
                if child & (1 << bit) != 0 {
                    o[axis] += s[axis];
                }
                bit += 1;
            }
        }
        (o, s)
    }

    fn node(&self, tree: usize, node: usize) -> Result<&Node> {
        self.tree(tree)
            .and_then(|t| t.nodes.get(node))
            .ok_or_else(|| Error::out_of_bounds(format!("node {node} of tree {tree}")))
    }

    fn node_mut(&mut self, tree: usize, node: usize) -> Result<&mut Node> {
        self.tree_mut(tree)
            .and_then(|t| t.nodes.get_mut(node))
            .ok_or_else(|| Error::out_of_bounds(format!("node {node} of tree {tree}")))
    }
}

/// Non-oriented cursor: a path of `(node, origin, size)` from the root of one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperTreeCursor {
    tree: usize,
    path: Vec<(usize, Vec3, Vec3)>,
}

impl HyperTreeCursor {
    fn current(&self) -> (usize, Vec3, Vec3) {
        // the path always holds the root
        self.path[self.path.len() - 1]
    }

    pub fn tree_index(&self) -> usize {
        self.tree
    }

    /// local index of the current node inside its tree
    pub fn vertex_id(&self) -> usize {
        self.current().0
    }

    pub fn level(&self) -> usize {
        self.path.len() - 1
    }

    pub fn is_root(&self) -> bool {
        self.path.len() == 1
    }

    pub fn origin(&self) -> Vec3 {
        self.current().1
    }

    pub fn size(&self) -> Vec3 {
        self.current().2
    }

    pub fn is_leaf(&self, grid: &HyperTreeGrid) -> Result<bool> {
        Ok(grid.node(self.tree, self.vertex_id())?.first_child.is_none())
    }

    pub fn is_masked(&self, grid: &HyperTreeGrid) -> Result<bool> {
        Ok(grid.node(self.tree, self.vertex_id())?.masked)
    }

    pub fn set_mask(&self, grid: &mut HyperTreeGrid, masked: bool) -> Result<()> {
        grid.node_mut(self.tree, self.vertex_id())?.masked = masked;
        if masked {
            grid.has_mask = true;
        }
        Ok(())
    }

    /// Refine the current leaf into `2^dimension` children.
    pub fn subdivide_leaf(&self, grid: &mut HyperTreeGrid) -> Result<()> {
        let children = grid.number_of_children();
        let node_id = self.vertex_id();
        let node = grid.node(self.tree, node_id)?;
        if node.first_child.is_some() {
            return Err(Error::invalid_argument("only leaves can be subdivided"));
        }
        if node.masked {
            return Err(Error::invalid_argument("a masked leaf cannot be subdivided"));
        }
        let level = node.level + 1;
        let tree = grid
            .tree_mut(self.tree)
            .ok_or_else(|| Error::out_of_bounds(format!("tree {}", self.tree)))?;
        let first = tree.nodes.len();
        for _ in 0..children {
            tree.nodes.push(Node {
                parent: Some(node_id),
                first_child: None,
                level,
                masked: false,
                global_index: None,
            });
        }
        tree.nodes[node_id].first_child = Some(first);
        Ok(())
    }

    pub fn to_child(&mut self, grid: &HyperTreeGrid, child: usize) -> Result<()> {
        if child >= grid.number_of_children() {
            return Err(Error::out_of_bounds(format!(
                "child {child} of {}",
                grid.number_of_children()
            )));
        }
        let (node, origin, size) = self.current();
        let first = grid
            .node(self.tree, node)?
            .first_child
            .ok_or_else(|| Error::invalid_argument("cannot descend from a leaf"))?;
        let (o, s) = grid.child_box(origin, size, child);
        self.path.push((first + child, o, s));
        Ok(())
    }

    pub fn to_parent(&mut self) -> Result<()> {
        if self.is_root() {
            return Err(Error::invalid_argument("the root has no parent"));
        }
        self.path.pop();
        Ok(())
    }

    pub fn to_root(&mut self) {
        self.path.truncate(1);
    }

    /// `GetGlobalNodeIndex()`
    pub fn global_node_index(&self, grid: &HyperTreeGrid) -> Option<usize> {
        grid.tree(self.tree).and_then(|t| t.global_index(self.vertex_id()))
    }

    /// `SetGlobalIndexFromLocal(i)`: explicit global index of the current node.
    pub fn set_global_index_from_local(&self, grid: &mut HyperTreeGrid, index: usize) -> Result<()> {
        grid.node_mut(self.tree, self.vertex_id())?.global_index = Some(index);
        Ok(())
    }

    /// `SetGlobalIndexStart(offset)` on the cursor's tree.
    pub fn set_global_index_start(&self, grid: &mut HyperTreeGrid, offset: usize) -> Result<()> {
        grid.tree_mut(self.tree)
            .ok_or_else(|| Error::out_of_bounds(format!("tree {}", self.tree)))?
            .set_global_index_start(offset);
        Ok(())
    }

    /// parent of the current node, if any, as stored in the tree
    pub fn parent_vertex_id(&self, grid: &HyperTreeGrid) -> Result<Option<usize>> {
        Ok(grid.node(self.tree, self.vertex_id())?.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadtree_grid() -> HyperTreeGrid {
        HyperTreeGrid::new([2, 1, 1], [0.0; 3], [2.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn subdivide_and_navigate() {
        let mut grid = quadtree_grid();
        assert_eq!(grid.dimension(), 2);
        let mut cursor = grid.cursor(0).unwrap();
        cursor.subdivide_leaf(&mut grid).unwrap();
        assert!(!cursor.is_leaf(&grid).unwrap());
        cursor.to_child(&grid, 3).unwrap();
        assert_eq!(cursor.level(), 1);
        assert_eq!(cursor.origin(), [0.5, 0.5, 0.0]);
        assert_eq!(cursor.size(), [0.5, 0.5, 0.0]);
        cursor.subdivide_leaf(&mut grid).unwrap();
        cursor.to_parent().unwrap();
        assert!(cursor.to_parent().is_err());

        assert_eq!(grid.tree(0).unwrap().number_of_vertices(), 9);
        assert_eq!(grid.number_of_leaves(), 7);
        assert_eq!(grid.tree(0).unwrap().number_of_levels(), 3);
    }

    #[test]
    fn global_indices_explicit_or_offset() {
        let mut grid = quadtree_grid();
        let c0 = grid.cursor(0).unwrap();
        c0.set_global_index_start(&mut grid, 100).unwrap();
        c0.subdivide_leaf(&mut grid).unwrap();
        let mut c = c0.clone();
        c.to_child(&grid, 2).unwrap();
        assert_eq!(c.global_node_index(&grid), Some(103));

        let c1 = grid.cursor(1).unwrap();
        assert_eq!(c1.global_node_index(&grid), None);
        c1.set_global_index_from_local(&mut grid, 7).unwrap();
        assert_eq!(c1.global_node_index(&grid), Some(7));
    }

    #[test]
    fn masked_leaf_is_not_subdivided() {
        let mut grid = quadtree_grid();
        let cursor = grid.cursor(1).unwrap();
        cursor.set_mask(&mut grid, true).unwrap();
        assert!(grid.has_mask());
        assert!(matches!(cursor.subdivide_leaf(&mut grid), Err(Error::InvalidArgument(_))));

        let root = grid.cursor(0).unwrap();
        root.subdivide_leaf(&mut grid).unwrap();
        // four leaves of tree 0; tree 1 is masked
        assert_eq!(grid.visible_leaves().len(), 4);
    }
}
