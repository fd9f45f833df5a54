use super::{DataObject, FieldData};
use crate::math::{self, Bounds};

/// One slot of a [`MultiBlock`]; a slot may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub name: Option<String>,
    pub data: Option<DataObject>,
}

/// Ordered tree of datasets.
///
/// Nodes are addressed by a flat index: the root is 0 and every slot (leaf, nested
/// composite or empty) gets the next index in depth-first pre-order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiBlock {
    blocks: Vec<Block>,
    pub field_data: FieldData,
}

impl MultiBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, name: Option<&str>, data: impl Into<DataObject>) -> usize {
        self.blocks.push(Block {
            name: name.map(str::to_string),
            data: Some(data.into()),
        });
        self.blocks.len() - 1
    }

    /// Set slot `index`, growing the block list with empty slots if needed.
    pub fn set_block(&mut self, index: usize, data: Option<DataObject>) {
        if index >= self.blocks.len() {
            self.blocks.resize_with(index + 1, Block::default);
        }
        self.blocks[index].data = data;
    }

    pub fn number_of_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, index: usize) -> Option<&DataObject> {
        self.blocks.get(index).and_then(|b| b.data.as_ref())
    }

    pub fn block_mut(&mut self, index: usize) -> Option<&mut DataObject> {
        self.blocks.get_mut(index).and_then(|b| b.data.as_mut())
    }

    pub fn block_name(&self, index: usize) -> Option<&str> {
        self.blocks.get(index).and_then(|b| b.name.as_deref())
    }

    pub fn set_block_name(&mut self, index: usize, name: &str) {
        if let Some(b) = self.blocks.get_mut(index) {
            b.name = Some(name.to_string());
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Visit every slot in depth-first pre-order with its flat index.
    pub fn visit<'a, F: FnMut(usize, Option<&'a DataObject>)>(&'a self, f: &mut F) {
        let mut next = 1;
        self.visit_from(&mut next, f);
    }

    fn visit_from<'a, F: FnMut(usize, Option<&'a DataObject>)>(&'a self, next: &mut usize, f: &mut F) {
        for block in &self.blocks {
            let index = *next;
            *next += 1;
            f(index, block.data.as_ref());
            if let Some(DataObject::MultiBlock(child)) = &block.data {
                child.visit_from(next, f);
            }
        }
    }

    /// Non-composite datasets with their flat index.
    pub fn leaves(&self) -> Vec<(usize, &DataObject)> {
        let mut out = Vec::new();
        self.visit(&mut |index, data| {
            if let Some(data) = data {
                if !matches!(data, DataObject::MultiBlock(_)) {
                    out.push((index, data));
                }
            }
        });
        out
    }

    /// Node at a flat index; `None` for the root, empty slots and unknown indices.
    pub fn get_flat(&self, flat_index: usize) -> Option<&DataObject> {
        let mut found = None;
        self.visit(&mut |index, data| {
            if index == flat_index {
                found = data;
            }
        });
        found
    }

    /// number of flat indices, the root included
    pub fn number_of_flat_indices(&self) -> usize {
        let mut count = 1;
        self.visit(&mut |_, _| count += 1);
        count
    }

    pub fn number_of_points(&self) -> usize {
        self.leaves().iter().map(|(_, d)| d.number_of_points()).sum()
    }

    pub fn number_of_cells(&self) -> usize {
        self.leaves().iter().map(|(_, d)| d.number_of_cells()).sum()
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = math::empty_bounds();
        for (_, leaf) in self.leaves() {
            let b = leaf.bounds();
            if math::bounds_are_valid(&b) {
                math::grow_bounds(&mut bounds, [b[0], b[2], b[4]]);
                math::grow_bounds(&mut bounds, [b[1], b[3], b[5]]);
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PolyData;

    #[test]
    fn flat_indices_are_depth_first() {
        let mut inner = MultiBlock::new();
        inner.add_block(Some("c"), PolyData::new());
        inner.add_block(Some("d"), PolyData::new());

        let mut root = MultiBlock::new();
        root.add_block(Some("a"), PolyData::new());
        root.add_block(Some("inner"), inner);
        root.set_block(3, None);
        root.add_block(Some("e"), PolyData::new());

        // 0 root, 1 a, 2 inner, 3 c, 4 d, 5 empty slot 2, 6 empty slot 3, 7 e
        let leaves: Vec<usize> = root.leaves().iter().map(|(i, _)| *i).collect();
        assert_eq!(leaves, vec![1, 3, 4, 7]);
        assert_eq!(root.number_of_flat_indices(), 8);
        assert!(matches!(root.get_flat(2), Some(DataObject::MultiBlock(_))));
        assert!(root.get_flat(5).is_none());
    }
}
