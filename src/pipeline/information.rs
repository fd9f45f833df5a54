use crate::data::{Association, DataKind, Extent};

/// Part of an unstructured dataset: `index` of `count` pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{}/{}", index, count)]
pub struct Piece {
    pub index: usize,
    pub count: usize,
}

impl Default for Piece {
    fn default() -> Self {
        Self { index: 0, count: 1 }
    }
}

impl Piece {
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    pub fn is_whole(&self) -> bool {
        self.count <= 1
    }

    /// The sub-range of `0..len` covered by this piece.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let count = self.count.max(1);
        let index = self.index.min(count - 1);
        (len * index / count)..(len * (index + 1) / count)
    }

    /// The slab of `extent` covered by this piece, cut along the axis with the most
    /// cells. Neighbouring slabs share one layer of points. `None` when the piece
    /// gets no cells.
    pub fn slab(&self, extent: &Extent) -> Option<Extent> {
        let cells = |a: usize| (extent[2 * a + 1] - extent[2 * a]).max(0) as usize;
        let axis = (0..3).max_by_key(|&a| cells(a)).unwrap_or(0);
        if self.is_whole() {
            return Some(*extent);
        }
        let range = self.range(cells(axis));
        if range.is_empty() {
            return None;
        }
        let mut slab = *extent;
        slab[2 * axis] = extent[2 * axis] + range.start as i32;
        slab[2 * axis + 1] = extent[2 * axis] + range.end as i32;
        Some(slab)
    }
}

/// What downstream asks an output port to produce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    /// structured extent, `None` for the whole extent
    pub extent: Option<Extent>,
    pub piece: Piece,
    pub time: Option<f64>,
}

impl UpdateRequest {
    pub fn whole() -> Self {
        Self::default()
    }

    pub fn extent(extent: Extent) -> Self {
        Self {
            extent: Some(extent),
            ..Default::default()
        }
    }

    pub fn piece(index: usize, count: usize) -> Self {
        Self {
            piece: Piece::new(index, count),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

/// Metadata about one array available on an output port.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInformation {
    pub name: String,
    pub association: Association,
    pub components: usize,
    pub range: Option<[f64; 2]>,
}

/// Metadata an output port publishes during the information pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Information {
    pub data_kind: Option<DataKind>,
    pub whole_extent: Option<Extent>,
    pub time_steps: Vec<f64>,
    pub arrays: Vec<ArrayInformation>,
    /// the producer can generate any requested sub-extent or piece
    pub can_stream: bool,
}

impl Information {
    pub fn of_kind(kind: DataKind) -> Self {
        Self {
            data_kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn array(&self, name: &str) -> Option<&ArrayInformation> {
        self.arrays.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pieces_partition() {
        let ranges: Vec<_> = (0..3).map(|i| Piece::new(i, 3).range(10)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
        assert_eq!(Piece::default().range(7), 0..7);
        assert_eq!(Piece::new(2, 4).to_string(), "2/4");
    }

    #[test]
    fn slabs_follow_the_longest_axis() {
        let extent = [0, 2, 0, 6, 1, 1];
        assert_eq!(Piece::new(0, 2).slab(&extent), Some([0, 2, 0, 3, 1, 1]));
        assert_eq!(Piece::new(1, 2).slab(&extent), Some([0, 2, 3, 6, 1, 1]));
        assert_eq!(Piece::default().slab(&extent), Some(extent));
        assert_eq!(Piece::new(0, 4).slab(&[0, 2, 0, 0, 0, 0]), None);
        assert_eq!(Piece::new(3, 4).slab(&[0, 2, 0, 0, 0, 0]), Some([1, 2, 0, 0, 0, 0]));
    }
}
