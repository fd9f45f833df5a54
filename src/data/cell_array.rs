use crate::{Error, Result};

/// Cell connectivity stored as offsets into a flat connectivity list.
///
/// Cell `i` is `connectivity[offsets[i]..offsets[i + 1]]`; `offsets` always starts with
/// a zero and holds one more entry than there are cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellArray {
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
}

impl Default for CellArray {
    fn default() -> Self {
        Self::new()
    }
}

impl CellArray {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            connectivity: Vec::new(),
        }
    }

    pub fn with_capacity(cells: usize, connectivity: usize) -> Self {
        let mut offsets = Vec::with_capacity(cells + 1);
        offsets.push(0);
        Self {
            offsets,
            connectivity: Vec::with_capacity(connectivity),
        }
    }

    /// Build from separate offsets and connectivity (the layout of legacy 5.1 and XML).
    pub fn from_offsets(offsets: Vec<usize>, connectivity: Vec<usize>) -> Result<Self> {
        let offsets = if offsets.first() == Some(&0) {
            offsets
        } else {
            // XML files store only the end offsets
            std::iter::once(0).chain(offsets).collect()
        };
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::file_format("cell offsets must be non-decreasing"));
        }
        if offsets.last().copied().unwrap_or(0) != connectivity.len() {
            return Err(Error::file_format(format!(
                "last cell offset {} does not match connectivity length {}",
                offsets.last().copied().unwrap_or(0),
                connectivity.len()
            )));
        }
        Ok(Self { offsets, connectivity })
    }

    /// Build from the interleaved `n, id0, .., idn-1, ...` layout of legacy 4.2 files.
    pub fn from_legacy(values: &[usize]) -> Result<Self> {
        let mut cells = Self::new();
        let mut i = 0;
        while i < values.len() {
            let n = values[i];
            let end = i + 1 + n;
            if end > values.len() {
                return Err(Error::file_format("truncated cell list"));
            }
            cells.insert_next_cell(&values[i + 1..end]);
            i = end;
        }
        Ok(cells)
    }

    /// Interleaved `n, ids...` layout.
    pub fn to_legacy(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.connectivity.len() + self.number_of_cells());
        for cell in self.iter() {
            out.push(cell.len());
            out.extend_from_slice(cell);
        }
        out
    }

    pub fn insert_next_cell(&mut self, ids: &[usize]) -> usize {
        self.connectivity.extend_from_slice(ids);
        self.offsets.push(self.connectivity.len());
        self.offsets.len() - 2
    }

    pub fn number_of_cells(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_cells() == 0
    }

    pub fn cell(&self, cell: usize) -> &[usize] {
        &self.connectivity[self.offsets[cell]..self.offsets[cell + 1]]
    }

    pub fn get(&self, cell: usize) -> Option<&[usize]> {
        if cell < self.number_of_cells() {
            Some(self.cell(cell))
        } else {
            None
        }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn connectivity(&self) -> &[usize] {
        &self.connectivity
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.connectivity[w[0]..w[1]])
    }

    /// largest referenced point id, if any
    pub fn max_point_id(&self) -> Option<usize> {
        self.connectivity.iter().copied().max()
    }

    /// Replace every point id through `map`.
    pub fn renumber(&mut self, map: &[usize]) {
        for id in self.connectivity.iter_mut() {
            *id = map[*id];
        }
    }

    /// append all cells of `other`, shifting its point ids by `point_offset`
    pub fn append(&mut self, other: &CellArray, point_offset: usize) {
        for cell in other.iter() {
            self.connectivity.extend(cell.iter().map(|id| id + point_offset));
            self.offsets.push(self.connectivity.len());
        }
    }
}
