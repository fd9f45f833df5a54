use super::{Algorithm, ArrayInformation, ExecutionContext, Information, Piece};
use crate::data::{intersect_extents, Association, DataKind, DataObject};
use crate::object::{Object, Observable};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::sync::Arc;

/// Source node that hands an existing dataset to the pipeline.
///
/// Image data is cropped to the requested extent; polydata and unstructured grids
/// are split into the requested piece.
#[derive(Debug)]
pub struct TrivialProducer {
    object: Object,
    data: Arc<DataObject>,
}

impl_observable!(TrivialProducer);

impl TrivialProducer {
    pub fn new(data: impl Into<DataObject>) -> Self {
        Self {
            object: Object::new(),
            data: Arc::new(data.into()),
        }
    }

    pub fn shared(data: Arc<DataObject>) -> Self {
        Self {
            object: Object::new(),
            data,
        }
    }

    pub fn data(&self) -> &DataObject {
        &self.data
    }

    /// kind of the wrapped dataset
    pub fn kind(&self) -> DataKind {
        self.data.kind()
    }

    /// Replace the dataset; the next update re-executes downstream nodes.
    pub fn set_data(&mut self, data: impl Into<DataObject>) {
        self.data = Arc::new(data.into());
        self.modified();
    }
}

/// Metadata of the arrays attached to a dataset.
pub(crate) fn array_information(data: &DataObject) -> Vec<ArrayInformation> {
    let mut out = Vec::new();
    for association in [Association::Points, Association::Cells] {
        if let Some(attributes) = data.attributes(association) {
            for array in attributes.iter() {
                out.push(ArrayInformation {
                    name: array.name().unwrap_or_default().to_string(),
                    association,
                    components: array.number_of_components(),
                    range: array.range(0),
                });
            }
        }
    }
    if let Some(fields) = data.field_data() {
        for array in fields.iter() {
            out.push(ArrayInformation {
                name: array.name().unwrap_or_default().to_string(),
                association: Association::Field,
                components: array.number_of_components(),
                range: array.range(0),
            });
        }
    }
    out
}

impl Algorithm for TrivialProducer {
    fn name(&self) -> &'static str {
        "TrivialProducer"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        let info = &mut outputs[0];
        *info = Information::of_kind(self.data.kind());
        info.whole_extent = self.data.as_image().map(|image| image.extent);
        info.arrays = array_information(&self.data);
        info.can_stream = true;
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let request = ctx.request().clone();
        let out = match (&*self.data, request.extent) {
            (DataObject::Image(image), Some(extent)) => {
                let clipped = intersect_extents(&image.extent, &extent)
                    .ok_or_else(|| Error::out_of_bounds(format!("requested extent {extent:?} is outside {:?}", image.extent)))?;
                DataObject::Image(image.crop(&clipped)?)
            }
            (data, _) => extract_piece(data, request.piece),
        };
        ctx.set_output(0, out)
    }
}

/// The cells of piece `piece` of an unstructured dataset. Other datasets, and whole
/// pieces, are returned unchanged.
pub fn extract_piece(data: &DataObject, piece: Piece) -> DataObject {
    if piece.is_whole() {
        return data.clone();
    }
    match data {
        DataObject::PolyData(poly) => {
            let ids: Vec<usize> = piece.range(poly.number_of_cells()).collect();
            DataObject::PolyData(poly.extract_cells(&ids))
        }
        DataObject::Unstructured(grid) => {
            let ids: Vec<usize> = piece.range(grid.number_of_cells()).collect();
            DataObject::Unstructured(grid.extract_cells(&ids))
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellType, ImageData, Points, UnstructuredGrid};
    use crate::pipeline::{Pipeline, UpdateRequest};

    fn strip_of_tets(n: usize) -> UnstructuredGrid {
        let mut points = Vec::new();
        for i in 0..=n {
            points.push([i as f64, 0.0, 0.0]);
            points.push([i as f64, 1.0, 0.0]);
            points.push([i as f64, 0.0, 1.0]);
        }
        let mut grid = UnstructuredGrid::with_points(Points::from_vec(points));
        for i in 0..n {
            let b = 3 * i;
            grid.insert_next_cell(CellType::Tetra, &[b, b + 1, b + 2, b + 3]).unwrap();
        }
        grid
    }

    #[test]
    fn pieces_cover_all_cells() {
        let grid = strip_of_tets(10);
        let mut p = Pipeline::new();
        let src = p.add(TrivialProducer::new(grid));
        let mut total = 0;
        for index in 0..3 {
            p.update_with(src, 0, UpdateRequest::piece(index, 3)).unwrap();
            let piece = p.output(src, 0).unwrap();
            piece.validate().unwrap();
            total += piece.number_of_cells();
        }
        assert_eq!(total, 10);
    }

    #[test]
    fn images_are_cropped_to_the_request() {
        let image = ImageData::with_dimensions([5, 5, 5], [0.0; 3], [1.0; 3]);
        let mut p = Pipeline::new();
        let src = p.add(TrivialProducer::new(image));
        p.update_information(src).unwrap();
        assert_eq!(p.information(src, 0).unwrap().whole_extent, Some([0, 4, 0, 4, 0, 4]));
        p.update_with(src, 0, UpdateRequest::extent([1, 2, 0, 4, 0, 0])).unwrap();
        let out = p.output(src, 0).unwrap();
        assert_eq!(out.as_image().unwrap().extent, [1, 2, 0, 4, 0, 0]);
        assert_eq!(out.number_of_points(), 10);
    }
}
