use super::{extract_piece, Information, Piece, UpdateRequest};
use crate::data::{DataKind, DataObject};
use crate::Result;

use std::borrow::Cow;

/// Piece handling for filters that work cell by cell.
///
/// A piece request goes upstream when the input can cut it itself: as a slab extent
/// for images, as a cell range for poly data and unstructured grids. Otherwise the
/// whole input is requested and [`CellStreaming::cut`] takes the piece out of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellStreaming {
    local: Option<Piece>,
}

impl CellStreaming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests for every input connection, to return from
    /// [`Algorithm::request_update_extent`](super::Algorithm::request_update_extent).
    pub fn request_update_extent(&mut self, request: &UpdateRequest, inputs: &[Vec<Information>]) -> Vec<Vec<UpdateRequest>> {
        let upstream = self.upstream_request(request, inputs.first().and_then(|port| port.first()));
        inputs
            .iter()
            .map(|port| vec![upstream.clone(); port.len()])
            .collect()
    }

    fn upstream_request(&mut self, request: &UpdateRequest, info: Option<&Information>) -> UpdateRequest {
        let whole = UpdateRequest {
            time: request.time,
            ..UpdateRequest::whole()
        };
        self.local = None;
        if request.piece.is_whole() {
            return whole;
        }
        if let Some(info) = info.filter(|info| info.can_stream) {
            match (info.data_kind, info.whole_extent) {
                (Some(DataKind::Image), Some(extent)) => {
                    if let Some(slab) = request.piece.slab(&extent) {
                        return UpdateRequest {
                            extent: Some(slab),
                            ..whole
                        };
                    }
                }
                (Some(DataKind::PolyData | DataKind::Unstructured), _) => {
                    return UpdateRequest {
                        piece: request.piece,
                        ..whole
                    };
                }
                _ => {}
            }
        }
        tracing::trace!(piece = %request.piece, "input cannot stream, cutting the piece locally");
        self.local = Some(request.piece);
        whole
    }

    /// The part of `input` to process. `None` when the piece holds no cells.
    ///
    /// Datasets that cannot be split go whole to piece 0.
    pub fn cut<'a>(&self, input: &'a DataObject) -> Result<Option<Cow<'a, DataObject>>> {
        let Some(piece) = self.local else {
            return Ok(Some(Cow::Borrowed(input)));
        };
        let part = match input {
            DataObject::Image(image) => match piece.slab(&image.extent) {
                Some(slab) => Some(DataObject::Image(image.crop(&slab)?)),
                None => None,
            },
            DataObject::PolyData(_) | DataObject::Unstructured(_) => Some(extract_piece(input, piece)),
            other if piece.index == 0 => Some(other.clone()),
            _ => None,
        };
        Ok(part.map(Cow::Owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ImageData, PolyData};

    #[test]
    fn streaming_inputs_receive_the_piece() {
        let mut streaming = CellStreaming::new();
        let mut image = Information::of_kind(DataKind::Image);
        image.whole_extent = Some([0, 4, 0, 4, 0, 8]);
        image.can_stream = true;
        let requests = streaming.request_update_extent(&UpdateRequest::piece(1, 2), &[vec![image]]);
        assert_eq!(requests[0][0].extent, Some([0, 4, 0, 4, 4, 8]));
        assert!(requests[0][0].piece.is_whole());

        let mut poly = Information::of_kind(DataKind::PolyData);
        poly.can_stream = true;
        let requests = streaming.request_update_extent(&UpdateRequest::piece(1, 2), &[vec![poly]]);
        assert_eq!(requests[0][0].piece, Piece::new(1, 2));
        let data = DataObject::from(PolyData::new());
        assert!(matches!(streaming.cut(&data).unwrap(), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn other_inputs_are_cut_locally() {
        let mut streaming = CellStreaming::new();
        let info = Information::of_kind(DataKind::Image);
        let requests = streaming.request_update_extent(&UpdateRequest::piece(0, 2), &[vec![info]]);
        assert_eq!(requests[0][0], UpdateRequest::whole());

        let image = DataObject::from(ImageData::with_dimensions([3, 3, 5], [0.0; 3], [1.0; 3]));
        let part = streaming.cut(&image).unwrap().unwrap();
        assert_eq!(part.as_image().unwrap().extent, [0, 2, 0, 2, 0, 2]);
    }
}
