use crate::{Error, Result};

use std::convert::TryFrom;

/// Cell type tags, numbered as in the VTK file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CellType {
    Empty = 0,
    Vertex = 1,
    PolyVertex = 2,
    Line = 3,
    PolyLine = 4,
    Triangle = 5,
    TriangleStrip = 6,
    Polygon = 7,
    Pixel = 8,
    Quad = 9,
    Tetra = 10,
    Voxel = 11,
    Hexahedron = 12,
    Wedge = 13,
    Pyramid = 14,
    PentagonalPrism = 15,
    HexagonalPrism = 16,
    QuadraticEdge = 21,
    QuadraticTriangle = 22,
    QuadraticQuad = 23,
    QuadraticTetra = 24,
    QuadraticHexahedron = 25,
    QuadraticWedge = 26,
    QuadraticPyramid = 27,
    Polyhedron = 42,
}

impl CellType {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// fixed number of points, `None` for variable sized cells
    pub fn number_of_points(&self) -> Option<usize> {
        let n = match self {
            Self::Empty => 0,
            Self::Vertex => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Pixel | Self::Quad | Self::Tetra => 4,
            Self::Pyramid => 5,
            Self::Wedge => 6,
            Self::Voxel | Self::Hexahedron => 8,
            Self::PentagonalPrism => 10,
            Self::HexagonalPrism => 12,
            Self::QuadraticEdge => 3,
            Self::QuadraticTriangle => 6,
            Self::QuadraticQuad => 8,
            Self::QuadraticTetra => 10,
            Self::QuadraticHexahedron => 20,
            Self::QuadraticWedge => 15,
            Self::QuadraticPyramid => 13,
            Self::PolyVertex | Self::PolyLine | Self::TriangleStrip | Self::Polygon | Self::Polyhedron => {
                return None
            }
        };
        Some(n)
    }

    /// topological dimension
    pub fn dimension(&self) -> usize {
        match self {
            Self::Empty | Self::Vertex | Self::PolyVertex => 0,
            Self::Line | Self::PolyLine | Self::QuadraticEdge => 1,
            Self::Triangle
            | Self::TriangleStrip
            | Self::Polygon
            | Self::Pixel
            | Self::Quad
            | Self::QuadraticTriangle
            | Self::QuadraticQuad => 2,
            _ => 3,
        }
    }

    /// tetra, voxel, hexahedron, wedge or pyramid
    pub fn is_linear_3d(&self) -> bool {
        matches!(
            self,
            Self::Tetra | Self::Voxel | Self::Hexahedron | Self::Wedge | Self::Pyramid
        )
    }

    pub fn is_linear(&self) -> bool {
        (self.id() as u32) < 21 || *self == Self::Polyhedron
    }

    /// Edges of a fixed-size linear cell as pairs of local point indices.
    pub fn edges(&self) -> &'static [[usize; 2]] {
        match self {
            Self::Line => &[[0, 1]],
            Self::Triangle => &[[0, 1], [1, 2], [2, 0]],
            Self::Quad => &[[0, 1], [1, 2], [2, 3], [3, 0]],
            Self::Pixel => &[[0, 1], [1, 3], [3, 2], [2, 0]],
            Self::Tetra => &[[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]],
            Self::Voxel => &[
                [0, 1], [1, 3], [2, 3], [0, 2], [4, 5], [5, 7], [6, 7], [4, 6], [0, 4], [1, 5],
                [2, 6], [3, 7],
            ],
            Self::Hexahedron => &[
                [0, 1], [1, 2], [3, 2], [0, 3], [4, 5], [5, 6], [7, 6], [4, 7], [0, 4], [1, 5],
                [3, 7], [2, 6],
            ],
            Self::Wedge => &[[0, 1], [1, 2], [2, 0], [3, 4], [4, 5], [5, 3], [0, 3], [1, 4], [2, 5]],
            Self::Pyramid => &[[0, 1], [1, 2], [2, 3], [3, 0], [0, 4], [1, 4], [2, 4], [3, 4]],
            _ => &[],
        }
    }

    /// Faces of a linear 3D cell, ordered so that the normal points outwards.
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            Self::Tetra => &[&[0, 1, 3], &[1, 2, 3], &[2, 0, 3], &[0, 2, 1]],
            Self::Voxel => &[
                &[0, 4, 6, 2],
                &[1, 3, 7, 5],
                &[0, 1, 5, 4],
                &[2, 6, 7, 3],
                &[0, 2, 3, 1],
                &[4, 5, 7, 6],
            ],
            Self::Hexahedron => &[
                &[0, 4, 7, 3],
                &[1, 2, 6, 5],
                &[0, 1, 5, 4],
                &[3, 7, 6, 2],
                &[0, 3, 2, 1],
                &[4, 5, 6, 7],
            ],
            Self::Wedge => &[&[0, 1, 2], &[3, 5, 4], &[0, 3, 4, 1], &[1, 4, 5, 2], &[2, 5, 3, 0]],
            Self::Pyramid => &[&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]],
            _ => &[],
        }
    }
}

impl TryFrom<u8> for CellType {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        let ty = match id {
            0 => Self::Empty,
            1 => Self::Vertex,
            2 => Self::PolyVertex,
            3 => Self::Line,
            4 => Self::PolyLine,
            5 => Self::Triangle,
            6 => Self::TriangleStrip,
            7 => Self::Polygon,
            8 => Self::Pixel,
            9 => Self::Quad,
            10 => Self::Tetra,
            11 => Self::Voxel,
            12 => Self::Hexahedron,
            13 => Self::Wedge,
            14 => Self::Pyramid,
            15 => Self::PentagonalPrism,
            16 => Self::HexagonalPrism,
            21 => Self::QuadraticEdge,
            22 => Self::QuadraticTriangle,
            23 => Self::QuadraticQuad,
            24 => Self::QuadraticTetra,
            25 => Self::QuadraticHexahedron,
            26 => Self::QuadraticWedge,
            27 => Self::QuadraticPyramid,
            42 => Self::Polyhedron,
            other => return Err(Error::invalid_argument(format!("unknown cell type {other}"))),
        };
        Ok(ty)
    }
}

impl TryFrom<i64> for CellType {
    type Error = Error;

    fn try_from(id: i64) -> Result<Self> {
        u8::try_from(id)
            .map_err(|_| Error::invalid_argument(format!("unknown cell type {id}")))
            .and_then(CellType::try_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for id in 0u8..50 {
            if let Ok(ty) = CellType::try_from(id) {
                assert_eq!(ty.id(), id);
            }
        }
        assert!(CellType::try_from(17u8).is_err());
    }

    #[test]
    fn linear_3d_shapes() {
        for ty in [CellType::Tetra, CellType::Voxel, CellType::Hexahedron, CellType::Wedge, CellType::Pyramid] {
            assert!(ty.is_linear_3d());
            assert_eq!(ty.dimension(), 3);
            let n = ty.number_of_points().unwrap();
            // Euler: V - E + F = 2
            assert_eq!(n as i64 - ty.edges().len() as i64 + ty.faces().len() as i64, 2);
        }
    }
}
