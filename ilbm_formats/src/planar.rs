//! Bitplane layout transforms.
//!
//! Amiga bitplanes store one bit per pixel per plane, most significant bit
//! first. Every plane row is padded to a 16-bit word boundary. An interleaved
//! buffer stores `[row][plane][byte]`, a non-interleaved buffer stores
//! `[plane][row][byte]`.

use crate::error::{IlbmError, Result, zeroed_buffer};

/// Largest plane count a chunky byte can address.
pub const MAX_PLANES: usize = 8;

/// Largest plane count a BMHD can declare.
pub const MAX_DEEP_PLANES: usize = u8::MAX as usize;

/// Bytes in one word-aligned row of one plane.
pub fn row_bytes(width: usize) -> usize {
    width.div_ceil(16) * 2
}

/// Bytes in one row of one plane without the word padding.
pub fn packed_row_bytes(width: usize) -> usize {
    width.div_ceil(8)
}

/// Validated image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    pub planes: usize,
}

impl Geometry {
    /// Dimensions for palette-indexed images of 1 to 8 planes.
    pub fn new(width: usize, height: usize, planes: usize) -> Result<Self> {
        Self::checked(width, height, planes, MAX_PLANES)
    }

    /// Dimensions for any plane count a BMHD can hold, 24-bit deep images
    /// included. Chunky conversions only see the first 8 planes.
    pub fn deep(width: usize, height: usize, planes: usize) -> Result<Self> {
        Self::checked(width, height, planes, MAX_DEEP_PLANES)
    }

    fn checked(width: usize, height: usize, planes: usize, max_planes: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(IlbmError::geometry(format!(
                "image must be at least 1x1 (got {width}x{height})"
            )));
        }
        if !(1..=max_planes).contains(&planes) {
            return Err(IlbmError::geometry(format!(
                "plane count must be between 1 and {max_planes} (got {planes})"
            )));
        }
        Ok(Self {
            width,
            height,
            planes,
        })
    }

    pub fn row_bytes(&self) -> usize {
        row_bytes(self.width)
    }

    /// Bytes in one complete plane.
    pub fn plane_len(&self) -> usize {
        self.row_bytes() * self.height
    }

    /// Bytes in a full plane buffer.
    pub fn buffer_len(&self) -> usize {
        self.plane_len() * self.planes
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Palette size addressed by the plane count, capped at 256.
    pub fn colors(&self) -> usize {
        1usize << self.planes.min(MAX_PLANES)
    }

    /// Planes that contribute to a chunky byte.
    pub fn chunky_planes(&self) -> usize {
        self.planes.min(MAX_PLANES)
    }
}

/// Byte ordering of a plane buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneLayout {
    /// `[row][plane][byte]`, the ILBM BODY order.
    Interleaved,
    /// `[plane][row][byte]`.
    NonInterleaved,
}

/// How plane bits are folded into a chunky byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkyMode {
    /// The palette index itself.
    Plain,
    /// Each of the low four index bits doubled into two adjacent bits.
    DoubledBits,
}

/// Bitplane data for one image, owned by a single conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneBuffer {
    geometry: Geometry,
    layout: PlaneLayout,
    data: Vec<u8>,
}

impl PlaneBuffer {
    /// Wrap an existing buffer. The length must match the geometry exactly.
    pub fn from_vec(geometry: Geometry, layout: PlaneLayout, data: Vec<u8>) -> Result<Self> {
        if data.len() != geometry.buffer_len() {
            return Err(IlbmError::geometry(format!(
                "plane buffer holds {} bytes but {}x{}x{} needs {}",
                data.len(),
                geometry.width,
                geometry.height,
                geometry.planes,
                geometry.buffer_len()
            )));
        }
        Ok(Self {
            geometry,
            layout,
            data,
        })
    }

    /// Build a buffer from rows authored `src_row_bytes` wide.
    ///
    /// Rows narrower than the word-aligned stride are zero-extended, wider
    /// rows are cut to it. Rows missing at the end of `src` stay zero.
    pub fn from_rows(
        geometry: Geometry,
        layout: PlaneLayout,
        src: &[u8],
        src_row_bytes: usize,
    ) -> Result<Self> {
        let row_bytes = geometry.row_bytes();
        let mut data = zeroed_buffer("plane buffer", geometry.buffer_len())?;
        if src_row_bytes > 0 {
            let copy = src_row_bytes.min(row_bytes);
            for (dst, row) in data
                .chunks_exact_mut(row_bytes)
                .zip(src.chunks(src_row_bytes))
            {
                let count = copy.min(row.len());
                dst[..count].copy_from_slice(&row[..count]);
            }
        }
        Ok(Self {
            geometry,
            layout,
            data,
        })
    }

    /// Inverse of [`PlaneBuffer::to_chunky`] with [`ChunkyMode::Plain`].
    /// Index bits at or above the plane count are dropped; planes past the
    /// eighth stay zero.
    pub fn from_chunky(geometry: Geometry, chunky: &[u8]) -> Result<Self> {
        if chunky.len() != geometry.pixel_count() {
            return Err(IlbmError::geometry(format!(
                "chunky surface holds {} bytes but {}x{} needs {}",
                chunky.len(),
                geometry.width,
                geometry.height,
                geometry.pixel_count()
            )));
        }

        let row_bytes = geometry.row_bytes();
        let mut data = zeroed_buffer("plane buffer", geometry.buffer_len())?;
        for (y, pixels) in chunky.chunks_exact(geometry.width).enumerate() {
            for (x, &value) in pixels.iter().enumerate() {
                let mask = 0x80u8 >> (x % 8);
                for plane in 0..geometry.chunky_planes() {
                    if value & (1 << plane) != 0 {
                        let offset = (y * geometry.planes + plane) * row_bytes + x / 8;
                        data[offset] |= mask;
                    }
                }
            }
        }

        Ok(Self {
            geometry,
            layout: PlaneLayout::Interleaved,
            data,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn layout(&self) -> PlaneLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Offset of row `y` of `plane`.
    fn row_offset(&self, y: usize, plane: usize) -> usize {
        let Geometry { height, planes, .. } = self.geometry;
        let row_index = match self.layout {
            PlaneLayout::Interleaved => y * planes + plane,
            PlaneLayout::NonInterleaved => plane * height + y,
        };
        row_index * self.geometry.row_bytes()
    }

    /// The word-aligned bytes of row `y` in `plane`.
    pub fn row(&self, y: usize, plane: usize) -> &[u8] {
        let start = self.row_offset(y, plane);
        &self.data[start..start + self.geometry.row_bytes()]
    }

    /// Re-block into `[plane][row][byte]` order.
    pub fn to_non_interleaved(&self) -> Result<PlaneBuffer> {
        self.relayout(PlaneLayout::NonInterleaved)
    }

    /// Re-block into `[row][plane][byte]` order.
    pub fn to_interleaved(&self) -> Result<PlaneBuffer> {
        self.relayout(PlaneLayout::Interleaved)
    }

    fn relayout(&self, layout: PlaneLayout) -> Result<PlaneBuffer> {
        if layout == self.layout {
            return Ok(self.clone());
        }

        let mut out = PlaneBuffer {
            geometry: self.geometry,
            layout,
            data: zeroed_buffer("plane buffer", self.data.len())?,
        };
        let row_bytes = self.geometry.row_bytes();
        for plane in 0..self.geometry.planes {
            for y in 0..self.geometry.height {
                let src = self.row_offset(y, plane);
                let dst = out.row_offset(y, plane);
                out.data[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
            }
        }
        Ok(out)
    }

    /// One byte per pixel, built from the plane bits at each column.
    /// Only the first 8 planes fit in a byte; deeper planes are ignored.
    pub fn to_chunky(&self, mode: ChunkyMode) -> Result<Vec<u8>> {
        let Geometry { width, height, .. } = self.geometry;
        let planes = self.geometry.chunky_planes();
        let mut chunky = zeroed_buffer("chunky surface", self.geometry.pixel_count())?;

        for y in 0..height {
            let pixels = &mut chunky[y * width..(y + 1) * width];
            for plane in 0..planes {
                let row = self.row(y, plane);
                for (x, pixel) in pixels.iter_mut().enumerate() {
                    let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
                    *pixel |= bit << plane;
                }
            }
            if mode == ChunkyMode::DoubledBits {
                for pixel in pixels.iter_mut() {
                    *pixel = double_bits(*pixel);
                }
            }
        }

        Ok(chunky)
    }
}

/// Duplicate each of the four low bits into a bit pair: bit `b` lands in
/// bits `2b` and `2b + 1`. Bits above 3 are discarded.
pub fn double_bits(value: u8) -> u8 {
    (0..4u8)
        .filter(|&bit| value & (1 << bit) != 0)
        .fold(0u8, |acc, bit| acc | (0b11 << (bit * 2)))
}

/// Byte-granular transpose of column-major data.
///
/// The input holds `columns` blocks of `rows` entries, each entry
/// `col_width` bytes. The output holds `rows` rows of `columns * col_width`
/// bytes, with block `c` of row `y` at `c * col_width`. Missing input bytes
/// read as zero. Calling it again with `rows` and `columns` swapped undoes it.
pub fn transpose_columns(
    src: &[u8],
    col_width: usize,
    rows: usize,
    columns: usize,
) -> Result<Vec<u8>> {
    let out_row = columns * col_width;
    let mut out = zeroed_buffer("transposed rows", rows * out_row)?;
    for c in 0..columns {
        for y in 0..rows {
            let src_start = (c * rows + y) * col_width;
            if src_start >= src.len() {
                continue;
            }
            let entry = &src[src_start..(src_start + col_width).min(src.len())];
            let dst_start = y * out_row + c * col_width;
            out[dst_start..dst_start + entry.len()].copy_from_slice(entry);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: usize, height: usize, planes: usize) -> Geometry {
        Geometry::new(width, height, planes).expect("valid geometry")
    }

    /// Deterministic filler so tests stay reproducible without a RNG crate.
    fn pattern(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 8) as u8
            })
            .collect()
    }

    #[test]
    fn rows_are_word_aligned() {
        assert_eq!(row_bytes(1), 2);
        assert_eq!(row_bytes(16), 2);
        assert_eq!(row_bytes(17), 4);
        assert_eq!(row_bytes(320), 40);
        assert_eq!(packed_row_bytes(17), 3);
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(Geometry::new(0, 4, 1).is_err());
        assert!(Geometry::new(4, 0, 1).is_err());
        assert!(Geometry::new(4, 4, 0).is_err());
        assert!(Geometry::new(4, 4, 9).is_err());
        assert_eq!(geometry(4, 4, 8).colors(), 256);
        assert_eq!(geometry(4, 4, 3).colors(), 8);
    }

    #[test]
    fn two_plane_image_extracts_expected_indices() {
        // 4x2 pixels: row 0 has plane0=0xF0, plane1=0x0F; row 1 has plane0=0x00, plane1=0xFF.
        let geometry = geometry(4, 2, 2);
        let body = vec![0xF0, 0x00, 0x0F, 0x00, 0x00, 0x00, 0xFF, 0x00];
        let planes =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, body).unwrap();

        let chunky = planes.to_chunky(ChunkyMode::Plain).unwrap();
        assert_eq!(chunky, vec![1, 1, 1, 1, 2, 2, 2, 2]);
        assert!(chunky.iter().all(|&value| value <= 3));
    }

    #[test]
    fn columns_map_msb_first() {
        let geometry = geometry(8, 1, 3);
        let body = vec![0b1010_0000, 0, 0b0110_0000, 0, 0b0001_0000, 0];
        let planes =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, body).unwrap();
        let chunky = planes.to_chunky(ChunkyMode::Plain).unwrap();
        assert_eq!(chunky, vec![1, 2, 3, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn doubles_low_four_bits() {
        assert_eq!(double_bits(0b0000_0001), 0b0000_0011);
        assert_eq!(double_bits(0b0000_0010), 0b0000_1100);
        assert_eq!(double_bits(0b0000_1101), 0b1111_0011);
        assert_eq!(double_bits(0b1111_0000), 0);

        let geometry = geometry(2, 1, 4);
        let body = vec![0x80, 0, 0x40, 0, 0x80, 0, 0xC0, 0];
        let planes =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, body).unwrap();
        assert_eq!(
            planes.to_chunky(ChunkyMode::DoubledBits).unwrap(),
            vec![0b1111_0011, 0b1100_1100]
        );
    }

    #[test]
    fn chunky_round_trips_for_every_plane_count() {
        for planes in 1..=MAX_PLANES {
            for &(width, height) in &[(1, 1), (7, 3), (16, 2), (33, 5)] {
                let geometry = geometry(width, height, planes);
                let mask = (geometry.colors() - 1) as u8;
                let chunky: Vec<u8> = pattern(geometry.pixel_count(), planes as u32)
                    .into_iter()
                    .map(|value| value & mask)
                    .collect();

                let buffer = PlaneBuffer::from_chunky(geometry, &chunky).unwrap();
                assert_eq!(buffer.to_chunky(ChunkyMode::Plain).unwrap(), chunky);

                let again = buffer.to_chunky(ChunkyMode::Plain).unwrap();
                let rebuilt = PlaneBuffer::from_chunky(geometry, &again).unwrap();
                assert_eq!(rebuilt, buffer);
            }
        }
    }

    #[test]
    fn planes_survive_chunky_round_trip() {
        // Random plane bits, with the padding bits beyond the width cleared.
        let geometry = geometry(12, 4, 5);
        let mut data = pattern(geometry.buffer_len(), 7);
        for row in data.chunks_exact_mut(geometry.row_bytes()) {
            row[1] &= 0xF0;
        }
        let planes =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, data).unwrap();
        let chunky = planes.to_chunky(ChunkyMode::Plain).unwrap();
        assert_eq!(PlaneBuffer::from_chunky(geometry, &chunky).unwrap(), planes);
    }

    #[test]
    fn non_interleave_round_trips() {
        let geometry = geometry(40, 3, 3);
        let data = pattern(geometry.buffer_len(), 11);
        let interleaved =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, data.clone()).unwrap();

        let planar = interleaved.to_non_interleaved().unwrap();
        assert_eq!(planar.layout(), PlaneLayout::NonInterleaved);
        assert_eq!(planar.row(2, 1), interleaved.row(2, 1));
        // Plane 1 row 0 sits right after all of plane 0.
        assert_eq!(
            &planar.as_bytes()[geometry.plane_len()..geometry.plane_len() + 6],
            &data[6..12]
        );

        assert_eq!(planar.to_interleaved().unwrap().into_bytes(), data);
    }

    #[test]
    fn rows_are_zero_extended_and_cut() {
        let geometry = geometry(20, 2, 1);
        let narrow = PlaneBuffer::from_rows(
            geometry,
            PlaneLayout::Interleaved,
            &[1, 2, 3, 4, 5, 6],
            3,
        )
        .unwrap();
        assert_eq!(narrow.as_bytes(), &[1, 2, 3, 0, 4, 5, 6, 0]);

        let wide = PlaneBuffer::from_rows(
            geometry,
            PlaneLayout::Interleaved,
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            5,
        )
        .unwrap();
        assert_eq!(wide.as_bytes(), &[1, 2, 3, 4, 6, 7, 8, 9]);
    }

    #[test]
    fn transposes_byte_columns() {
        // Two 1-byte columns of three rows each.
        let src = [0xA0, 0xA1, 0xA2, 0xB0, 0xB1, 0xB2];
        let rows = transpose_columns(&src, 1, 3, 2).unwrap();
        assert_eq!(rows, vec![0xA0, 0xB0, 0xA1, 0xB1, 0xA2, 0xB2]);

        let wide = transpose_columns(&[1, 2, 3, 4, 5, 6, 7, 8], 2, 2, 2).unwrap();
        assert_eq!(wide, vec![1, 2, 5, 6, 3, 4, 7, 8]);
    }

    #[test]
    fn transpose_is_self_inverse() {
        let (col_width, rows, columns) = (3, 5, 4);
        let src = pattern(col_width * rows * columns, 3);
        let transposed = transpose_columns(&src, col_width, rows, columns).unwrap();
        let restored = transpose_columns(&transposed, col_width, columns, rows).unwrap();
        assert_eq!(restored, src);
    }

    #[test]
    fn short_transpose_input_reads_as_zero() {
        let rows = transpose_columns(&[9, 8, 7], 1, 2, 2).unwrap();
        assert_eq!(rows, vec![9, 7, 8, 0]);
    }

    #[test]
    fn oversized_transpose_reports_allocation_failure() {
        assert!(matches!(
            transpose_columns(&[], 1, usize::MAX, 1),
            Err(IlbmError::Allocation { .. })
        ));
    }

    #[test]
    fn deep_geometry_keeps_every_plane() {
        assert!(Geometry::deep(16, 1, 0).is_err());
        assert!(Geometry::deep(16, 1, 256).is_err());
        let geometry = Geometry::deep(16, 1, 24).expect("24 planes");
        assert_eq!(geometry.buffer_len(), 48);
        assert_eq!(geometry.colors(), 256);
        assert_eq!(geometry.chunky_planes(), 8);

        // Plane p holds 0xFF only when p is 0, 7 or 8.
        let mut data = vec![0u8; geometry.buffer_len()];
        for plane in [0, 7, 8] {
            data[plane * 2] = 0xFF;
        }
        let planes =
            PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, data).unwrap();
        assert_eq!(planes.to_chunky(ChunkyMode::Plain).unwrap(), vec![0x81; 16]);

        let plane_major = planes.to_non_interleaved().unwrap();
        assert_eq!(plane_major.row(0, 8), &[0xFF, 0x00]);
        assert_eq!(plane_major.to_interleaved().unwrap(), planes);
    }
}
