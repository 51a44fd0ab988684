use std::borrow::Cow;

use crate::error::{IlbmError, Result, reserved_buffer, zeroed_buffer};
use crate::iff::{BitmapHeader, Compression, Masking};
use crate::packbits;
use crate::planar::{PlaneBuffer, PlaneLayout};

/// What to do when a BODY row decodes to fewer than `rowBytes` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicy {
    /// Warn, leave the rest of the row zero and keep going.
    #[default]
    Lenient,
    /// Fail with [`IlbmError::TruncatedData`].
    Strict,
}

/// BODY payload together with the scheme that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub compression: Compression,
    pub data: Vec<u8>,
}

/// Decode a BODY into an interleaved plane buffer.
///
/// Row segments are stored as row 0 plane 0, row 0 plane 1, ... with an
/// extra mask segment per scanline when the header says `HasMask`. The mask is
/// decoded to keep the stream aligned and then dropped.
pub fn decode_body(body: &[u8], header: &BitmapHeader, policy: RowPolicy) -> Result<PlaneBuffer> {
    let geometry = header.geometry()?;
    let compression = header.compression()?;
    let row_bytes = geometry.row_bytes();
    let segments = geometry.planes + usize::from(header.masking == Masking::HasMask);
    let total_rows = geometry.height * segments;

    let mut data = zeroed_buffer("plane buffer", geometry.buffer_len())?;
    let mut mask_row = vec![0u8; row_bytes];
    let mut cursor = 0usize;

    'rows: for row in 0..total_rows {
        let (y, segment) = (row / segments, row % segments);
        let dst = if segment < geometry.planes {
            let start = (y * geometry.planes + segment) * row_bytes;
            &mut data[start..start + row_bytes]
        } else {
            mask_row.fill(0);
            &mut mask_row[..]
        };

        let src = body.get(cursor..).unwrap_or_default();
        let produced = match compression {
            Compression::None => {
                let count = row_bytes.min(src.len());
                dst[..count].copy_from_slice(&src[..count]);
                cursor += count;
                count
            }
            Compression::ByteRun1 => {
                let decoded = packbits::decode_row(src, dst);
                cursor += decoded.consumed;
                decoded.produced
            }
        };

        if produced < row_bytes {
            match policy {
                RowPolicy::Strict => {
                    return Err(IlbmError::TruncatedData {
                        row,
                        produced,
                        expected: row_bytes,
                    });
                }
                RowPolicy::Lenient => log::warn!(
                    "decompressed row {row} has {produced} bytes, expected {row_bytes}"
                ),
            }
            if cursor >= body.len() && row + 1 < total_rows {
                log::warn!(
                    "BODY exhausted after row {row} of {total_rows}; remaining rows left blank"
                );
                break 'rows;
            }
        }
    }

    if cursor + 1 < body.len() {
        log::debug!(
            "{} BODY bytes left over after decoding",
            body.len() - cursor
        );
    }

    PlaneBuffer::from_vec(geometry, PlaneLayout::Interleaved, data)
}

/// Produce a BODY payload from a plane buffer, PackBits-encoding each row
/// segment independently when `compress` is set.
pub fn encode_body(planes: &PlaneBuffer, compress: bool) -> Result<EncodedBody> {
    let interleaved = match planes.layout() {
        PlaneLayout::Interleaved => Cow::Borrowed(planes),
        PlaneLayout::NonInterleaved => Cow::Owned(planes.to_interleaved()?),
    };

    if !compress {
        return Ok(EncodedBody {
            compression: Compression::None,
            data: interleaved.into_owned().into_bytes(),
        });
    }

    let bytes = interleaved.as_bytes();
    let row_bytes = interleaved.geometry().row_bytes();
    let mut data = reserved_buffer("packed BODY", bytes.len() + bytes.len() / 64 + 1)?;
    for row in bytes.chunks_exact(row_bytes) {
        packbits::encode_into(row, &mut data);
    }

    Ok(EncodedBody {
        compression: Compression::ByteRun1,
        data,
    })
}
