//! ByteRun1 (PackBits) codec used by ILBM BODY chunks.
//!
//! Runs never cross a row segment in ILBM, so both directions work on one
//! `rowBytes`-sized segment at a time. The decoder reports how many input
//! bytes it consumed so the caller can step to the next segment without
//! re-scanning the control stream.

/// Longest literal or repeat run a single control byte can describe.
pub const MAX_RUN: usize = 128;

/// Shortest repeat worth encoding as a run.
const MIN_REPEAT: usize = 3;

/// Outcome of decoding a single row segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowDecode {
    /// Bytes written to the destination.
    pub produced: usize,
    /// Bytes read from the source, control bytes included.
    pub consumed: usize,
}

/// Decode one row segment from `src` into `dst`.
///
/// Decoding stops once `dst` is full or `src` runs out. A run that would
/// overflow `dst` is clipped, but its input is still counted as consumed.
pub fn decode_row(src: &[u8], dst: &mut [u8]) -> RowDecode {
    let mut si = 0usize;
    let mut di = 0usize;

    while si < src.len() && di < dst.len() {
        let control = src[si] as i8;
        si += 1;

        match control {
            0..=127 => {
                let run = control as usize + 1;
                let available = run.min(src.len() - si);
                let count = available.min(dst.len() - di);
                dst[di..di + count].copy_from_slice(&src[si..si + count]);
                si += available;
                di += count;
            }
            -128 => {}
            _ => {
                let Some(&value) = src.get(si) else {
                    break;
                };
                si += 1;
                let run = 1 - control as isize;
                let count = (run as usize).min(dst.len() - di);
                dst[di..di + count].fill(value);
                di += count;
            }
        }
    }

    RowDecode {
        produced: di,
        consumed: si,
    }
}

/// Decode up to `expected_len` bytes, returning the output and the number of
/// source bytes consumed. A short output means the source ran dry.
pub fn decode(src: &[u8], expected_len: usize) -> (Vec<u8>, usize) {
    let mut out = vec![0u8; expected_len];
    let RowDecode { produced, consumed } = decode_row(src, &mut out);
    out.truncate(produced);
    (out, consumed)
}

/// Encode one row segment.
pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + src.len() / MAX_RUN + 1);
    encode_into(src, &mut out);
    out
}

/// Encode one row segment, appending to `out`.
pub fn encode_into(src: &[u8], out: &mut Vec<u8>) {
    let mut si = 0usize;

    while si < src.len() {
        let run = repeat_len(&src[si..]);
        if run >= MIN_REPEAT {
            out.push((1 - run as isize) as u8);
            out.push(src[si]);
            si += run;
            continue;
        }

        let start = si;
        while si < src.len() && si - start < MAX_RUN {
            if starts_repeat(&src[si..]) {
                break;
            }
            si += 1;
        }
        let literal = &src[start..si];
        out.push((literal.len() - 1) as u8);
        out.extend_from_slice(literal);
    }
}

fn repeat_len(bytes: &[u8]) -> usize {
    let first = bytes[0];
    bytes
        .iter()
        .take(MAX_RUN)
        .take_while(|&&byte| byte == first)
        .count()
}

fn starts_repeat(bytes: &[u8]) -> bool {
    bytes.len() >= MIN_REPEAT && bytes[0] == bytes[1] && bytes[0] == bytes[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_repeat_then_literal() {
        let encoded = encode(&[5, 5, 5, 5, 5, 5, 9, 9, 1, 2, 3]);
        assert_eq!(encoded, vec![(-5i8) as u8, 5, 4, 9, 9, 1, 2, 3]);
    }

    #[test]
    fn decodes_literal_repeat_and_noop() {
        let src = [0x02, 1, 2, 3, 0x80, 0xFE, 7, 0x00, 9];
        let (out, consumed) = decode(&src, 7);
        assert_eq!(out, vec![1, 2, 3, 7, 7, 7, 9]);
        assert_eq!(consumed, src.len());
    }

    #[test]
    fn stops_at_row_boundary() {
        // Two rows of four bytes each; only the first must be consumed.
        let mut src = encode(&[1, 1, 1, 1]);
        let first_len = src.len();
        encode_into(&[4, 3, 2, 1], &mut src);

        let mut row = [0u8; 4];
        let result = decode_row(&src, &mut row);
        assert_eq!(row, [1, 1, 1, 1]);
        assert_eq!(
            result,
            RowDecode {
                produced: 4,
                consumed: first_len
            }
        );

        let result = decode_row(&src[first_len..], &mut row);
        assert_eq!(row, [4, 3, 2, 1]);
        assert_eq!(result.consumed, src.len() - first_len);
    }

    #[test]
    fn short_source_produces_short_row() {
        let mut row = [0u8; 8];
        let result = decode_row(&[0x05, 1, 2], &mut row);
        assert_eq!(result.produced, 2);
        assert_eq!(result.consumed, 3);
        assert_eq!(&row[..2], &[1, 2]);

        let result = decode_row(&[0xFD], &mut row);
        assert_eq!(result, RowDecode { produced: 0, consumed: 1 });
    }

    #[test]
    fn overflowing_run_is_clipped_but_consumed() {
        let mut row = [0u8; 2];
        let result = decode_row(&[0xFB, 6, 0x00, 1], &mut row);
        assert_eq!(row, [6, 6]);
        assert_eq!(result, RowDecode { produced: 2, consumed: 2 });
    }

    #[test]
    fn long_runs_split_at_128() {
        let mut row = vec![0xAAu8; 300];
        row.extend((0..=255u8).cycle().take(200));
        let encoded = encode(&row);
        assert_eq!(encoded[0] as i8, -127);

        let (decoded, consumed) = decode(&encoded, row.len());
        assert_eq!(decoded, row);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn round_trips_mixed_rows() {
        let rows: [&[u8]; 6] = [
            &[],
            &[0],
            &[1, 2],
            &[3, 3],
            &[7, 7, 7, 1, 7, 7, 2, 2, 2, 2, 0, 0, 0],
            &[0xFF; 40],
        ];
        for row in rows {
            let encoded = encode(row);
            let (decoded, consumed) = decode(&encoded, row.len());
            assert_eq!(decoded, row, "row {row:?}");
            assert_eq!(consumed, encoded.len(), "row {row:?}");
        }
    }
}
