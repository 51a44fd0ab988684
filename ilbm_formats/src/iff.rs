//! IFF `FORM ILBM` container reader and writer.

use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use serde::{Serialize, Serializer};

use crate::body::EncodedBody;
use crate::error::{IlbmError, Result};
use crate::palette::Palette;
use crate::planar::Geometry;

/// `FORM` tag, size and form type.
pub const FORM_HEADER_LEN: usize = 12;
/// Tag plus big-endian payload length.
pub const CHUNK_HEADER_LEN: usize = 8;
/// Fixed size of a BMHD payload.
pub const BMHD_LEN: usize = 20;

/// Four-character chunk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    pub const FORM: ChunkId = ChunkId(*b"FORM");
    pub const ILBM: ChunkId = ChunkId(*b"ILBM");
    pub const BMHD: ChunkId = ChunkId(*b"BMHD");
    pub const CMAP: ChunkId = ChunkId(*b"CMAP");
    pub const BODY: ChunkId = ChunkId(*b"BODY");

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// BMHD masking technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Masking {
    None,
    /// An extra mask plane follows the image planes of every scanline.
    HasMask,
    HasTransparentColor,
    Lasso,
    Unknown(u8),
}

impl Masking {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Masking::None,
            1 => Masking::HasMask,
            2 => Masking::HasTransparentColor,
            3 => Masking::Lasso,
            other => Masking::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Masking::None => 0,
            Masking::HasMask => 1,
            Masking::HasTransparentColor => 2,
            Masking::Lasso => 3,
            Masking::Unknown(other) => other,
        }
    }
}

/// BODY compression schemes understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compression {
    None,
    ByteRun1,
}

impl Compression {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::ByteRun1),
            other => Err(IlbmError::UnsupportedCompression(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::ByteRun1 => 1,
        }
    }
}

/// Decoded BMHD chunk.
///
/// `compression` keeps the raw byte so headers with unknown schemes can still
/// be inspected; [`BitmapHeader::compression`] validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapHeader {
    pub width: u16,
    pub height: u16,
    pub x: i16,
    pub y: i16,
    pub num_planes: u8,
    pub masking: Masking,
    pub compression: u8,
    pub pad1: u8,
    pub transparent_color: u16,
    pub x_aspect: u8,
    pub y_aspect: u8,
    pub page_width: i16,
    pub page_height: i16,
}

impl BitmapHeader {
    /// Header for an unmasked, uncompressed image with square pixels and a
    /// page the size of the image.
    pub fn new(geometry: Geometry) -> Result<Self> {
        let dimension = |value: usize, name: &str| {
            u16::try_from(value)
                .ok()
                .filter(|&value| value <= i16::MAX as u16)
                .ok_or_else(|| IlbmError::geometry(format!("{name} {value} does not fit in BMHD")))
        };
        let width = dimension(geometry.width, "width")?;
        let height = dimension(geometry.height, "height")?;

        Ok(Self {
            width,
            height,
            x: 0,
            y: 0,
            num_planes: geometry.planes as u8,
            masking: Masking::None,
            compression: Compression::None.as_u8(),
            pad1: 0,
            transparent_color: 0,
            x_aspect: 1,
            y_aspect: 1,
            page_width: width as i16,
            page_height: height as i16,
        })
    }

    /// Parse a BMHD payload field by field.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < BMHD_LEN {
            return Err(IlbmError::format(format!(
                "BMHD chunk is {} bytes, expected {BMHD_LEN}",
                payload.len()
            )));
        }

        let mut reader = Cursor::new(payload);
        Ok(Self {
            width: reader.read_u16::<BigEndian>()?,
            height: reader.read_u16::<BigEndian>()?,
            x: reader.read_i16::<BigEndian>()?,
            y: reader.read_i16::<BigEndian>()?,
            num_planes: reader.read_u8()?,
            masking: Masking::from_u8(reader.read_u8()?),
            compression: reader.read_u8()?,
            pad1: reader.read_u8()?,
            transparent_color: reader.read_u16::<BigEndian>()?,
            x_aspect: reader.read_u8()?,
            y_aspect: reader.read_u8()?,
            page_width: reader.read_i16::<BigEndian>()?,
            page_height: reader.read_i16::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.width)?;
        writer.write_u16::<BigEndian>(self.height)?;
        writer.write_i16::<BigEndian>(self.x)?;
        writer.write_i16::<BigEndian>(self.y)?;
        writer.write_u8(self.num_planes)?;
        writer.write_u8(self.masking.as_u8())?;
        writer.write_u8(self.compression)?;
        writer.write_u8(self.pad1)?;
        writer.write_u16::<BigEndian>(self.transparent_color)?;
        writer.write_u8(self.x_aspect)?;
        writer.write_u8(self.y_aspect)?;
        writer.write_i16::<BigEndian>(self.page_width)?;
        writer.write_i16::<BigEndian>(self.page_height)?;
        Ok(())
    }

    pub fn compression(&self) -> Result<Compression> {
        Compression::from_u8(self.compression)
    }

    /// Image dimensions; any plane count from 1 to 255 is accepted.
    pub fn geometry(&self) -> Result<Geometry> {
        Geometry::deep(
            usize::from(self.width),
            usize::from(self.height),
            usize::from(self.num_planes),
        )
    }

    pub fn row_bytes(&self) -> usize {
        crate::planar::row_bytes(usize::from(self.width))
    }
}

/// Outer `FORM` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormHeader {
    pub form_type: ChunkId,
    /// Bytes following the size field, form type included.
    pub size: u32,
}

/// One chunk borrowed from the container bytes.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub id: ChunkId,
    /// Offset of the chunk header within the file.
    pub offset: usize,
    pub length: u32,
    pub data: &'a [u8],
}

/// Validate the 12-byte `FORM ... ILBM` header.
pub fn read_form_header(bytes: &[u8]) -> Result<FormHeader> {
    if bytes.len() < FORM_HEADER_LEN {
        return Err(IlbmError::format(format!(
            "file is {} bytes, too small for a FORM header",
            bytes.len()
        )));
    }

    let mut reader = Cursor::new(bytes);
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    if ChunkId(tag) != ChunkId::FORM {
        return Err(IlbmError::format(format!(
            "missing FORM signature (found {})",
            ChunkId(tag)
        )));
    }
    let size = reader.read_u32::<BigEndian>()?;
    let mut form_type = [0u8; 4];
    reader.read_exact(&mut form_type)?;
    if ChunkId(form_type) != ChunkId::ILBM {
        return Err(IlbmError::format(format!(
            "FORM type is {}, expected ILBM",
            ChunkId(form_type)
        )));
    }
    if size < 4 {
        return Err(IlbmError::format(format!("FORM size {size} is too small")));
    }

    Ok(FormHeader {
        form_type: ChunkId(form_type),
        size,
    })
}

/// Walk every chunk inside the FORM.
///
/// Chunk payloads are padded to an even length; the pad byte after a final
/// odd-length chunk may be missing, even when the FORM size counts it. Bytes
/// after the FORM are ignored.
pub fn parse_chunks(bytes: &[u8]) -> Result<Vec<Chunk<'_>>> {
    let form = read_form_header(bytes)?;
    let mut end = 8 + form.size as usize;
    if end == bytes.len() + 1 {
        log::debug!("FORM size counts a pad byte missing from the file");
        end = bytes.len();
    }
    if end > bytes.len() {
        return Err(IlbmError::format(format!(
            "FORM declares {} bytes but only {} follow the size field",
            form.size,
            bytes.len() - 8
        )));
    }

    let mut chunks = Vec::new();
    let mut offset = FORM_HEADER_LEN;
    while offset < end {
        if end - offset < CHUNK_HEADER_LEN {
            return Err(IlbmError::format(format!(
                "truncated chunk header at offset {offset}"
            )));
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&bytes[offset..offset + 4]);
        let id = ChunkId(tag);
        let length = BigEndian::read_u32(&bytes[offset + 4..offset + 8]);
        let data_start = offset + CHUNK_HEADER_LEN;
        let data_end = data_start + length as usize;
        if data_end > end {
            return Err(IlbmError::format(format!(
                "{id} chunk at offset {offset} declares {length} bytes, past the end of the FORM"
            )));
        }

        chunks.push(Chunk {
            id,
            offset,
            length,
            data: &bytes[data_start..data_end],
        });
        offset = data_end + (length as usize & 1);
    }

    Ok(chunks)
}

/// The chunks of an ILBM that the converters care about.
#[derive(Debug, Clone)]
pub struct IlbmFile<'a> {
    pub header: Option<BitmapHeader>,
    pub cmap: Option<&'a [u8]>,
    pub body: Option<&'a [u8]>,
    /// Tags of chunks that were stepped over.
    pub skipped: Vec<ChunkId>,
}

impl<'a> IlbmFile<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut file = IlbmFile {
            header: None,
            cmap: None,
            body: None,
            skipped: Vec::new(),
        };

        for chunk in parse_chunks(bytes)? {
            match chunk.id {
                ChunkId::BMHD => {
                    if file.header.is_some() {
                        warn_duplicate(&chunk);
                    } else {
                        file.header = Some(BitmapHeader::parse(chunk.data)?);
                    }
                }
                ChunkId::CMAP => keep_first(&mut file.cmap, &chunk),
                ChunkId::BODY => keep_first(&mut file.body, &chunk),
                other => {
                    log::debug!("skipping {other} chunk ({} bytes)", chunk.length);
                    file.skipped.push(other);
                }
            }
        }

        Ok(file)
    }

    pub fn palette(&self) -> Option<Palette> {
        self.cmap.map(Palette::from_cmap)
    }
}

fn keep_first<'a>(slot: &mut Option<&'a [u8]>, chunk: &Chunk<'a>) {
    if slot.is_some() {
        warn_duplicate(chunk);
    } else {
        *slot = Some(chunk.data);
    }
}

fn warn_duplicate(chunk: &Chunk<'_>) {
    log::warn!(
        "ignoring repeated {} chunk at offset {}",
        chunk.id,
        chunk.offset
    );
}

/// Builds a FORM in memory and backpatches its size on completion.
struct FormWriter {
    out: Vec<u8>,
}

impl FormWriter {
    fn new(form_type: ChunkId) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(&ChunkId::FORM.0);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&form_type.0);
        Self { out }
    }

    fn chunk(&mut self, id: ChunkId, payload: &[u8]) -> Result<()> {
        let length = u32::try_from(payload.len()).map_err(|_| {
            IlbmError::format(format!("{id} payload of {} bytes is too large", payload.len()))
        })?;
        self.out.extend_from_slice(&id.0);
        self.out.write_u32::<BigEndian>(length)?;
        self.out.extend_from_slice(payload);
        if length & 1 != 0 {
            self.out.push(0);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let size = u32::try_from(self.out.len() - 8)
            .map_err(|_| IlbmError::format("FORM exceeds 4 GiB"))?;
        BigEndian::write_u32(&mut self.out[4..8], size);
        Ok(self.out)
    }
}

/// Serialize an ILBM with BMHD, CMAP and BODY chunks.
///
/// The BMHD compression byte always follows `body`, whatever `header` says.
pub fn write_ilbm(header: &BitmapHeader, palette: &Palette, body: &EncodedBody) -> Result<Vec<u8>> {
    let mut header = *header;
    header.compression = body.compression.as_u8();

    let mut bmhd = Vec::with_capacity(BMHD_LEN);
    header.write_to(&mut bmhd)?;

    let mut form = FormWriter::new(ChunkId::ILBM);
    form.chunk(ChunkId::BMHD, &bmhd)?;
    form.chunk(ChunkId::CMAP, &palette.to_cmap_bytes())?;
    form.chunk(ChunkId::BODY, &body.data)?;
    form.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmhd_bytes(width: u16, height: u16, planes: u8, masking: u8, compression: u8) -> Vec<u8> {
        let mut bmhd = Vec::new();
        bmhd.extend_from_slice(&width.to_be_bytes());
        bmhd.extend_from_slice(&height.to_be_bytes());
        bmhd.extend_from_slice(&[0, 0, 0, 0]); // x, y
        bmhd.extend_from_slice(&[planes, masking, compression, 0]);
        bmhd.extend_from_slice(&[0, 0]); // transparent colour
        bmhd.extend_from_slice(&[10, 11]); // aspect
        bmhd.extend_from_slice(&320u16.to_be_bytes());
        bmhd.extend_from_slice(&200u16.to_be_bytes());
        bmhd
    }

    fn form(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"FORM");
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"ILBM");
        for (id, payload) in chunks {
            data.extend_from_slice(*id);
            data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            data.extend_from_slice(payload);
            if payload.len() % 2 == 1 {
                data.push(0xEE);
            }
        }
        let size = (data.len() - 8) as u32;
        data[4..8].copy_from_slice(&size.to_be_bytes());
        data
    }

    #[test]
    fn parses_known_chunks_and_skips_others() {
        let bmhd = bmhd_bytes(16, 2, 1, 0, 0);
        let data = form(&[
            (b"BMHD", &bmhd[..]),
            (b"ANNO", &b"odd"[..]),
            (b"CMAP", &[0, 0, 0, 255, 255, 255][..]),
            (b"BODY", &[1, 2, 3, 4][..]),
        ]);

        let chunks = parse_chunks(&data).expect("chunks parse");
        let ids: Vec<String> = chunks.iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, ["BMHD", "ANNO", "CMAP", "BODY"]);
        // The odd ANNO payload is followed by a pad byte.
        assert_eq!(chunks[2].offset, chunks[1].offset + CHUNK_HEADER_LEN + 4);

        let file = IlbmFile::parse(&data).expect("ILBM parses");
        let header = file.header.expect("BMHD present");
        assert_eq!((header.width, header.height, header.num_planes), (16, 2, 1));
        assert_eq!((header.x_aspect, header.y_aspect), (10, 11));
        assert_eq!((header.page_width, header.page_height), (320, 200));
        assert_eq!(header.row_bytes(), 2);
        assert_eq!(file.cmap, Some(&[0u8, 0, 0, 255, 255, 255][..]));
        assert_eq!(file.body, Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(file.skipped, vec![ChunkId(*b"ANNO")]);
        assert_eq!(file.palette().expect("palette").len(), 2);
    }

    #[test]
    fn missing_optional_chunks_are_not_errors() {
        let data = form(&[(b"BMHD", &bmhd_bytes(8, 8, 2, 0, 1)[..])]);
        let file = IlbmFile::parse(&data).expect("ILBM parses");
        assert!(file.header.is_some());
        assert!(file.cmap.is_none());
        assert!(file.body.is_none());
    }

    #[test]
    fn first_duplicate_chunk_wins() {
        let data = form(&[(b"BODY", &[1, 2][..]), (b"BODY", &[3, 4][..])]);
        let file = IlbmFile::parse(&data).expect("ILBM parses");
        assert_eq!(file.body, Some(&[1u8, 2][..]));
    }

    #[test]
    fn rejects_foreign_containers() {
        let mut data = form(&[]);
        data[8..12].copy_from_slice(b"8SVX");
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));

        let mut data = form(&[]);
        data[0..4].copy_from_slice(b"RIFF");
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));

        assert!(matches!(parse_chunks(b"FORM"), Err(IlbmError::Format(_))));
    }

    #[test]
    fn rejects_chunks_running_past_the_end() {
        let mut data = form(&[(b"BODY", &[1, 2, 3, 4][..])]);
        data[16..20].copy_from_slice(&100u32.to_be_bytes());
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));

        let mut data = form(&[(b"BODY", &[1, 2][..])]);
        data[4..8].copy_from_slice(&64u32.to_be_bytes());
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));

        let mut data = form(&[(b"BODY", &[1, 2][..])]);
        data.extend_from_slice(b"CMA");
        let size = (data.len() - 8) as u32;
        data[4..8].copy_from_slice(&size.to_be_bytes());
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));
    }

    #[test]
    fn tolerates_missing_final_pad_and_trailing_garbage() {
        let mut data = form(&[(b"BODY", &[7, 8, 9][..])]);
        data.pop();
        let size = (data.len() - 8) as u32;
        data[4..8].copy_from_slice(&size.to_be_bytes());
        data.extend_from_slice(b"junk after the form");

        let file = IlbmFile::parse(&data).expect("ILBM parses");
        assert_eq!(file.body, Some(&[7u8, 8, 9][..]));
    }

    #[test]
    fn form_size_may_count_a_missing_final_pad() {
        // The size field still includes the dropped pad byte.
        let mut data = form(&[(b"BODY", &[7, 8, 9][..])]);
        data.pop();
        let file = IlbmFile::parse(&data).expect("ILBM parses");
        assert_eq!(file.body, Some(&[7u8, 8, 9][..]));

        data.pop();
        assert!(matches!(parse_chunks(&data), Err(IlbmError::Format(_))));
    }

    #[test]
    fn short_bmhd_is_a_format_error() {
        let data = form(&[(b"BMHD", &[0, 16, 0, 2][..])]);
        assert!(matches!(IlbmFile::parse(&data), Err(IlbmError::Format(_))));
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let header = BitmapHeader::parse(&bmhd_bytes(320, 256, 5, 2, 1)).unwrap();
        assert_eq!(header.masking, Masking::HasTransparentColor);
        assert_eq!(header.compression().unwrap(), Compression::ByteRun1);

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, bmhd_bytes(320, 256, 5, 2, 1));

        let odd = BitmapHeader::parse(&bmhd_bytes(8, 8, 1, 0, 2)).unwrap();
        assert!(matches!(
            odd.compression(),
            Err(IlbmError::UnsupportedCompression(2))
        ));
    }

    #[test]
    fn writer_pads_chunks_and_backpatches_size() {
        let geometry = Geometry::new(8, 1, 1).unwrap();
        let header = BitmapHeader::new(geometry).unwrap();
        let palette = Palette::default_for(2);
        let body = EncodedBody {
            compression: Compression::ByteRun1,
            data: vec![0x01, 0xAA, 0x00],
        };

        let data = write_ilbm(&header, &palette, &body).unwrap();
        assert_eq!(&data[0..4], b"FORM");
        assert_eq!(BigEndian::read_u32(&data[4..8]) as usize, data.len() - 8);
        assert_eq!(data.len() % 2, 0);

        let file = IlbmFile::parse(&data).unwrap();
        let written = file.header.unwrap();
        assert_eq!(written.compression().unwrap(), Compression::ByteRun1);
        assert_eq!((written.x_aspect, written.y_aspect), (1, 1));
        assert_eq!((written.page_width, written.page_height), (8, 1));
        assert_eq!(file.cmap.unwrap(), &[0, 0, 0, 255, 255, 255]);
        assert_eq!(file.body.unwrap(), &[0x01, 0xAA, 0x00]);
    }

    #[test]
    fn eight_colour_default_palette_is_emitted() {
        let geometry = Geometry::new(16, 1, 3).unwrap();
        let header = BitmapHeader::new(geometry).unwrap();
        let body = EncodedBody {
            compression: Compression::None,
            data: vec![0; 6],
        };
        let palette = Palette::default_for(geometry.colors());
        let data = write_ilbm(&header, &palette, &body).unwrap();

        let chunks = parse_chunks(&data).unwrap();
        let cmap = chunks.iter().find(|c| c.id == ChunkId::CMAP).unwrap();
        assert_eq!(cmap.length, 24);
        let words: Vec<u16> = Palette::from_cmap(cmap.data)
            .to_amiga_words()
            .iter()
            .map(|color| color.0)
            .collect();
        assert_eq!(words[0], 0x0000);
        assert!(words[1..].iter().all(|&word| word == 0x0FFF));
        assert_eq!(words.len(), 8);
    }
}
