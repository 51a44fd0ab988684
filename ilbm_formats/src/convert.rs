//! End-to-end conversions between ILBM containers and raw Amiga layouts.
//!
//! Both directions run in a single pass over in-memory buffers and return
//! every output artifact at once, so callers can write them only after the
//! whole conversion has succeeded.

use crate::body::{RowPolicy, decode_body, encode_body};
use crate::error::{IlbmError, Result, reserved_buffer};
use crate::iff::{BitmapHeader, IlbmFile, write_ilbm};
use crate::palette::{Palette, split_trailing_palette};
use crate::planar::{
    ChunkyMode, Geometry, MAX_PLANES, PlaneBuffer, PlaneLayout, packed_row_bytes,
    transpose_columns,
};

/// Kinds of file a conversion can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Interleaved bitplanes (`.bpl`).
    Bitplanes,
    /// Big-endian Amiga colour words (`.pal`).
    Palette,
    /// One byte per pixel (`.chk`).
    Chunky,
    /// Plane-major bitplanes (`.bpf`).
    NonInterleaved,
    /// ILBM container (`.iff`).
    Ilbm,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Bitplanes => "bpl",
            ArtifactKind::Palette => "pal",
            ArtifactKind::Chunky => "chk",
            ArtifactKind::NonInterleaved => "bpf",
            ArtifactKind::Ilbm => "iff",
        }
    }
}

/// Bytes destined for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractOptions {
    /// Also produce a chunky surface.
    pub chunky: Option<ChunkyMode>,
    /// Also produce plane-major bitplanes.
    pub non_interleaved: bool,
    pub row_policy: RowPolicy,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub header: Option<BitmapHeader>,
    pub artifacts: Vec<Artifact>,
}

impl Extraction {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.kind == kind)
    }
}

/// Split an ILBM into raw bitplanes, palette words and the optional chunky
/// and plane-major variants.
///
/// A missing CMAP yields no palette artifact and a missing BODY yields no
/// pixel artifacts; a BODY without a BMHD is an error.
pub fn extract_bitplanes(iff: &[u8], options: &ExtractOptions) -> Result<Extraction> {
    let file = IlbmFile::parse(iff)?;
    let mut artifacts = Vec::new();

    if let Some(header) = &file.header {
        log::info!(
            "BMHD: {}x{} ({} bytes per row), {} planes, compression {}",
            header.width,
            header.height,
            header.row_bytes(),
            header.num_planes,
            header.compression
        );
    } else {
        log::info!("BMHD chunk not found");
    }

    match file.palette() {
        Some(palette) => {
            log::info!("CMAP: {} colours", palette.len());
            artifacts.push(Artifact::new(ArtifactKind::Palette, palette.to_pal_bytes()));
        }
        None => log::info!("CMAP chunk not found"),
    }

    match (file.body, &file.header) {
        (Some(body), Some(header)) => {
            let planes = decode_body(body, header, options.row_policy)?;
            if options.chunky.is_some() && planes.geometry().planes > MAX_PLANES {
                log::warn!(
                    "{} planes do not fit in a chunky byte; only the first {MAX_PLANES} are used",
                    planes.geometry().planes
                );
            }
            let chunky = options
                .chunky
                .map(|mode| planes.to_chunky(mode))
                .transpose()?;
            let non_interleaved = if options.non_interleaved {
                Some(planes.to_non_interleaved()?.into_bytes())
            } else {
                None
            };

            artifacts.push(Artifact::new(ArtifactKind::Bitplanes, planes.into_bytes()));
            if let Some(chunky) = chunky {
                artifacts.push(Artifact::new(ArtifactKind::Chunky, chunky));
            }
            if let Some(bytes) = non_interleaved {
                artifacts.push(Artifact::new(ArtifactKind::NonInterleaved, bytes));
            }
        }
        (Some(_), None) => {
            return Err(IlbmError::format("BODY chunk present without a BMHD chunk"));
        }
        (None, _) => log::info!("BODY chunk not found"),
    }

    Ok(Extraction {
        header: file.header,
        artifacts,
    })
}

/// Byte order of raw input handed to [`assemble_ilbm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawLayout {
    /// `[row][plane][byte]`.
    Interleaved,
    /// `[plane][row][byte]`.
    #[default]
    NonInterleaved,
    /// Per plane, byte columns `column_width` bytes wide stored one after
    /// another, each covering every row.
    Transposed { column_width: usize },
    /// One palette index per pixel.
    Chunky,
}

/// Width of each input row for the planar layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowStride {
    /// Rows padded to a 16-bit boundary.
    #[default]
    Padded,
    /// Rows exactly `ceil(width / 8)` bytes wide.
    Packed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    pub geometry: Geometry,
    pub layout: RawLayout,
    /// Ignored by the transposed and chunky layouts.
    pub stride: RowStride,
    /// PackBits-encode the BODY.
    pub compress: bool,
}

impl AssembleOptions {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            layout: RawLayout::default(),
            stride: RowStride::default(),
            compress: false,
        }
    }

    fn input_row_bytes(&self) -> usize {
        match self.stride {
            RowStride::Padded => self.geometry.row_bytes(),
            RowStride::Packed => packed_row_bytes(self.geometry.width),
        }
    }

    /// Byte columns per plane row for the transposed layout.
    fn transposed_columns(&self, column_width: usize) -> usize {
        packed_row_bytes(self.geometry.width).div_ceil(column_width)
    }

    /// Size of the pixel data, excluding any trailing palette.
    pub fn pixel_data_len(&self) -> Result<usize> {
        let Geometry { height, planes, .. } = self.geometry;
        match self.layout {
            RawLayout::Interleaved | RawLayout::NonInterleaved => {
                Ok(self.input_row_bytes() * height * planes)
            }
            RawLayout::Transposed { column_width: 0 } => {
                Err(IlbmError::geometry("transpose column width must be at least 1"))
            }
            RawLayout::Transposed { column_width } => {
                Ok(self.transposed_columns(column_width) * column_width * height * planes)
            }
            RawLayout::Chunky => Ok(self.geometry.pixel_count()),
        }
    }
}

/// Where the palette of an assembled image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteSource {
    /// Colour words appended to the raw input.
    Trailing,
    /// Black followed by white.
    Default,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub header: BitmapHeader,
    pub palette: Palette,
    pub palette_source: PaletteSource,
    pub ilbm: Artifact,
}

/// Wrap raw pixel data in an ILBM container.
///
/// The input must be exactly the pixel data for the geometry and layout,
/// optionally followed by one big-endian colour word per palette entry.
pub fn assemble_ilbm(raw: &[u8], options: &AssembleOptions) -> Result<Assembled> {
    let geometry = options.geometry;
    let mut header = BitmapHeader::new(geometry)?;
    let pixel_len = options.pixel_data_len()?;
    let colors = geometry.colors();

    let (pixels, trailing) = split_trailing_palette(raw, pixel_len, colors)?;
    let (palette, palette_source) = match trailing {
        Some(palette) => {
            log::info!("found palette with {colors} colours at offset {pixel_len}");
            (palette, PaletteSource::Trailing)
        }
        None => (Palette::default_for(colors), PaletteSource::Default),
    };

    let planes = normalize_input(pixels, options)?;
    let body = encode_body(&planes, options.compress)?;
    header.compression = body.compression.as_u8();
    let bytes = write_ilbm(&header, &palette, &body)?;

    Ok(Assembled {
        header,
        palette,
        palette_source,
        ilbm: Artifact::new(ArtifactKind::Ilbm, bytes),
    })
}

/// Turn raw input of any supported layout into word-aligned interleaved planes.
fn normalize_input(pixels: &[u8], options: &AssembleOptions) -> Result<PlaneBuffer> {
    let geometry = options.geometry;
    match options.layout {
        RawLayout::Interleaved => PlaneBuffer::from_rows(
            geometry,
            PlaneLayout::Interleaved,
            pixels,
            options.input_row_bytes(),
        ),
        RawLayout::NonInterleaved => PlaneBuffer::from_rows(
            geometry,
            PlaneLayout::NonInterleaved,
            pixels,
            options.input_row_bytes(),
        )?
        .to_interleaved(),
        RawLayout::Transposed { column_width } => {
            let columns = options.transposed_columns(column_width);
            let plane_input = columns * column_width * geometry.height;
            let mut rows = reserved_buffer("transposed planes", plane_input * geometry.planes)?;
            for plane in pixels.chunks(plane_input).take(geometry.planes) {
                rows.extend(transpose_columns(
                    plane,
                    column_width,
                    geometry.height,
                    columns,
                )?);
            }
            PlaneBuffer::from_rows(
                geometry,
                PlaneLayout::NonInterleaved,
                &rows,
                columns * column_width,
            )?
            .to_interleaved()
        }
        RawLayout::Chunky => {
            let limit = geometry.colors();
            if let Some(index) = pixels.iter().position(|&value| usize::from(value) >= limit) {
                log::warn!(
                    "pixel {index} uses colour {} but {} planes only address {limit}; high bits dropped",
                    pixels[index],
                    geometry.planes
                );
            }
            PlaneBuffer::from_chunky(geometry, pixels)
        }
    }
}
