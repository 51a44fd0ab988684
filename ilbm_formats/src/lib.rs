pub mod artifact;
pub mod body;
pub mod cli;
pub mod convert;
pub mod error;
pub mod iff;
pub mod packbits;
pub mod palette;
pub mod planar;

pub use artifact::{InputFile, ensure_iff_extension, output_base, write_artifacts};
pub use body::{EncodedBody, RowPolicy, decode_body, encode_body};
pub use convert::{
    AssembleOptions, Assembled, Artifact, ArtifactKind, ExtractOptions, Extraction,
    PaletteSource, RawLayout, RowStride, assemble_ilbm, extract_bitplanes,
};
pub use error::IlbmError;
pub use iff::{BitmapHeader, ChunkId, Compression, IlbmFile, Masking, parse_chunks, write_ilbm};
pub use palette::{AmigaColor, Palette, Rgb8};
pub use planar::{ChunkyMode, Geometry, PlaneBuffer, PlaneLayout};
