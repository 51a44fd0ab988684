use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ilbm_formats::artifact::write_artifact;
use ilbm_formats::cli::{init_logging, parse_args};
use ilbm_formats::{
    AssembleOptions, Geometry, InputFile, PaletteSource, RawLayout, RowStride, assemble_ilbm,
    ensure_iff_extension,
};

#[derive(Parser, Debug)]
#[command(about = "Wrap raw Amiga bitplanes in an ILBM container", version)]
struct Args {
    /// Raw bitplane file, optionally followed by one colour word per palette entry
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Image width in pixels
    #[arg(short = 'x', long, value_name = "PIXELS")]
    width: usize,

    /// Image height in pixels
    #[arg(short = 'y', long, value_name = "PIXELS")]
    height: usize,

    /// Number of bitplanes (1-8)
    #[arg(short = 'n', long, value_name = "COUNT")]
    planes: usize,

    /// Output file; ".iff" is appended when missing
    #[arg(short = 'o', long = "output", value_name = "NAME")]
    output: PathBuf,

    /// Input rows are interleaved ([row][plane]) instead of plane-major
    #[arg(short = 'i', long, conflicts_with_all = ["transpose", "chunky_input"])]
    interleaved: bool,

    /// Input planes are stored as byte columns of this width (0 disables)
    #[arg(short = 't', long, value_name = "BYTES", conflicts_with = "chunky_input")]
    transpose: Option<usize>,

    /// Input holds one palette index byte per pixel
    #[arg(long)]
    chunky_input: bool,

    /// Input rows are ceil(width/8) bytes instead of word-aligned
    #[arg(long)]
    packed_rows: bool,

    /// PackBits-compress the BODY
    #[arg(short = 'r', long = "rle")]
    compress: bool,
}

impl Args {
    fn assemble_options(&self) -> Result<AssembleOptions> {
        let geometry = Geometry::new(self.width, self.height, self.planes)?;
        let layout = if self.chunky_input {
            RawLayout::Chunky
        } else if let Some(column_width) = self.transpose.filter(|&width| width > 0) {
            RawLayout::Transposed { column_width }
        } else if self.interleaved {
            RawLayout::Interleaved
        } else {
            RawLayout::NonInterleaved
        };
        Ok(AssembleOptions {
            geometry,
            layout,
            stride: if self.packed_rows {
                RowStride::Packed
            } else {
                RowStride::Padded
            },
            compress: self.compress,
        })
    }
}

fn main() -> Result<()> {
    let args: Args = parse_args();
    init_logging();

    let options = args.assemble_options()?;
    let input = InputFile::open(&args.input)?;
    let assembled = assemble_ilbm(input.bytes(), &options)
        .with_context(|| format!("converting {}", args.input.display()))?;
    if assembled.palette_source == PaletteSource::Default {
        log::info!("no palette in input, using black and white");
    }

    let output = ensure_iff_extension(&args.output);
    write_artifact(&output, &assembled.ilbm.bytes)?;
    log::info!(
        "wrote {} ({}x{}, {} planes, {} bytes)",
        output.display(),
        assembled.header.width,
        assembled.header.height,
        assembled.header.num_planes,
        assembled.ilbm.bytes.len()
    );
    Ok(())
}
