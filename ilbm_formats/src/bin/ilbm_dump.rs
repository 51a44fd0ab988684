//! Print the chunk layout, bitmap header and palette of an ILBM file.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ilbm_formats::cli::{init_logging, parse_args};
use ilbm_formats::iff::read_form_header;
use ilbm_formats::{
    AmigaColor, BitmapHeader, ChunkId, IlbmFile, InputFile, Rgb8, RowPolicy, decode_body,
    parse_chunks,
};
use serde::Serialize;

const HEX_BYTES_PER_LINE: usize = 16;

#[derive(Parser, Debug)]
#[command(about = "Inspect the chunks of an Amiga ILBM file", version)]
struct Args {
    /// ILBM file to inspect
    input: PathBuf,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Include a hex dump of the decoded bitplanes
    #[arg(long)]
    body: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    path: String,
    form_size: u32,
    chunks: Vec<ChunkEntry>,
    header: Option<BitmapHeader>,
    palette: Vec<PaletteEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChunkEntry {
    id: ChunkId,
    offset: usize,
    length: u32,
}

#[derive(Debug, Serialize)]
struct PaletteEntry {
    rgb: Rgb8,
    amiga: String,
}

fn main() -> Result<()> {
    let args: Args = parse_args();
    init_logging();

    let input = InputFile::open(&args.input)?;
    let report = build_report(&args, input.bytes())
        .with_context(|| format!("inspecting {}", args.input.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        print_report(&mut out, &report)?;
    }
    Ok(())
}

fn build_report(args: &Args, bytes: &[u8]) -> Result<Report> {
    let form = read_form_header(bytes)?;
    let chunks = parse_chunks(bytes)?
        .iter()
        .map(|chunk| ChunkEntry {
            id: chunk.id,
            offset: chunk.offset,
            length: chunk.length,
        })
        .collect();
    let file = IlbmFile::parse(bytes)?;

    let palette = file
        .palette()
        .map(|palette| {
            palette
                .colors()
                .iter()
                .map(|&rgb| PaletteEntry {
                    rgb,
                    amiga: format!("{:04X}", AmigaColor::from_rgb8(rgb).0),
                })
                .collect()
        })
        .unwrap_or_default();

    let body = match (args.body, file.body, &file.header) {
        (true, Some(body), Some(header)) => {
            let planes = decode_body(body, header, RowPolicy::Lenient)?;
            Some(hex_lines(planes.as_bytes()))
        }
        _ => None,
    };

    Ok(Report {
        path: args.input.display().to_string(),
        form_size: form.size,
        chunks,
        header: file.header,
        palette,
        body,
    })
}

fn hex_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(HEX_BYTES_PER_LINE)
        .enumerate()
        .map(|(index, line)| {
            let hex: Vec<String> = line.iter().map(|byte| format!("{byte:02x}")).collect();
            format!("{:08x}: {}", index * HEX_BYTES_PER_LINE, hex.join(" "))
        })
        .collect()
}

fn print_report<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    writeln!(out, "FORM ILBM {}: {} bytes", report.path, report.form_size)?;
    for chunk in &report.chunks {
        writeln!(
            out,
            "  {id} {offset:>8} {length:>8}",
            id = chunk.id,
            offset = chunk.offset,
            length = chunk.length
        )?;
    }

    match &report.header {
        Some(header) => {
            writeln!(
                out,
                "BMHD: {}x{} at ({}, {}), {} planes, masking {}, compression {}",
                header.width,
                header.height,
                header.x,
                header.y,
                header.num_planes,
                header.masking.as_u8(),
                header.compression
            )?;
            writeln!(
                out,
                "      transparent colour {}, aspect {}:{}, page {}x{}",
                header.transparent_color,
                header.x_aspect,
                header.y_aspect,
                header.page_width,
                header.page_height
            )?;
        }
        None => writeln!(out, "BMHD: not present")?,
    }

    if report.palette.is_empty() {
        writeln!(out, "CMAP: not present")?;
    } else {
        writeln!(out, "CMAP: {} colours", report.palette.len())?;
        for (index, entry) in report.palette.iter().enumerate() {
            writeln!(
                out,
                "  {index:>3}: #{:02x}{:02x}{:02x} ({})",
                entry.rgb.r, entry.rgb.g, entry.rgb.b, entry.amiga
            )?;
        }
    }

    if let Some(lines) = &report.body {
        writeln!(out, "BODY (decoded, interleaved):")?;
        for line in lines {
            writeln!(out, "  {line}")?;
        }
    }
    Ok(())
}
