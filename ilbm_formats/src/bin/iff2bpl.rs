use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use ilbm_formats::cli::{init_logging, parse_args};
use ilbm_formats::{
    ChunkyMode, ExtractOptions, InputFile, RowPolicy, extract_bitplanes, output_base,
    write_artifacts,
};
use walkdir::WalkDir;

const ILBM_EXTENSIONS: [&str; 3] = ["iff", "ilbm", "lbm"];

#[derive(Parser, Debug)]
#[command(about = "Split Amiga ILBM images into raw bitplanes and palette words", version)]
struct Args {
    /// ILBM files to convert
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Directory scanned recursively for .iff/.ilbm/.lbm files
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Output name that extensions are appended to (single input only)
    #[arg(short = 'o', long = "output", value_name = "NAME")]
    output: Option<PathBuf>,

    /// Also write a chunky surface (.chk), one byte per pixel
    #[arg(short = 'c', long)]
    chunky: bool,

    /// Also write a chunky surface with every index bit doubled (.chk)
    #[arg(short = 'd', long)]
    doubled: bool,

    /// Also write plane-major bitplanes (.bpf)
    #[arg(short = 'n', long = "non-interleaved")]
    non_interleaved: bool,

    /// Fail on BODY rows that decode short instead of warning
    #[arg(long)]
    strict: bool,
}

impl Args {
    fn extract_options(&self) -> ExtractOptions {
        let chunky = if self.doubled {
            Some(ChunkyMode::DoubledBits)
        } else if self.chunky {
            Some(ChunkyMode::Plain)
        } else {
            None
        };
        ExtractOptions {
            chunky,
            non_interleaved: self.non_interleaved,
            row_policy: if self.strict {
                RowPolicy::Strict
            } else {
                RowPolicy::Lenient
            },
        }
    }
}

fn main() -> Result<()> {
    let args: Args = parse_args();
    init_logging();

    let inputs = resolve_inputs(&args)?;
    ensure!(!inputs.is_empty(), "no ILBM files to convert");
    ensure!(
        args.output.is_none() || inputs.len() == 1,
        "--output can only be used with a single input ({} given)",
        inputs.len()
    );

    let options = args.extract_options();
    if let [input] = inputs.as_slice() {
        return convert(input, args.output.as_deref(), &options);
    }

    let mut failed = 0usize;
    for input in &inputs {
        if let Err(err) = convert(input, None, &options) {
            log::error!("{err:#}");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} files failed to convert", inputs.len());
    }
    Ok(())
}

fn resolve_inputs(args: &Args) -> Result<Vec<PathBuf>> {
    let mut inputs = args.inputs.clone();
    if let Some(root) = args.root.as_ref() {
        ensure!(root.is_dir(), "{} is not a directory", root.display());
        let mut found = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_map(|res| res.ok()) {
            if entry.file_type().is_file() && has_ilbm_extension(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        log::info!("found {} ILBM files under {}", found.len(), root.display());
        inputs.extend(found);
    }
    Ok(inputs)
}

fn has_ilbm_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ILBM_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn convert(input: &Path, output: Option<&Path>, options: &ExtractOptions) -> Result<()> {
    let file = InputFile::open(input)?;
    log::info!("converting {}", input.display());
    let extraction = extract_bitplanes(file.bytes(), options)
        .with_context(|| format!("converting {}", input.display()))?;

    let base = output_base(input, output);
    write_artifacts(&base, &extraction.artifacts)?;
    Ok(())
}
