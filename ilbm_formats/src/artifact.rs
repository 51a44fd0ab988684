use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::{Mmap, MmapOptions};
use tempfile::NamedTempFile;

use crate::convert::{Artifact, ArtifactKind};

/// Read-only view of an input file.
#[derive(Debug)]
pub struct InputFile {
    path: PathBuf,
    // Zero-length files cannot be mapped.
    mmap: Option<Mmap>,
}

impl InputFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        let mmap = if len == 0 {
            None
        } else {
            Some(
                unsafe { MmapOptions::new().map(&file) }
                    .with_context(|| format!("memory-mapping {}", path.display()))?,
            )
        };
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or_default()
    }
}

/// Base name that artifact extensions are appended to: the explicit output
/// name when given, otherwise the input path without its extension.
pub fn output_base(input: &Path, custom: Option<&Path>) -> PathBuf {
    match custom {
        Some(custom) => custom.to_path_buf(),
        None => input.with_extension(""),
    }
}

/// `base` with `.ext` appended, keeping any dots already in the name.
pub fn artifact_path(base: &Path, kind: ArtifactKind) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(kind.extension());
    PathBuf::from(name)
}

/// Append `.iff` unless the name already ends with it (any case).
pub fn ensure_iff_extension(name: &Path) -> PathBuf {
    let has_iff = name
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(ArtifactKind::Ilbm.extension()))
        .unwrap_or(false);
    if has_iff {
        name.to_path_buf()
    } else {
        artifact_path(name, ArtifactKind::Ilbm)
    }
}

/// Write `bytes` to a temporary file next to `path` and rename it into place.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temporary file in {}", parent.display()))?;
    temp.write_all(bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Write every artifact as `base.<ext>`, returning the paths in order.
pub fn write_artifacts(base: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = artifact_path(base, artifact.kind);
        write_artifact(&path, &artifact.bytes)?;
        log::info!("wrote {} ({} bytes)", path.display(), artifact.bytes.len());
        written.push(path);
    }
    Ok(written)
}
