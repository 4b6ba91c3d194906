//! Input-set discovery: a directory of images, a list file, a (compressed)
//! tar archive extracted to scratch space, or a tar stream on stdin.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, warn};
use walkdir::WalkDir;

use sprat_core::model::ImageSource;

const SUPPORTED_EXTENSIONS: [&str; 13] = [
    "png", "jpg", "jpeg", "bmp", "tga", "gif", "psd", "pic", "pnm", "pgm", "ppm", "hdr", "webp",
];

/// A resolved input set, ready for the pipeline. Holds the extraction
/// scratch directory alive for archive inputs.
pub struct InputSet {
    pub sources: Vec<ImageSource>,
    /// List-file inputs treat unreadable entries as fatal.
    pub strict: bool,
    /// Keep the given source order in cache signatures (list files and
    /// stdin streams; directory inputs are order-insensitive).
    pub preserve_order: bool,
    /// Identity keying the image cache (the working folder or list file).
    pub input_identity: PathBuf,
    _scratch: Option<ScratchDir>,
}

/// Fixed-path scratch directory, removed when the run finishes. The path is
/// stable across runs so extracted sprite paths (and with them cache keys
/// and output text) are reproducible.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create(name: &str) -> anyhow::Result<Self> {
        let path = sprat_core::cache::default_cache_root().join(name);
        // Leftovers from a crashed run would leak into the sprite set.
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path)
            .with_context(|| format!("create scratch directory {}", path.display()))?;
        Ok(Self(path))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Plain,
    Gzip,
    Bzip2,
    Xz,
}

/// Archive compression by file name, or `None` when the path is not an
/// archive at all (and is treated as a list file).
fn archive_compression(path: &Path) -> Option<Compression> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tar") {
        Some(Compression::Plain)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(Compression::Gzip)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(Compression::Bzip2)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(Compression::Xz)
    } else {
        None
    }
}

/// Compression by magic bytes, for streams without a file name. A plain tar
/// carries `ustar` at offset 257.
fn sniff_compression(head: &[u8]) -> Compression {
    if head.starts_with(&[0x1f, 0x8b]) {
        Compression::Gzip
    } else if head.starts_with(b"BZh") {
        Compression::Bzip2
    } else if head.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Compression::Xz
    } else {
        Compression::Plain
    }
}

fn decoder<'a, R: Read + 'a>(reader: R, compression: Compression) -> Box<dyn Read + 'a> {
    match compression {
        Compression::Plain => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}

fn extract_tar(reader: impl Read, dest: &Path) -> anyhow::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    archive.set_preserve_mtime(true);
    archive.unpack(dest).context("extract tar archive")?;
    Ok(())
}

fn probe_source(path: PathBuf, strict: bool) -> anyhow::Result<Option<ImageSource>> {
    match ImageSource::probe(path.clone()) {
        Ok(source) => Ok(Some(source)),
        Err(err) if strict => {
            Err(err).with_context(|| format!("failed to stat image {}", path.display()))
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable file");
            Ok(None)
        }
    }
}

fn collect_directory(dir: &Path, recursive: bool) -> anyhow::Result<Vec<ImageSource>> {
    let mut sources = Vec::new();
    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };
    for entry in walker.sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }
        if let Some(source) = probe_source(entry.into_path(), false)? {
            sources.push(source);
        }
    }
    Ok(sources)
}

fn collect_list_file(list_path: &Path) -> anyhow::Result<Vec<ImageSource>> {
    let text = fs::read_to_string(list_path)
        .with_context(|| format!("failed to open list file {}", list_path.display()))?;
    let parent = list_path.parent().unwrap_or_else(|| Path::new("."));

    let mut sources = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut entry_path = PathBuf::from(line);
        if entry_path.is_relative() {
            entry_path = parent.join(entry_path);
        }
        if !entry_path.is_file() {
            bail!("invalid image path at line {line_number}: {line}");
        }
        if !is_supported_image(&entry_path) {
            bail!("unsupported extension at line {line_number}: {line}");
        }
        if let Some(source) = probe_source(entry_path, true)? {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// Resolves the positional input argument into an input set. `-` reads a
/// tar stream (optionally gzip/bzip2/xz compressed) from stdin.
pub fn collect(input: &str) -> anyhow::Result<InputSet> {
    if input == "-" {
        return collect_stdin();
    }

    let path = PathBuf::from(input);
    let meta = fs::metadata(&path)
        .with_context(|| format!("cannot access input '{}'", path.display()))?;

    if meta.is_dir() {
        let sources = collect_directory(&path, false)?;
        return Ok(InputSet {
            sources,
            strict: false,
            preserve_order: false,
            input_identity: path,
            _scratch: None,
        });
    }
    if !meta.is_file() {
        bail!("input '{}' is neither a folder nor a file", path.display());
    }

    if let Some(compression) = archive_compression(&path) {
        let scratch = ScratchDir::create("extract")?;
        debug!(archive = %path.display(), dest = %scratch.0.display(), "extracting archive");
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open archive {}", path.display()))?;
        extract_tar(decoder(file, compression), &scratch.0)?;
        let sources = collect_directory(&scratch.0, true)?;
        return Ok(InputSet {
            sources,
            strict: false,
            preserve_order: false,
            input_identity: scratch.0.clone(),
            _scratch: Some(scratch),
        });
    }

    let sources = collect_list_file(&path)?;
    Ok(InputSet {
        sources,
        strict: true,
        preserve_order: true,
        input_identity: path,
        _scratch: None,
    })
}

fn collect_stdin() -> anyhow::Result<InputSet> {
    let stdin = io::stdin();
    let mut lock = stdin.lock();

    let mut head = vec![0u8; 512];
    let mut filled = 0;
    while filled < head.len() {
        let n = lock.read(&mut head[filled..]).context("read stdin")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    let compression = sniff_compression(&head);

    let scratch = ScratchDir::create("extract_stdin")?;
    let reader = io::Cursor::new(head).chain(lock);
    extract_tar(decoder(reader, compression), &scratch.0)?;

    let sources = collect_directory(&scratch.0, true)?;
    Ok(InputSet {
        sources,
        strict: false,
        preserve_order: true,
        input_identity: scratch.0.clone(),
        _scratch: Some(scratch),
    })
}
